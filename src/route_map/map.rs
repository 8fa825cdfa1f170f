use std::collections::BTreeMap;
use std::fmt;

use serde_json::json;
use tracing::debug;

use crate::route::Prefix;
use crate::route_map::evaluator::{route_map_apply, MatchContext};
use crate::route_map::hooks::RouteMapHooks;
use crate::route_map::index::RouteMapIndex;
use crate::route_map::registry::{RuleKind, RuleRegistry};
use crate::route_map::rule::Rule;
use crate::shared::{FilterResult, RouteMapError, RouteMapEvent, RouteMapType, RuleFlags};

/// A named route-map: indices kept in ascending preference order.
#[derive(Debug)]
pub struct RouteMap {
    name: String,
    indices: Vec<RouteMapIndex>,
}

impl RouteMap {
    pub fn new(name: &str) -> Self {
        RouteMap {
            name: name.to_string(),
            indices: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indices(&self) -> &[RouteMapIndex] {
        &self.indices
    }

    pub fn index(&self, pref: u32) -> Option<&RouteMapIndex> {
        self.position(pref).ok().map(|pos| &self.indices[pos])
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    fn index_mut(&mut self, pref: u32) -> Option<&mut RouteMapIndex> {
        match self.position(pref) {
            Ok(pos) => Some(&mut self.indices[pos]),
            Err(_) => None,
        }
    }

    fn position(&self, pref: u32) -> Result<usize, usize> {
        self.indices.binary_search_by_key(&pref, |index| index.preference())
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "entries": self.indices.iter().map(|index| index.to_json()).collect::<Vec<_>>(),
        })
    }
}

impl fmt::Display for RouteMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for index in &self.indices {
            write!(f, "{}", index)?;
        }
        Ok(())
    }
}

/// Owner of every route-map, the rule registry and the change hooks.
#[derive(Debug)]
pub struct RouteMapMaster {
    maps: BTreeMap<String, RouteMap>,
    registry: RuleRegistry,
    hooks: RouteMapHooks,
}

impl RouteMapMaster {
    pub fn new(registry: RuleRegistry) -> Self {
        RouteMapMaster {
            maps: BTreeMap::new(),
            registry,
            hooks: RouteMapHooks::new(),
        }
    }

    pub fn with_hooks(mut self, hooks: RouteMapHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn add_hook(&mut self, hook: impl Fn(&str) + Send + Sync + 'static) {
        self.hooks.set_add(Box::new(hook));
    }

    pub fn delete_hook(&mut self, hook: impl Fn(&str) + Send + Sync + 'static) {
        self.hooks.set_delete(Box::new(hook));
    }

    pub fn event_hook(&mut self, hook: impl Fn(RouteMapEvent, &str) + Send + Sync + 'static) {
        self.hooks.set_event(Box::new(hook));
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut RuleRegistry {
        &mut self.registry
    }

    pub fn lookup(&self, name: &str) -> Option<&RouteMap> {
        self.maps.get(name)
    }

    pub fn lookup_index(&self, name: &str, pref: u32) -> Option<&RouteMapIndex> {
        self.maps.get(name).and_then(|map| map.index(pref))
    }

    pub fn map_names(&self) -> Vec<&str> {
        self.maps.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Returns the map called `name`, creating it and firing the add hook
    /// when it does not exist yet. Only `install_index` creates maps, so a
    /// map in the table always holds at least one index.
    fn get_or_create_map<'m>(
        maps: &'m mut BTreeMap<String, RouteMap>,
        hooks: &RouteMapHooks,
        name: &str,
    ) -> &'m mut RouteMap {
        maps.entry(name.to_string()).or_insert_with(|| {
            debug!(map = name, "route-map created");
            hooks.fire_add(name);
            RouteMap::new(name)
        })
    }

    /// Ensures an index of `kind` exists at `pref`. An index already at
    /// that preference with the other disposition is deleted and replaced.
    pub fn install_index(&mut self, name: &str, kind: RouteMapType, pref: u32) {
        let hooks = &self.hooks;
        let map = Self::get_or_create_map(&mut self.maps, hooks, name);

        let pos = match map.position(pref) {
            Ok(pos) if map.indices[pos].kind() == kind => return,
            Ok(pos) => {
                map.indices.remove(pos);
                debug!(map = name, preference = pref, "route-map index deleted");
                hooks.fire_event(RouteMapEvent::IndexDeleted, name);
                pos
            }
            Err(pos) => pos,
        };

        map.indices.insert(pos, RouteMapIndex::new(name, kind, pref));
        debug!(map = name, preference = pref, %kind, "route-map index added");
        hooks.fire_event(RouteMapEvent::IndexAdded, name);
    }

    /// Deletes the index at `pref`. Removing the last index deletes the map.
    pub fn uninstall_index(
        &mut self,
        name: &str,
        kind: RouteMapType,
        pref: u32,
    ) -> Result<(), RouteMapError> {
        let map = self
            .maps
            .get_mut(name)
            .ok_or_else(|| RouteMapError::MapNotExist(name.to_string()))?;
        let pos = match map.position(pref) {
            Ok(pos) if map.indices[pos].kind() == kind => pos,
            _ => {
                return Err(RouteMapError::IndexNotExist {
                    map: name.to_string(),
                    preference: pref,
                })
            }
        };

        map.indices.remove(pos);
        let now_empty = map.is_empty();
        debug!(map = name, preference = pref, "route-map index deleted");
        self.hooks.fire_event(RouteMapEvent::IndexDeleted, name);

        if now_empty {
            self.maps.remove(name);
            debug!(map = name, "route-map deleted");
            self.hooks.fire_delete(name);
        }
        Ok(())
    }

    /// Deletes the whole map. Only the delete hook fires.
    pub fn uninstall_map(&mut self, name: &str) -> Result<(), RouteMapError> {
        let map = self
            .maps
            .remove(name)
            .ok_or_else(|| RouteMapError::MapNotExist(name.to_string()))?;
        debug!(map = name, indices = map.len(), "route-map deleted");
        drop(map);
        self.hooks.fire_delete(name);
        Ok(())
    }

    pub fn install_match_rule(
        &mut self,
        name: &str,
        pref: u32,
        keyword: &str,
        arg: Option<&str>,
    ) -> Result<(), RouteMapError> {
        self.install_rule(RuleKind::Match, name, pref, keyword, arg, RuleFlags::NONE)
    }

    pub fn install_set_rule(
        &mut self,
        name: &str,
        pref: u32,
        keyword: &str,
        arg: Option<&str>,
        flags: RuleFlags,
    ) -> Result<(), RouteMapError> {
        self.install_rule(RuleKind::Set, name, pref, keyword, arg, flags)
    }

    /// `arg` of `None` removes the rule whatever its argument.
    pub fn uninstall_match_rule(
        &mut self,
        name: &str,
        pref: u32,
        keyword: &str,
        arg: Option<&str>,
    ) -> Result<(), RouteMapError> {
        self.uninstall_rule(RuleKind::Match, name, pref, keyword, arg)
    }

    pub fn uninstall_set_rule(
        &mut self,
        name: &str,
        pref: u32,
        keyword: &str,
        arg: Option<&str>,
    ) -> Result<(), RouteMapError> {
        self.uninstall_rule(RuleKind::Set, name, pref, keyword, arg)
    }

    fn install_rule(
        &mut self,
        kind: RuleKind,
        name: &str,
        pref: u32,
        keyword: &str,
        arg: Option<&str>,
        flags: RuleFlags,
    ) -> Result<(), RouteMapError> {
        let index = Self::resolve_index(&mut self.maps, name, pref)?;
        let cmd = self
            .registry
            .lookup_kind(kind, keyword)
            .ok_or_else(|| RouteMapError::RuleMissing(keyword.to_string()))?;
        let value = cmd.compile(arg, flags).map_err(|e| RouteMapError::Compile {
            keyword: keyword.to_string(),
            reason: e.to_string(),
        })?;

        let rule = Rule::new(cmd, value, arg.map(str::to_string), flags);
        let (replaced, event) = match kind {
            RuleKind::Match => {
                let replaced = index.match_list.install(rule);
                let event = if replaced {
                    RouteMapEvent::MatchReplaced
                } else {
                    RouteMapEvent::MatchAdded
                };
                (replaced, event)
            }
            RuleKind::Set => {
                let replaced = index.set_list.install(rule);
                let event = if replaced {
                    RouteMapEvent::SetReplaced
                } else {
                    RouteMapEvent::SetAdded
                };
                (replaced, event)
            }
        };
        debug!(map = name, preference = pref, %kind, keyword, replaced, "route-map rule installed");
        self.hooks.fire_event(event, name);
        Ok(())
    }

    fn uninstall_rule(
        &mut self,
        kind: RuleKind,
        name: &str,
        pref: u32,
        keyword: &str,
        arg: Option<&str>,
    ) -> Result<(), RouteMapError> {
        let index = Self::resolve_index(&mut self.maps, name, pref)?;
        if self.registry.lookup_kind(kind, keyword).is_none() {
            return Err(RouteMapError::RuleMissing(keyword.to_string()));
        }
        let (removed, event) = match kind {
            RuleKind::Match => (
                index.match_list.remove(keyword, arg),
                RouteMapEvent::MatchDeleted,
            ),
            RuleKind::Set => (
                index.set_list.remove(keyword, arg),
                RouteMapEvent::SetDeleted,
            ),
        };
        if removed.is_none() {
            return Err(RouteMapError::RuleNotFound {
                keyword: keyword.to_string(),
            });
        }
        debug!(map = name, preference = pref, %kind, keyword, "route-map rule deleted");
        self.hooks.fire_event(event, name);
        Ok(())
    }

    pub fn set_description(
        &mut self,
        name: &str,
        pref: u32,
        description: &str,
    ) -> Result<(), RouteMapError> {
        let index = Self::resolve_index(&mut self.maps, name, pref)?;
        index.description = Some(description.to_string());
        Ok(())
    }

    pub fn clear_description(&mut self, name: &str, pref: u32) -> Result<(), RouteMapError> {
        let index = Self::resolve_index(&mut self.maps, name, pref)?;
        index.description = None;
        Ok(())
    }

    fn resolve_index<'m>(
        maps: &'m mut BTreeMap<String, RouteMap>,
        name: &str,
        pref: u32,
    ) -> Result<&'m mut RouteMapIndex, RouteMapError> {
        let map = maps
            .get_mut(name)
            .ok_or_else(|| RouteMapError::MapNotExist(name.to_string()))?;
        map.index_mut(pref).ok_or_else(|| RouteMapError::IndexNotExist {
            map: name.to_string(),
            preference: pref,
        })
    }

    /// Evaluates the map called `name`; an unknown name denies.
    pub fn apply(&self, name: &str, prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        route_map_apply(self.lookup(name), prefix, ctx)
    }

    pub fn render(&self, name: &str) -> Option<String> {
        self.lookup(name).map(|map| map.to_string())
    }

    pub fn render_all(&self) -> String {
        self.maps.values().map(|map| map.to_string()).collect()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Array(self.maps.values().map(RouteMap::to_json).collect())
    }
}
