//! TOML policy files: named lists plus route-maps written as clause text.
//!
//! ```toml
//! log_level = "debug"
//!
//! [[access_list]]
//! name = "10"
//! entries = ["permit 10.0.0.0/8"]
//!
//! [[route_map]]
//! name = "R1"
//!
//! [[route_map.entry]]
//! action = "permit"
//! preference = 10
//! match = ["ip address 10"]
//! set = ["metric +50", { clause = "ip next-hop peer-address", priority = true }]
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use crate::filter::as_path_list::AsPathListEntry;
use crate::filter::community_list::{CommunityListEntry, ExtCommunityListEntry};
use crate::filter::{AccessListEntry, FilterAction, FilterStore, PrefixListEntry};
use crate::route::Prefix;
use crate::route_map::{RouteMapMaster, RuleKind};
use crate::shared::{RouteMapError, RouteMapType, RuleFlags};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read policy file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse policy file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{context}: {source}")]
    Install {
        context: String,
        #[source]
        source: RouteMapError,
    },

    #[error("invalid policy: {0}")]
    Invalid(String),
}

fn install_error(context: impl Into<String>) -> impl FnOnce(RouteMapError) -> ConfigError {
    let context = context.into();
    move |source| ConfigError::Install { context, source }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyConfig {
    #[serde(default)]
    pub log_level: Option<String>,
    #[serde(default)]
    pub access_list: Vec<AccessListConfig>,
    #[serde(default)]
    pub prefix_list: Vec<PrefixListConfig>,
    #[serde(default)]
    pub as_path_list: Vec<AsPathListConfig>,
    #[serde(default)]
    pub community_list: Vec<CommunityListConfig>,
    #[serde(default)]
    pub extcommunity_list: Vec<CommunityListConfig>,
    #[serde(default)]
    pub route_map: Vec<RouteMapConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessListConfig {
    pub name: String,
    /// `permit|deny PREFIX|any [exact-match]`
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixListConfig {
    pub name: String,
    pub entries: Vec<PrefixListEntryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PrefixListEntryConfig {
    pub seq: u32,
    pub action: FilterAction,
    pub prefix: String,
    pub ge: Option<u8>,
    pub le: Option<u8>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AsPathListConfig {
    pub name: String,
    pub entries: Vec<PatternEntryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PatternEntryConfig {
    pub action: FilterAction,
    pub pattern: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommunityListKind {
    #[default]
    Standard,
    Expanded,
}

/// Shared by community and extended-community lists. For standard lists
/// `value` is the value set (or `any` for community lists), for expanded
/// lists a regular expression.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommunityListConfig {
    pub name: String,
    #[serde(default)]
    pub kind: CommunityListKind,
    pub entries: Vec<CommunityEntryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommunityEntryConfig {
    pub action: FilterAction,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteMapConfig {
    pub name: String,
    #[serde(default)]
    pub entry: Vec<RouteMapEntryConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteMapEntryConfig {
    pub action: RouteMapType,
    pub preference: u32,
    pub description: Option<String>,
    #[serde(default, rename = "match")]
    pub matches: Vec<String>,
    #[serde(default)]
    pub set: Vec<SetClauseConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SetClauseConfig {
    Text(String),
    Table {
        clause: String,
        #[serde(default)]
        priority: bool,
    },
}

impl SetClauseConfig {
    /// Clause text with a trailing `additive` token moved into the flags.
    pub fn split_flags(&self) -> (&str, RuleFlags) {
        let (text, priority) = match self {
            SetClauseConfig::Text(text) => (text.trim(), false),
            SetClauseConfig::Table { clause, priority } => (clause.trim(), *priority),
        };
        let (text, additive) = match text.strip_suffix("additive") {
            Some(rest) if rest.ends_with(' ') => (rest.trim_end(), true),
            _ => (text, false),
        };
        (text, RuleFlags { additive, priority })
    }
}

pub fn load_policy(path: &Path) -> Result<PolicyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_policy(&content)
}

pub fn parse_policy(content: &str) -> Result<PolicyConfig, ConfigError> {
    let config: PolicyConfig = toml::from_str(content)?;
    config.validate()?;
    Ok(config)
}

impl PolicyConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        for map in &self.route_map {
            if map.name.trim().is_empty() {
                return Err(ConfigError::Invalid("route-map without a name".to_string()));
            }
            let mut seen = HashSet::new();
            for entry in &map.entry {
                if !seen.insert(entry.preference) {
                    return Err(ConfigError::Invalid(format!(
                        "route-map {} repeats preference {}",
                        map.name, entry.preference
                    )));
                }
            }
        }
        Ok(())
    }

    /// Loads every list into `store` and every route-map into `master`.
    /// Stops at the first failure.
    pub fn install(
        &self,
        master: &mut RouteMapMaster,
        store: &mut FilterStore,
    ) -> Result<(), ConfigError> {
        self.install_lists(store)?;
        for map in &self.route_map {
            install_route_map(map, master)?;
        }
        info!(
            route_maps = self.route_map.len(),
            access_lists = self.access_list.len(),
            prefix_lists = self.prefix_list.len(),
            "policy installed"
        );
        Ok(())
    }

    fn install_lists(&self, store: &mut FilterStore) -> Result<(), ConfigError> {
        for list in &self.access_list {
            let context = format!("access-list {}", list.name);
            let acl = store.access_list_mut(&list.name);
            for entry in &list.entries {
                acl.add_entry(entry.parse::<AccessListEntry>().map_err(install_error(context.as_str()))?);
            }
        }

        for list in &self.prefix_list {
            let context = format!("prefix-list {}", list.name);
            let plist = store.prefix_list_mut(&list.name);
            for entry in &list.entries {
                let prefix: Prefix = entry.prefix.parse().map_err(|_| {
                    ConfigError::Invalid(format!("{}: bad prefix {}", context, entry.prefix))
                })?;
                let entry = PrefixListEntry::new(entry.seq, entry.action, prefix, entry.ge, entry.le)
                    .map_err(install_error(context.as_str()))?;
                plist.add_entry(entry);
            }
        }

        for list in &self.as_path_list {
            let context = format!("as-path access-list {}", list.name);
            let aspl = store.as_path_list_mut(&list.name);
            for entry in &list.entries {
                aspl.add_entry(
                    AsPathListEntry::new(entry.action, &entry.pattern)
                        .map_err(install_error(context.as_str()))?,
                );
            }
        }

        for list in &self.community_list {
            let context = format!("community-list {}", list.name);
            let clist = store.community_list_mut(&list.name);
            for entry in &list.entries {
                let parsed = match (list.kind, entry.value.trim()) {
                    (CommunityListKind::Standard, "any") => Ok(CommunityListEntry::any(entry.action)),
                    (CommunityListKind::Standard, value) => {
                        CommunityListEntry::standard(entry.action, value)
                    }
                    (CommunityListKind::Expanded, value) => {
                        CommunityListEntry::expanded(entry.action, value)
                    }
                };
                clist.add_entry(parsed.map_err(install_error(context.as_str()))?);
            }
        }

        for list in &self.extcommunity_list {
            let context = format!("extcommunity-list {}", list.name);
            let elist = store.ext_community_list_mut(&list.name);
            for entry in &list.entries {
                let parsed = match list.kind {
                    CommunityListKind::Standard => {
                        ExtCommunityListEntry::standard(entry.action, &entry.value)
                    }
                    CommunityListKind::Expanded => {
                        ExtCommunityListEntry::expanded(entry.action, &entry.value)
                    }
                };
                elist.add_entry(parsed.map_err(install_error(context.as_str()))?);
            }
        }
        Ok(())
    }
}

fn install_route_map(map: &RouteMapConfig, master: &mut RouteMapMaster) -> Result<(), ConfigError> {
    for entry in &map.entry {
        let context = format!("route-map {} {} {}", map.name, entry.action, entry.preference);
        master.install_index(&map.name, entry.action, entry.preference);

        if let Some(description) = &entry.description {
            master
                .set_description(&map.name, entry.preference, description)
                .map_err(install_error(context.as_str()))?;
        }

        for clause in &entry.matches {
            let (keyword, arg) = master
                .registry()
                .split_clause(RuleKind::Match, clause)
                .ok_or_else(|| ConfigError::Install {
                    context: context.clone(),
                    source: RouteMapError::RuleMissing(clause.clone()),
                })?;
            master
                .install_match_rule(&map.name, entry.preference, &keyword, arg)
                .map_err(install_error(context.as_str()))?;
        }

        for clause in &entry.set {
            let (text, flags) = clause.split_flags();
            let (keyword, arg) = master
                .registry()
                .split_clause(RuleKind::Set, text)
                .ok_or_else(|| ConfigError::Install {
                    context: context.clone(),
                    source: RouteMapError::RuleMissing(text.to_string()),
                })?;
            master
                .install_set_rule(&map.name, entry.preference, &keyword, arg, flags)
                .map_err(install_error(context.as_str()))?;
        }
    }
    Ok(())
}
