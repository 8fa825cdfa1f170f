use std::fmt;

use serde_json::json;
use tracing::warn;

use crate::route::Prefix;
use crate::route_map::evaluator::MatchContext;
use crate::route_map::rule::{Rule, RuleList};
use crate::shared::{FilterResult, RouteMapType};

/// One `route-map NAME permit|deny PREF` clause.
#[derive(Debug)]
pub struct RouteMapIndex {
    map_name: String,
    kind: RouteMapType,
    pref: u32,
    pub(crate) description: Option<String>,
    pub(crate) match_list: RuleList,
    pub(crate) set_list: RuleList,
}

impl RouteMapIndex {
    pub fn new(map_name: &str, kind: RouteMapType, pref: u32) -> Self {
        RouteMapIndex {
            map_name: map_name.to_string(),
            kind,
            pref,
            description: None,
            match_list: RuleList::new(),
            set_list: RuleList::new(),
        }
    }

    pub fn map_name(&self) -> &str {
        &self.map_name
    }

    pub fn kind(&self) -> RouteMapType {
        self.kind
    }

    pub fn preference(&self) -> u32 {
        self.pref
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn match_rules(&self) -> &RuleList {
        &self.match_list
    }

    pub fn set_rules(&self) -> &RuleList {
        &self.set_list
    }

    /// Runs the match rules in order. A rule that denies or fails only
    /// means this index does not match.
    pub fn apply_match(&self, prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        for rule in self.match_list.iter() {
            match rule.apply(prefix, ctx) {
                FilterResult::Match => continue,
                FilterResult::Error => {
                    warn!(
                        map = %self.map_name,
                        preference = self.pref,
                        keyword = rule.keyword(),
                        "match rule failed"
                    );
                    return FilterResult::NoMatch;
                }
                _ => return FilterResult::NoMatch,
            }
        }
        FilterResult::Match
    }

    /// Runs every set rule. Failures are logged and the remaining rules
    /// still run.
    pub fn apply_set(&self, prefix: &Prefix, ctx: &mut MatchContext<'_>) {
        for rule in self.set_list.iter() {
            match rule.apply(prefix, ctx) {
                FilterResult::Okay | FilterResult::Match => {}
                result => warn!(
                    map = %self.map_name,
                    preference = self.pref,
                    keyword = rule.keyword(),
                    %result,
                    "set rule did not apply"
                ),
            }
        }
    }

    /// Verdict of this index alone: `Match` for a matching permit index
    /// (set rules already applied), `DenyMatch` for a matching deny index,
    /// `NoMatch` otherwise.
    pub fn apply(&self, prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        if self.apply_match(prefix, ctx) != FilterResult::Match {
            return FilterResult::NoMatch;
        }
        match self.kind {
            RouteMapType::Deny => FilterResult::DenyMatch,
            RouteMapType::Permit => {
                self.apply_set(prefix, ctx);
                FilterResult::Match
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let clauses = |list: &RuleList| -> Vec<serde_json::Value> {
            list.iter().map(rule_json).collect()
        };
        json!({
            "preference": self.pref,
            "type": self.kind,
            "description": self.description,
            "match": clauses(&self.match_list),
            "set": clauses(&self.set_list),
        })
    }
}

fn rule_json(rule: &Rule) -> serde_json::Value {
    json!({
        "keyword": rule.keyword(),
        "argument": rule.raw_arg(),
        "additive": rule.flags().additive,
    })
}

impl fmt::Display for RouteMapIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "route-map {} {} {}", self.map_name, self.kind, self.pref)?;
        if let Some(description) = &self.description {
            writeln!(f, " description {}", description)?;
        }
        for rule in self.match_list.iter() {
            writeln!(f, " match {}", rule.clause())?;
        }
        for rule in self.set_list.iter() {
            writeln!(f, " set {}", rule.clause())?;
        }
        writeln!(f, "!")
    }
}
