use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Result of applying a rule, an index, or a whole route-map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FilterResult {
    Match = 0,
    NoMatch = 1,
    DenyMatch = 2,
    Error = 3,
    /// Only returned by set rules.
    Okay = 4,
}

impl FilterResult {
    pub fn is_match(&self) -> bool {
        *self == FilterResult::Match
    }
}

impl fmt::Display for FilterResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterResult::Match => "MATCH",
            FilterResult::NoMatch => "NO_MATCH",
            FilterResult::DenyMatch => "DENY_MATCH",
            FilterResult::Error => "ERROR",
            FilterResult::Okay => "OK",
        };
        write!(f, "{}", s)
    }
}

/// Disposition of a route-map index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMapType {
    Permit,
    Deny,
}

impl fmt::Display for RouteMapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteMapType::Permit => "permit",
            RouteMapType::Deny => "deny",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RouteMapType {
    type Err = RouteMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permit" => Ok(RouteMapType::Permit),
            "deny" => Ok(RouteMapType::Deny),
            other => Err(RouteMapError::InvalidArgument(format!(
                "unknown route-map type {}",
                other
            ))),
        }
    }
}

/// Structural change kinds reported through the event hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteMapEvent {
    IndexAdded,
    IndexDeleted,
    MatchAdded,
    MatchReplaced,
    MatchDeleted,
    SetAdded,
    SetReplaced,
    SetDeleted,
}

impl fmt::Display for RouteMapEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RouteMapEvent::IndexAdded => "INDEX_ADDED",
            RouteMapEvent::IndexDeleted => "INDEX_DELETED",
            RouteMapEvent::MatchAdded => "MATCH_ADDED",
            RouteMapEvent::MatchReplaced => "MATCH_REPLACED",
            RouteMapEvent::MatchDeleted => "MATCH_DELETED",
            RouteMapEvent::SetAdded => "SET_ADDED",
            RouteMapEvent::SetReplaced => "SET_REPLACED",
            RouteMapEvent::SetDeleted => "SET_DELETED",
        };
        write!(f, "{}", s)
    }
}

/// Install-time options of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RuleFlags {
    pub additive: bool,
    pub priority: bool,
}

impl RuleFlags {
    pub const NONE: RuleFlags = RuleFlags {
        additive: false,
        priority: false,
    };
    pub const ADDITIVE: RuleFlags = RuleFlags {
        additive: true,
        priority: false,
    };
    pub const PRIORITY: RuleFlags = RuleFlags {
        additive: false,
        priority: true,
    };
}

/// Three-way verdict of an external list (access-list, prefix-list, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListVerdict {
    Permit,
    Deny,
    NoMatch,
}

impl From<ListVerdict> for FilterResult {
    fn from(verdict: ListVerdict) -> Self {
        match verdict {
            ListVerdict::Permit => FilterResult::Match,
            ListVerdict::Deny => FilterResult::DenyMatch,
            ListVerdict::NoMatch => FilterResult::NoMatch,
        }
    }
}

/// Error produced by a rule's compile step.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CompileError(pub String);

impl CompileError {
    pub fn new(reason: impl Into<String>) -> Self {
        CompileError(reason.into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteMapError {
    #[error("route-map {0} does not exist")]
    MapNotExist(String),

    #[error("route-map {map} has no index at preference {preference}")]
    IndexNotExist { map: String, preference: u32 },

    #[error("unknown rule keyword \"{0}\"")]
    RuleMissing(String),

    #[error("invalid argument for \"{keyword}\": {reason}")]
    Compile { keyword: String, reason: String },

    #[error("no \"{keyword}\" rule with that argument is installed")]
    RuleNotFound { keyword: String },

    #[error("out of memory")]
    OutOfMemory,

    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
