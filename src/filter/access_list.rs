use std::fmt;
use std::str::FromStr;

use crate::filter::FilterAction;
use crate::route::Prefix;
use crate::shared::{ListVerdict, RouteMapError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessListMatch {
    Any,
    Prefix { prefix: Prefix, exact: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessListEntry {
    pub action: FilterAction,
    pub matcher: AccessListMatch,
}

impl AccessListEntry {
    pub fn new(action: FilterAction, matcher: AccessListMatch) -> Self {
        AccessListEntry { action, matcher }
    }

    pub fn matches(&self, subject: &Prefix) -> bool {
        match &self.matcher {
            AccessListMatch::Any => true,
            AccessListMatch::Prefix { prefix, exact } => {
                if prefix.is_ipv4() != subject.is_ipv4() {
                    return false;
                }
                if *exact {
                    prefix.prefix() == subject.prefix() && prefix.network() == subject.network()
                } else {
                    subject.prefix() >= prefix.prefix() && prefix.contains(subject.ip())
                }
            }
        }
    }
}

impl fmt::Display for AccessListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matcher {
            AccessListMatch::Any => write!(f, "{} any", self.action),
            AccessListMatch::Prefix { prefix, exact } => {
                write!(f, "{} {}", self.action, prefix)?;
                if *exact {
                    write!(f, " exact-match")?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for AccessListEntry {
    type Err = RouteMapError;

    /// Parses `permit|deny PREFIX|any [exact-match]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens: Vec<&str> = s.split_whitespace().collect();
        let invalid = || RouteMapError::InvalidArgument(format!("bad access-list entry \"{}\"", s));
        let (action, target, rest) = match tokens.as_slice() {
            [action, target, rest @ ..] => (action.parse::<FilterAction>()?, *target, rest),
            _ => return Err(invalid()),
        };
        let matcher = match (target, rest) {
            ("any", []) => AccessListMatch::Any,
            (prefix, []) => AccessListMatch::Prefix {
                prefix: prefix.parse().map_err(|_| invalid())?,
                exact: false,
            },
            (prefix, ["exact-match"]) => AccessListMatch::Prefix {
                prefix: prefix.parse().map_err(|_| invalid())?,
                exact: true,
            },
            _ => return Err(invalid()),
        };
        Ok(AccessListEntry::new(action, matcher))
    }
}

/// Ordered access-list; the first matching entry decides, no match denies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessList {
    pub name: String,
    entries: Vec<AccessListEntry>,
}

impl AccessList {
    pub fn new(name: &str) -> Self {
        AccessList {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn add_entry(&mut self, entry: AccessListEntry) {
        if !self.entries.contains(&entry) {
            self.entries.push(entry);
        }
    }

    pub fn entries(&self) -> &[AccessListEntry] {
        &self.entries
    }

    pub fn apply(&self, subject: &Prefix) -> ListVerdict {
        self.entries
            .iter()
            .find(|entry| entry.matches(subject))
            .map(|entry| entry.action.verdict())
            .unwrap_or(ListVerdict::Deny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let mut acl = AccessList::new("10");
        acl.add_entry("deny 10.1.0.0/16".parse().unwrap());
        acl.add_entry("permit 10.0.0.0/8".parse().unwrap());
        assert_eq!(acl.apply(&prefix("10.1.2.0/24")), ListVerdict::Deny);
        assert_eq!(acl.apply(&prefix("10.2.0.0/16")), ListVerdict::Permit);
        assert_eq!(acl.apply(&prefix("11.0.0.0/8")), ListVerdict::Deny);
    }

    #[test]
    fn test_exact_match_and_any() {
        let mut acl = AccessList::new("exact");
        acl.add_entry("permit 10.0.0.0/8 exact-match".parse().unwrap());
        assert_eq!(acl.apply(&prefix("10.0.0.0/8")), ListVerdict::Permit);
        assert_eq!(acl.apply(&prefix("10.0.0.0/9")), ListVerdict::Deny);

        acl.add_entry("permit any".parse().unwrap());
        assert_eq!(acl.apply(&prefix("2001:db8::/32")), ListVerdict::Permit);
    }

    #[test]
    fn test_family_mismatch_does_not_match() {
        let entry: AccessListEntry = "permit 0.0.0.0/0".parse().unwrap();
        assert!(!entry.matches(&prefix("2001:db8::/32")));
        assert!(entry.matches(&prefix("192.0.2.0/24")));
    }

    #[test]
    fn test_bad_entries() {
        assert!("permit".parse::<AccessListEntry>().is_err());
        assert!("allow 10.0.0.0/8".parse::<AccessListEntry>().is_err());
        assert!("permit 10.0.0.0/8 extra".parse::<AccessListEntry>().is_err());
        assert_eq!(
            "deny any".parse::<AccessListEntry>().unwrap().to_string(),
            "deny any"
        );
    }
}
