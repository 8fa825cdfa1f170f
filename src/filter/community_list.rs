use regex::Regex;

use crate::filter::FilterAction;
use crate::route::community::community_value_str;
use crate::route::{Community, ExtCommunity, ExtCommunityKind};
use crate::shared::{ListVerdict, RouteMapError};

#[derive(Debug, Clone)]
pub enum CommunityMatcher {
    Any,
    Standard(Community),
    Expanded(Regex),
}

#[derive(Debug, Clone)]
pub struct CommunityListEntry {
    pub action: FilterAction,
    pub matcher: CommunityMatcher,
}

impl CommunityListEntry {
    pub fn any(action: FilterAction) -> Self {
        CommunityListEntry {
            action,
            matcher: CommunityMatcher::Any,
        }
    }

    pub fn standard(action: FilterAction, values: &str) -> Result<Self, RouteMapError> {
        let com = values
            .parse::<Community>()
            .map_err(|e| RouteMapError::InvalidArgument(e.to_string()))?;
        Ok(CommunityListEntry {
            action,
            matcher: CommunityMatcher::Standard(com),
        })
    }

    pub fn expanded(action: FilterAction, pattern: &str) -> Result<Self, RouteMapError> {
        let regex = Regex::new(pattern).map_err(|e| {
            RouteMapError::InvalidArgument(format!("bad community regex {}: {}", pattern, e))
        })?;
        Ok(CommunityListEntry {
            action,
            matcher: CommunityMatcher::Expanded(regex),
        })
    }

    fn matches(&self, com: &Community) -> bool {
        match &self.matcher {
            CommunityMatcher::Any => true,
            CommunityMatcher::Standard(wanted) => com.contains_all(wanted),
            CommunityMatcher::Expanded(regex) => regex.is_match(&com.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommunityList {
    pub name: String,
    entries: Vec<CommunityListEntry>,
}

impl CommunityList {
    pub fn new(name: &str) -> Self {
        CommunityList {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn add_entry(&mut self, entry: CommunityListEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[CommunityListEntry] {
        &self.entries
    }

    pub fn apply(&self, com: &Community) -> ListVerdict {
        self.entries
            .iter()
            .find(|entry| entry.matches(com))
            .map(|entry| entry.action.verdict())
            .unwrap_or(ListVerdict::Deny)
    }

    /// Only `any` and standard entries take part; a standard entry must list
    /// exactly the communities of the route.
    pub fn exact_match(&self, com: &Community) -> ListVerdict {
        self.entries
            .iter()
            .find(|entry| match &entry.matcher {
                CommunityMatcher::Any => true,
                CommunityMatcher::Standard(wanted) => wanted.same_set(com),
                CommunityMatcher::Expanded(_) => false,
            })
            .map(|entry| entry.action.verdict())
            .unwrap_or(ListVerdict::Deny)
    }

    /// Strips every value selected by a permit entry. A deny entry that
    /// matches stops the walk and protects what is left.
    pub fn match_delete(&self, com: &Community) -> Community {
        let mut remaining = com.clone();
        for entry in &self.entries {
            match &entry.matcher {
                CommunityMatcher::Any => {
                    if entry.action == FilterAction::Permit {
                        remaining = Community::new();
                    }
                    break;
                }
                CommunityMatcher::Standard(wanted) => {
                    if !remaining.contains_all(wanted) {
                        continue;
                    }
                    if entry.action == FilterAction::Permit {
                        for value in wanted.values() {
                            remaining.remove(*value);
                        }
                    }
                    break;
                }
                CommunityMatcher::Expanded(regex) => {
                    let hits: Vec<u32> = remaining
                        .values()
                        .iter()
                        .copied()
                        .filter(|v| regex.is_match(&community_value_str(*v)))
                        .collect();
                    if hits.is_empty() {
                        continue;
                    }
                    if entry.action == FilterAction::Deny {
                        break;
                    }
                    for value in hits {
                        remaining.remove(value);
                    }
                }
            }
        }
        remaining
    }
}

#[derive(Debug, Clone)]
pub enum ExtCommunityMatcher {
    Standard(ExtCommunity),
    Expanded(Regex),
}

#[derive(Debug, Clone)]
pub struct ExtCommunityListEntry {
    pub action: FilterAction,
    pub matcher: ExtCommunityMatcher,
}

impl ExtCommunityListEntry {
    /// Parses `rt VALUE... [soo VALUE...]`.
    pub fn standard(action: FilterAction, values: &str) -> Result<Self, RouteMapError> {
        let mut ecom = ExtCommunity::new();
        let mut kind = None;
        for token in values.split_whitespace() {
            match token {
                "rt" => kind = Some(ExtCommunityKind::RouteTarget),
                "soo" => kind = Some(ExtCommunityKind::SiteOfOrigin),
                value => {
                    let kind = kind.ok_or_else(|| {
                        RouteMapError::InvalidArgument(format!(
                            "extended community {} lacks rt/soo",
                            value
                        ))
                    })?;
                    let parsed = ExtCommunity::parse(kind, value)
                        .map_err(|e| RouteMapError::InvalidArgument(e.to_string()))?;
                    ecom.merge(&parsed);
                }
            }
        }
        if ecom.is_empty() {
            return Err(RouteMapError::InvalidArgument(
                "empty extended community list entry".to_string(),
            ));
        }
        Ok(ExtCommunityListEntry {
            action,
            matcher: ExtCommunityMatcher::Standard(ecom),
        })
    }

    pub fn expanded(action: FilterAction, pattern: &str) -> Result<Self, RouteMapError> {
        let regex = Regex::new(pattern).map_err(|e| {
            RouteMapError::InvalidArgument(format!("bad extcommunity regex {}: {}", pattern, e))
        })?;
        Ok(ExtCommunityListEntry {
            action,
            matcher: ExtCommunityMatcher::Expanded(regex),
        })
    }

    fn matches(&self, ecom: &ExtCommunity) -> bool {
        match &self.matcher {
            ExtCommunityMatcher::Standard(wanted) => {
                wanted.values().iter().all(|v| ecom.contains(v))
            }
            ExtCommunityMatcher::Expanded(regex) => regex.is_match(&ecom.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtCommunityList {
    pub name: String,
    entries: Vec<ExtCommunityListEntry>,
}

impl ExtCommunityList {
    pub fn new(name: &str) -> Self {
        ExtCommunityList {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn add_entry(&mut self, entry: ExtCommunityListEntry) {
        self.entries.push(entry);
    }

    pub fn apply(&self, ecom: &ExtCommunity) -> ListVerdict {
        self.entries
            .iter()
            .find(|entry| entry.matches(ecom))
            .map(|entry| entry.action.verdict())
            .unwrap_or(ListVerdict::Deny)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn com(s: &str) -> Community {
        s.parse().unwrap()
    }

    #[test]
    fn test_standard_entry_needs_all_values() {
        let mut list = CommunityList::new("c");
        list.add_entry(CommunityListEntry::standard(FilterAction::Permit, "1:1 2:2").unwrap());
        assert_eq!(list.apply(&com("2:2 3:3 1:1")), ListVerdict::Permit);
        assert_eq!(list.apply(&com("1:1")), ListVerdict::Deny);
    }

    #[test]
    fn test_exact_match() {
        let mut list = CommunityList::new("c");
        list.add_entry(CommunityListEntry::standard(FilterAction::Permit, "1:1 2:2").unwrap());
        assert_eq!(list.exact_match(&com("2:2 1:1")), ListVerdict::Permit);
        assert_eq!(list.exact_match(&com("2:2 1:1 3:3")), ListVerdict::Deny);
    }

    #[test]
    fn test_expanded_entry() {
        let mut list = CommunityList::new("c");
        list.add_entry(CommunityListEntry::expanded(FilterAction::Permit, "^65001:").unwrap());
        assert_eq!(list.apply(&com("65001:7")), ListVerdict::Permit);
        assert_eq!(list.apply(&com("65002:7")), ListVerdict::Deny);
    }

    #[test]
    fn test_match_delete() {
        let mut list = CommunityList::new("strip");
        list.add_entry(CommunityListEntry::expanded(FilterAction::Permit, "^65001:").unwrap());
        let left = list.match_delete(&com("65001:1 65002:2 65001:3"));
        assert_eq!(left, com("65002:2"));

        let mut all = CommunityList::new("all");
        all.add_entry(CommunityListEntry::any(FilterAction::Permit));
        assert!(all.match_delete(&com("1:1 2:2")).is_empty());
    }

    #[test]
    fn test_deny_entry_protects_remaining() {
        let mut list = CommunityList::new("guard");
        list.add_entry(CommunityListEntry::standard(FilterAction::Deny, "1:1").unwrap());
        list.add_entry(CommunityListEntry::any(FilterAction::Permit));
        assert_eq!(list.match_delete(&com("1:1 2:2")), com("1:1 2:2"));
    }

    #[test]
    fn test_ext_community_list() {
        let mut list = ExtCommunityList::new("e");
        list.add_entry(ExtCommunityListEntry::standard(FilterAction::Permit, "rt 65001:1").unwrap());
        let ecom = ExtCommunity::parse(ExtCommunityKind::RouteTarget, "65001:1 65001:2").unwrap();
        assert_eq!(list.apply(&ecom), ListVerdict::Permit);
        let other = ExtCommunity::parse(ExtCommunityKind::SiteOfOrigin, "65001:1").unwrap();
        assert_eq!(list.apply(&other), ListVerdict::Deny);
        assert!(ExtCommunityListEntry::standard(FilterAction::Permit, "65001:1").is_err());
    }
}
