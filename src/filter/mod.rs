//! Named filter lists consulted by match rules: access-lists, prefix-lists,
//! AS-path lists and community lists.

pub mod access_list;
pub mod as_path_list;
pub mod community_list;
pub mod prefix_list;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub use access_list::{AccessList, AccessListEntry};
pub use as_path_list::AsPathList;
pub use community_list::{CommunityList, ExtCommunityList};
pub use prefix_list::{PrefixList, PrefixListEntry};

use crate::route::{AsPath, Community, ExtCommunity, Prefix};
use crate::shared::{ListVerdict, RouteMapError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterAction {
    Permit,
    Deny,
}

impl FilterAction {
    pub fn verdict(&self) -> ListVerdict {
        match self {
            FilterAction::Permit => ListVerdict::Permit,
            FilterAction::Deny => ListVerdict::Deny,
        }
    }
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FilterAction::Permit => "permit",
            FilterAction::Deny => "deny",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for FilterAction {
    type Err = RouteMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "permit" => Ok(FilterAction::Permit),
            "deny" => Ok(FilterAction::Deny),
            other => Err(RouteMapError::InvalidArgument(format!(
                "unknown filter action {}",
                other
            ))),
        }
    }
}

/// Lookup capability the match rules delegate to. Every method returns
/// `None` when no list of that name exists.
pub trait ListMatcher: Send + Sync {
    fn access_list(&self, name: &str, subject: &Prefix) -> Option<ListVerdict>;

    fn prefix_list(&self, name: &str, subject: &Prefix) -> Option<ListVerdict>;

    fn as_path_list(&self, name: &str, path: &AsPath) -> Option<ListVerdict>;

    /// With `exact` set, a standard entry only matches an identical set.
    fn community_list(&self, name: &str, com: &Community, exact: bool) -> Option<ListVerdict>;

    fn ext_community_list(&self, name: &str, ecom: &ExtCommunity) -> Option<ListVerdict>;

    /// Returns `com` minus every value the list permits.
    fn community_list_delete(&self, name: &str, com: &Community) -> Option<Community>;
}

/// In-memory home of all named lists.
#[derive(Debug, Default)]
pub struct FilterStore {
    access_lists: HashMap<String, AccessList>,
    prefix_lists: HashMap<String, PrefixList>,
    as_path_lists: HashMap<String, AsPathList>,
    community_lists: HashMap<String, CommunityList>,
    ext_community_lists: HashMap<String, ExtCommunityList>,
}

impl FilterStore {
    pub fn new() -> Self {
        FilterStore::default()
    }

    pub fn access_list_mut(&mut self, name: &str) -> &mut AccessList {
        self.access_lists
            .entry(name.to_string())
            .or_insert_with(|| AccessList::new(name))
    }

    pub fn prefix_list_mut(&mut self, name: &str) -> &mut PrefixList {
        self.prefix_lists
            .entry(name.to_string())
            .or_insert_with(|| PrefixList::new(name))
    }

    pub fn as_path_list_mut(&mut self, name: &str) -> &mut AsPathList {
        self.as_path_lists
            .entry(name.to_string())
            .or_insert_with(|| AsPathList::new(name))
    }

    pub fn community_list_mut(&mut self, name: &str) -> &mut CommunityList {
        self.community_lists
            .entry(name.to_string())
            .or_insert_with(|| CommunityList::new(name))
    }

    pub fn ext_community_list_mut(&mut self, name: &str) -> &mut ExtCommunityList {
        self.ext_community_lists
            .entry(name.to_string())
            .or_insert_with(|| ExtCommunityList::new(name))
    }

    pub fn remove_access_list(&mut self, name: &str) -> Option<AccessList> {
        self.access_lists.remove(name)
    }

    pub fn remove_prefix_list(&mut self, name: &str) -> Option<PrefixList> {
        self.prefix_lists.remove(name)
    }
}

impl ListMatcher for FilterStore {
    fn access_list(&self, name: &str, subject: &Prefix) -> Option<ListVerdict> {
        self.access_lists.get(name).map(|list| list.apply(subject))
    }

    fn prefix_list(&self, name: &str, subject: &Prefix) -> Option<ListVerdict> {
        self.prefix_lists.get(name).map(|list| list.apply(subject))
    }

    fn as_path_list(&self, name: &str, path: &AsPath) -> Option<ListVerdict> {
        self.as_path_lists.get(name).map(|list| list.apply(path))
    }

    fn community_list(&self, name: &str, com: &Community, exact: bool) -> Option<ListVerdict> {
        self.community_lists.get(name).map(|list| {
            if exact {
                list.exact_match(com)
            } else {
                list.apply(com)
            }
        })
    }

    fn ext_community_list(&self, name: &str, ecom: &ExtCommunity) -> Option<ListVerdict> {
        self.ext_community_lists.get(name).map(|list| list.apply(ecom))
    }

    fn community_list_delete(&self, name: &str, com: &Community) -> Option<Community> {
        self.community_lists.get(name).map(|list| list.match_delete(com))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_are_reported() {
        let store = FilterStore::new();
        let prefix: Prefix = "10.0.0.0/8".parse().unwrap();
        assert_eq!(store.access_list("nope", &prefix), None);
        assert_eq!(store.prefix_list("nope", &prefix), None);
        assert_eq!(store.as_path_list("nope", &AsPath::new()), None);
        assert_eq!(store.community_list("nope", &Community::new(), false), None);
        assert_eq!(store.community_list_delete("nope", &Community::new()), None);
    }

    #[test]
    fn test_store_dispatches_by_name() {
        let mut store = FilterStore::new();
        store
            .access_list_mut("10")
            .add_entry("permit 10.0.0.0/8".parse().unwrap());
        let inside: Prefix = "10.1.0.0/16".parse().unwrap();
        let outside: Prefix = "192.168.0.0/16".parse().unwrap();
        assert_eq!(store.access_list("10", &inside), Some(ListVerdict::Permit));
        assert_eq!(store.access_list("10", &outside), Some(ListVerdict::Deny));
        assert!(store.remove_access_list("10").is_some());
        assert_eq!(store.access_list("10", &inside), None);
    }
}
