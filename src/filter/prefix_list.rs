use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use ipnetwork::IpNetwork;
use lru::LruCache;

use crate::filter::FilterAction;
use crate::route::Prefix;
use crate::shared::{ListVerdict, RouteMapError};

const VERDICT_CACHE_SIZE: NonZeroUsize = match NonZeroUsize::new(4096) {
    Some(size) => size,
    None => panic!("cache size must be non-zero"),
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefixListEntry {
    pub seq: u32,
    pub action: FilterAction,
    pub prefix: Prefix,
    pub ge: Option<u8>,
    pub le: Option<u8>,
}

impl PrefixListEntry {
    pub fn new(
        seq: u32,
        action: FilterAction,
        prefix: Prefix,
        ge: Option<u8>,
        le: Option<u8>,
    ) -> Result<Self, RouteMapError> {
        let max_len = if prefix.is_ipv4() { 32 } else { 128 };
        let len = prefix.prefix();
        let ge_ok = ge.map_or(true, |ge| ge > len && ge <= max_len);
        let le_ok = le.map_or(true, |le| le >= ge.unwrap_or(len) && le <= max_len && le >= len);
        if !ge_ok || !le_ok {
            return Err(RouteMapError::InvalidArgument(format!(
                "invalid length range for prefix-list entry {}",
                prefix
            )));
        }
        let prefix = IpNetwork::new(prefix.network(), len)
            .map_err(|e| RouteMapError::InvalidArgument(e.to_string()))?;
        Ok(PrefixListEntry {
            seq,
            action,
            prefix,
            ge,
            le,
        })
    }

    fn covers(&self, subject: &Prefix) -> bool {
        if self.prefix.is_ipv4() != subject.is_ipv4() {
            return false;
        }
        if subject.prefix() < self.prefix.prefix() || !self.prefix.contains(subject.ip()) {
            return false;
        }
        let len = subject.prefix();
        if self.ge.is_none() && self.le.is_none() {
            return len == self.prefix.prefix();
        }
        let ge = self.ge.unwrap_or(self.prefix.prefix());
        let le = self.le.unwrap_or(if subject.is_ipv4() { 32 } else { 128 });
        len >= ge && len <= le
    }
}

impl fmt::Display for PrefixListEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq {} {} {}", self.seq, self.action, self.prefix)?;
        if let Some(ge) = self.ge {
            write!(f, " ge {}", ge)?;
        }
        if let Some(le) = self.le {
            write!(f, " le {}", le)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PrefixListNode {
    entries: Vec<PrefixListEntry>,
    left: Option<Box<PrefixListNode>>,
    right: Option<Box<PrefixListNode>>,
}

/// Prefix-list stored as a binary trie keyed by the entry prefix bits, so a
/// lookup only visits entries whose prefix covers the subject.
pub struct PrefixList {
    pub name: String,
    v4_root: PrefixListNode,
    v6_root: PrefixListNode,
    count: usize,
    cache: Mutex<LruCache<Prefix, ListVerdict>>,
}

impl fmt::Debug for PrefixList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefixList")
            .field("name", &self.name)
            .field("count", &self.count)
            .finish()
    }
}

impl PrefixList {
    pub fn new(name: &str) -> Self {
        PrefixList {
            name: name.to_string(),
            v4_root: PrefixListNode::default(),
            v6_root: PrefixListNode::default(),
            count: 0,
            cache: Mutex::new(LruCache::new(VERDICT_CACHE_SIZE)),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Adds an entry; an entry with the same sequence number is replaced.
    pub fn add_entry(&mut self, entry: PrefixListEntry) {
        if self.remove_seq(entry.seq) {
            self.count -= 1;
        }
        let binary_prefix = Self::prefix_to_binary(&entry.prefix);
        let root = if entry.prefix.is_ipv4() {
            &mut self.v4_root
        } else {
            &mut self.v6_root
        };
        Self::insert_entry_at_node(root, &binary_prefix, 0, entry);
        self.count += 1;
        self.clear_cache();
    }

    fn remove_seq(&mut self, seq: u32) -> bool {
        Self::remove_seq_from_node(&mut self.v4_root, seq)
            || Self::remove_seq_from_node(&mut self.v6_root, seq)
    }

    fn remove_seq_from_node(node: &mut PrefixListNode, seq: u32) -> bool {
        let before = node.entries.len();
        node.entries.retain(|e| e.seq != seq);
        if node.entries.len() != before {
            return true;
        }
        let left = node
            .left
            .as_deref_mut()
            .map_or(false, |child| Self::remove_seq_from_node(child, seq));
        left || node
            .right
            .as_deref_mut()
            .map_or(false, |child| Self::remove_seq_from_node(child, seq))
    }

    fn insert_entry_at_node(
        node: &mut PrefixListNode,
        binary_prefix: &str,
        index: usize,
        entry: PrefixListEntry,
    ) {
        if index == binary_prefix.len() {
            node.entries.push(entry);
            return;
        }

        let bit = &binary_prefix[index..index + 1];
        let child = if bit == "0" {
            &mut node.left
        } else {
            &mut node.right
        };

        let child = child.get_or_insert_with(|| Box::new(PrefixListNode::default()));
        Self::insert_entry_at_node(child, binary_prefix, index + 1, entry);
    }

    /// Verdict of the lowest-sequence entry covering `subject`. An empty
    /// list permits everything, a non-empty list denies what it does not cover.
    pub fn apply(&self, subject: &Prefix) -> ListVerdict {
        if self.count == 0 {
            return ListVerdict::Permit;
        }
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(verdict) = cache.get(subject) {
                return *verdict;
            }
        }

        let verdict = self
            .relevant_entries(subject)
            .into_iter()
            .filter(|entry| entry.covers(subject))
            .min_by_key(|entry| entry.seq)
            .map(|entry| entry.action.verdict())
            .unwrap_or(ListVerdict::Deny);

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(*subject, verdict);
        }
        verdict
    }

    fn relevant_entries(&self, subject: &Prefix) -> Vec<&PrefixListEntry> {
        let mut relevant = Vec::new();
        let binary_prefix = Self::prefix_to_binary(subject);
        let root = if subject.is_ipv4() {
            &self.v4_root
        } else {
            &self.v6_root
        };
        Self::collect_entries_from_node(root, &binary_prefix, 0, &mut relevant);
        relevant
    }

    fn collect_entries_from_node<'a>(
        node: &'a PrefixListNode,
        binary_prefix: &str,
        index: usize,
        relevant: &mut Vec<&'a PrefixListEntry>,
    ) {
        relevant.extend(node.entries.iter());

        if index < binary_prefix.len() {
            let bit = &binary_prefix[index..index + 1];
            let child = if bit == "0" { &node.left } else { &node.right };
            if let Some(child_node) = child {
                Self::collect_entries_from_node(child_node, binary_prefix, index + 1, relevant);
            }
        }
    }

    fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    fn prefix_to_binary(prefix: &Prefix) -> String {
        match prefix {
            IpNetwork::V4(net) => {
                let addr_bits = u32::from(net.ip());
                let prefix_len = net.prefix() as usize;
                format!("{:032b}", addr_bits)[..prefix_len].to_string()
            }
            IpNetwork::V6(net) => {
                let addr_bits = u128::from(net.ip());
                let prefix_len = net.prefix() as usize;
                format!("{:0128b}", addr_bits)[..prefix_len].to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    fn entry(seq: u32, action: FilterAction, p: &str, ge: Option<u8>, le: Option<u8>) -> PrefixListEntry {
        PrefixListEntry::new(seq, action, prefix(p), ge, le).unwrap()
    }

    #[test]
    fn test_exact_length_without_range() {
        let mut plist = PrefixList::new("exact");
        plist.add_entry(entry(5, FilterAction::Permit, "10.0.0.0/8", None, None));
        assert_eq!(plist.apply(&prefix("10.0.0.0/8")), ListVerdict::Permit);
        assert_eq!(plist.apply(&prefix("10.1.0.0/16")), ListVerdict::Deny);
    }

    #[test]
    fn test_ge_le_window() {
        let mut plist = PrefixList::new("range");
        plist.add_entry(entry(10, FilterAction::Permit, "10.0.0.0/8", Some(16), Some(24)));
        assert_eq!(plist.apply(&prefix("10.1.0.0/16")), ListVerdict::Permit);
        assert_eq!(plist.apply(&prefix("10.1.1.0/24")), ListVerdict::Permit);
        assert_eq!(plist.apply(&prefix("10.1.1.128/25")), ListVerdict::Deny);
        assert_eq!(plist.apply(&prefix("10.0.0.0/8")), ListVerdict::Deny);
    }

    #[test]
    fn test_lowest_sequence_wins() {
        let mut plist = PrefixList::new("seq");
        plist.add_entry(entry(20, FilterAction::Permit, "10.0.0.0/8", None, Some(32)));
        plist.add_entry(entry(10, FilterAction::Deny, "10.1.0.0/16", None, Some(32)));
        assert_eq!(plist.apply(&prefix("10.1.2.0/24")), ListVerdict::Deny);
        assert_eq!(plist.apply(&prefix("10.2.2.0/24")), ListVerdict::Permit);
    }

    #[test]
    fn test_cache_is_invalidated_on_change() {
        let mut plist = PrefixList::new("cache");
        plist.add_entry(entry(10, FilterAction::Deny, "10.0.0.0/8", None, Some(32)));
        assert_eq!(plist.apply(&prefix("10.1.0.0/16")), ListVerdict::Deny);
        plist.add_entry(entry(10, FilterAction::Permit, "10.0.0.0/8", None, Some(32)));
        assert_eq!(plist.len(), 1);
        assert_eq!(plist.apply(&prefix("10.1.0.0/16")), ListVerdict::Permit);
    }

    #[test]
    fn test_empty_list_permits_and_families_are_separate() {
        let mut plist = PrefixList::new("v6");
        assert_eq!(plist.apply(&prefix("10.0.0.0/8")), ListVerdict::Permit);
        plist.add_entry(entry(1, FilterAction::Permit, "2001:db8::/32", None, Some(64)));
        assert_eq!(plist.apply(&prefix("2001:db8:1::/48")), ListVerdict::Permit);
        assert_eq!(plist.apply(&prefix("10.0.0.0/8")), ListVerdict::Deny);
    }

    #[test]
    fn test_invalid_ranges_are_rejected() {
        assert!(PrefixListEntry::new(1, FilterAction::Permit, prefix("10.0.0.0/16"), Some(8), None).is_err());
        assert!(PrefixListEntry::new(1, FilterAction::Permit, prefix("10.0.0.0/16"), Some(24), Some(20)).is_err());
        assert!(PrefixListEntry::new(1, FilterAction::Permit, prefix("10.0.0.0/16"), None, Some(33)).is_err());
    }
}
