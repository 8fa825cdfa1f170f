//! Route object model the policy engine reads and rewrites.

pub mod as_path;
pub mod community;
pub mod dampening;
pub mod ecommunity;

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;
use std::sync::Arc;

pub use as_path::{AsPath, AsSegment, SegmentType};
pub use community::Community;
pub use dampening::DampeningConfig;
pub use ecommunity::{ExtCommunity, ExtCommunityKind, ExtCommunityValue};

use crate::shared::CompileError;

pub type ASN = u32;
pub type Prefix = ipnetwork::IpNetwork;

/// Highest MED value a route can carry before it is treated as infinite.
pub const BGP_MED_MAX: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Origin {
    #[default]
    Igp = 0,
    Egp = 1,
    Incomplete = 2,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Origin::Igp => "igp",
            Origin::Egp => "egp",
            Origin::Incomplete => "incomplete",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Origin {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "igp" => Ok(Origin::Igp),
            "egp" => Ok(Origin::Egp),
            "incomplete" => Ok(Origin::Incomplete),
            other => Err(CompileError::new(format!("unknown origin {}", other))),
        }
    }
}

/// Presence bits of path attributes, one bit per attribute type code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AttrFlags(u32);

impl AttrFlags {
    pub const ORIGIN: AttrFlags = AttrFlags::bit(1);
    pub const AS_PATH: AttrFlags = AttrFlags::bit(2);
    pub const NEXT_HOP: AttrFlags = AttrFlags::bit(3);
    pub const MULTI_EXIT_DISC: AttrFlags = AttrFlags::bit(4);
    pub const LOCAL_PREF: AttrFlags = AttrFlags::bit(5);
    pub const ATOMIC_AGGREGATE: AttrFlags = AttrFlags::bit(6);
    pub const AGGREGATOR: AttrFlags = AttrFlags::bit(7);
    pub const COMMUNITIES: AttrFlags = AttrFlags::bit(8);
    pub const ORIGINATOR_ID: AttrFlags = AttrFlags::bit(9);
    pub const EXT_COMMUNITIES: AttrFlags = AttrFlags::bit(16);

    const fn bit(type_code: u32) -> AttrFlags {
        AttrFlags(1 << (type_code - 1))
    }

    pub fn empty() -> Self {
        AttrFlags(0)
    }

    pub fn contains(&self, other: AttrFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: AttrFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: AttrFlags) {
        self.0 &= !other.0;
    }
}

/// Path attributes of a route. Shared values (AS path, communities) sit
/// behind `Arc` so that rewriting one route does not touch other holders.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    pub flags: AttrFlags,
    pub origin: Origin,
    pub as_path: Arc<AsPath>,
    pub community: Option<Arc<Community>>,
    pub ecommunity: Option<Arc<ExtCommunity>>,
    pub nexthop: Ipv4Addr,
    pub med: u32,
    pub local_pref: u32,
    pub weight: u32,
    pub tag: u32,
    pub originator_id: Ipv4Addr,
    pub aggregator_as: ASN,
    pub aggregator_addr: Ipv4Addr,
    pub mp_nexthop_global: Ipv6Addr,
    pub mp_nexthop_local: Ipv6Addr,
    pub mp_nexthop_global_in: Ipv4Addr,
    pub mp_nexthop_len: u8,
    /// Set when policy rewrote the next hop; resolution must not override it.
    pub nexthop_changed_by_policy: bool,
}

impl Default for Attr {
    fn default() -> Self {
        Attr::new()
    }
}

impl Attr {
    pub fn new() -> Self {
        Attr {
            flags: AttrFlags::empty(),
            origin: Origin::Igp,
            as_path: Arc::new(AsPath::new()),
            community: None,
            ecommunity: None,
            nexthop: Ipv4Addr::UNSPECIFIED,
            med: 0,
            local_pref: 0,
            weight: 0,
            tag: 0,
            originator_id: Ipv4Addr::UNSPECIFIED,
            aggregator_as: 0,
            aggregator_addr: Ipv4Addr::UNSPECIFIED,
            mp_nexthop_global: Ipv6Addr::UNSPECIFIED,
            mp_nexthop_local: Ipv6Addr::UNSPECIFIED,
            mp_nexthop_global_in: Ipv4Addr::UNSPECIFIED,
            mp_nexthop_len: 0,
            nexthop_changed_by_policy: false,
        }
    }

    pub fn with_as_path(mut self, as_path: AsPath) -> Self {
        self.as_path = Arc::new(as_path);
        self.flags.insert(AttrFlags::AS_PATH);
        self
    }

    pub fn with_med(mut self, med: u32) -> Self {
        self.med = med;
        self.flags.insert(AttrFlags::MULTI_EXIT_DISC);
        self
    }

    pub fn with_community(mut self, community: Community) -> Self {
        self.community = Some(Arc::new(community));
        self.flags.insert(AttrFlags::COMMUNITIES);
        self
    }

    pub fn with_nexthop(mut self, nexthop: Ipv4Addr) -> Self {
        self.nexthop = nexthop;
        self.flags.insert(AttrFlags::NEXT_HOP);
        self
    }

    pub fn has(&self, flag: AttrFlags) -> bool {
        self.flags.contains(flag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteDirection {
    In,
    Out,
}

/// The neighbor a route was learned from or is being sent to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerInfo {
    pub asn: ASN,
    /// `None` for locally originated routes.
    pub remote_addr: Option<IpAddr>,
    pub local_addr: Option<IpAddr>,
}

impl PeerInfo {
    pub fn new(asn: ASN, remote_addr: IpAddr, local_addr: IpAddr) -> Self {
        PeerInfo {
            asn,
            remote_addr: Some(remote_addr),
            local_addr: Some(local_addr),
        }
    }

    pub fn local(asn: ASN) -> Self {
        PeerInfo {
            asn,
            remote_addr: None,
            local_addr: None,
        }
    }

    pub fn is_local(&self) -> bool {
        self.remote_addr.is_none()
    }
}

/// A route under policy evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct BgpRoute {
    pub peer: PeerInfo,
    pub direction: RouteDirection,
    pub attr: Attr,
    pub damp: Option<DampeningConfig>,
}

impl BgpRoute {
    pub fn new(peer: PeerInfo, direction: RouteDirection, attr: Attr) -> Self {
        BgpRoute {
            peer,
            direction,
            attr,
            damp: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_flags() {
        let mut flags = AttrFlags::empty();
        assert!(!flags.contains(AttrFlags::COMMUNITIES));
        flags.insert(AttrFlags::COMMUNITIES);
        flags.insert(AttrFlags::MULTI_EXIT_DISC);
        assert!(flags.contains(AttrFlags::COMMUNITIES));
        flags.remove(AttrFlags::COMMUNITIES);
        assert!(!flags.contains(AttrFlags::COMMUNITIES));
        assert!(flags.contains(AttrFlags::MULTI_EXIT_DISC));
    }

    #[test]
    fn test_origin_round_trip() {
        for s in ["igp", "egp", "incomplete"] {
            assert_eq!(s.parse::<Origin>().unwrap().to_string(), s);
        }
        assert!("bgp".parse::<Origin>().is_err());
    }
}
