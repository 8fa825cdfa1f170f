// Re-export all public modules
pub mod config;
pub mod filter;
pub mod route;
pub mod route_map;
pub mod rules;
pub mod shared;

// Re-export commonly used types at the crate root
pub use config::{load_policy, parse_policy, ConfigError, PolicyConfig};
pub use filter::{FilterAction, FilterStore, ListMatcher};
pub use route::{Attr, AttrFlags, BgpRoute, Origin, PeerInfo, Prefix, RouteDirection, ASN};
pub use route_map::{
    route_map_apply, MatchContext, RouteMap, RouteMapHooks, RouteMapIndex, RouteMapMaster,
    RuleRegistry,
};
pub use rules::{bgp_registry, register_bgp_rules};
pub use shared::{FilterResult, RouteMapError, RouteMapEvent, RouteMapType, RuleFlags};
