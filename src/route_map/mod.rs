//! Generic route-map framework: rule registry, ordered rule lists, indices,
//! maps and the evaluator that walks them.

pub mod evaluator;
pub mod hooks;
pub mod index;
pub mod map;
pub mod registry;
pub mod rule;

pub use evaluator::{route_map_apply, MatchContext};
pub use hooks::RouteMapHooks;
pub use index::RouteMapIndex;
pub use map::{RouteMap, RouteMapMaster};
pub use registry::{CompiledRule, RuleCommand, RuleKind, RuleRegistry};
pub use rule::{Rule, RuleList};
