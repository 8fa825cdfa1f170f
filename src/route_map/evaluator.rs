use tracing::trace;

use crate::filter::ListMatcher;
use crate::route::{BgpRoute, Prefix};
use crate::route_map::map::RouteMap;
use crate::shared::FilterResult;

/// The route under evaluation plus the lists its match rules consult. The
/// route is borrowed for one evaluation and rewritten in place.
pub struct MatchContext<'a> {
    pub route: &'a mut BgpRoute,
    pub lists: &'a dyn ListMatcher,
}

impl<'a> MatchContext<'a> {
    pub fn new(route: &'a mut BgpRoute, lists: &'a dyn ListMatcher) -> Self {
        MatchContext { route, lists }
    }
}

/// Walks the indices of `map` in preference order. The first index whose
/// match rules all match decides: a deny index rejects the route, a permit
/// index runs its set rules and accepts it. A missing map or a route that
/// matches no index is rejected.
///
/// `prefix` is the match subject handed to the rules. It is usually the
/// prefix being filtered but may be synthesized by the caller, as when
/// redistribution checks a route against routing-table state.
pub fn route_map_apply(
    map: Option<&RouteMap>,
    prefix: &Prefix,
    ctx: &mut MatchContext<'_>,
) -> FilterResult {
    let map = match map {
        Some(map) => map,
        None => return FilterResult::DenyMatch,
    };

    for index in map.indices() {
        let result = index.apply(prefix, ctx);
        trace!(
            map = %map.name(),
            preference = index.preference(),
            %prefix,
            %result,
            "route-map index evaluated"
        );
        match result {
            FilterResult::Match | FilterResult::DenyMatch => return result,
            _ => continue,
        }
    }
    FilterResult::DenyMatch
}
