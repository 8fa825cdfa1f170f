use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use crate::route::{
    AsPath, AttrFlags, Community, DampeningConfig, ExtCommunity, ExtCommunityKind, Origin, Prefix,
    RouteDirection, ASN, BGP_MED_MAX,
};
use crate::route_map::{CompiledRule, MatchContext, RuleRegistry};
use crate::rules::{no_argument, parse_ipv4, parse_ipv6, parse_u32, required, BgpRuleCommand};
use crate::shared::{CompileError, FilterResult, RuleFlags};

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.install_set(BgpRuleCommand::new("ip next-hop", compile_nexthop));
    registry.install_set(BgpRuleCommand::new("local-preference", compile_local_pref));
    registry.install_set(BgpRuleCommand::new("weight", compile_weight));
    registry.install_set(BgpRuleCommand::with_comment(
        "metric",
        compile_metric,
        "absolute value or +/- delta",
    ));
    registry.install_set(BgpRuleCommand::new("as-path prepend", compile_prepend));
    registry.install_set(BgpRuleCommand::new("as-path exclude", compile_exclude));
    registry.install_set(BgpRuleCommand::new("community", compile_community));
    registry.install_set(BgpRuleCommand::new("comm-list", compile_comm_list_delete));
    registry.install_set(BgpRuleCommand::new("extcommunity rt", |arg, _| {
        ExtCommunitySet::compile(arg, ExtCommunityKind::RouteTarget)
    }));
    registry.install_set(BgpRuleCommand::new("extcommunity soo", |arg, _| {
        ExtCommunitySet::compile(arg, ExtCommunityKind::SiteOfOrigin)
    }));
    registry.install_set(BgpRuleCommand::new("origin", compile_origin));
    registry.install_set(BgpRuleCommand::new("atomic-aggregate", compile_atomic_aggregate));
    registry.install_set(BgpRuleCommand::new("aggregator as", compile_aggregator));
    registry.install_set(BgpRuleCommand::new("ipv6 next-hop global", |arg, _| {
        Ipv6NexthopSet::compile(arg, false)
    }));
    registry.install_set(BgpRuleCommand::new("ipv6 next-hop local", |arg, _| {
        Ipv6NexthopSet::compile(arg, true)
    }));
    registry.install_set(BgpRuleCommand::new("vpnv4 next-hop", compile_vpnv4_nexthop));
    registry.install_set(BgpRuleCommand::new("originator-id", compile_originator_id));
    registry.install_set(BgpRuleCommand::new("tag", compile_tag));
    registry.install_set(BgpRuleCommand::with_comment(
        "dampening",
        compile_dampening,
        "half-life reuse suppress max-suppress unreach-half-life",
    ));
}

#[derive(Debug)]
enum NexthopSet {
    PeerAddress,
    Address(Ipv4Addr),
}

impl CompiledRule for NexthopSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let route = &mut *ctx.route;
        let nexthop = match self {
            NexthopSet::Address(addr) => *addr,
            NexthopSet::PeerAddress => {
                let peer_addr = match route.direction {
                    RouteDirection::In => route.peer.remote_addr,
                    RouteDirection::Out => route.peer.local_addr,
                };
                match peer_addr {
                    Some(IpAddr::V4(addr)) => addr,
                    _ => return FilterResult::Okay,
                }
            }
        };
        route.attr.nexthop = nexthop;
        route.attr.flags.insert(AttrFlags::NEXT_HOP);
        route.attr.nexthop_changed_by_policy = true;
        FilterResult::Okay
    }
}

fn compile_nexthop(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    match required(arg)? {
        "peer-address" => Ok(Box::new(NexthopSet::PeerAddress)),
        addr => Ok(Box::new(NexthopSet::Address(parse_ipv4(addr)?))),
    }
}

#[derive(Debug)]
struct LocalPrefSet(u32);

impl CompiledRule for LocalPrefSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let attr = &mut ctx.route.attr;
        attr.local_pref = self.0;
        attr.flags.insert(AttrFlags::LOCAL_PREF);
        FilterResult::Okay
    }
}

fn compile_local_pref(
    arg: Option<&str>,
    _flags: RuleFlags,
) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(LocalPrefSet(parse_u32(required(arg)?)?)))
}

#[derive(Debug)]
struct WeightSet(u32);

impl CompiledRule for WeightSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        ctx.route.attr.weight = self.0;
        FilterResult::Okay
    }
}

fn compile_weight(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(WeightSet(parse_u32(required(arg)?)?)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricSet {
    Absolute(u32),
    Add(u32),
    Sub(u32),
}

impl MetricSet {
    /// New MED for a route currently carrying `med`. An addition that would
    /// pass half the range on both operands clamps to `BGP_MED_MAX - 1`;
    /// subtraction stops at zero.
    pub fn compute(&self, med: u32) -> u32 {
        match *self {
            MetricSet::Absolute(value) => value,
            MetricSet::Add(delta) => {
                if med / 2 + delta / 2 > BGP_MED_MAX / 2 {
                    BGP_MED_MAX - 1
                } else {
                    med.saturating_add(delta)
                }
            }
            MetricSet::Sub(delta) => {
                if med <= delta {
                    0
                } else {
                    med - delta
                }
            }
        }
    }
}

impl CompiledRule for MetricSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let attr = &mut ctx.route.attr;
        if !attr.has(AttrFlags::MULTI_EXIT_DISC) {
            attr.med = 0;
        }
        attr.flags.insert(AttrFlags::MULTI_EXIT_DISC);
        attr.med = self.compute(attr.med);
        FilterResult::Okay
    }
}

fn compile_metric(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    let arg = required(arg)?;
    let set = if let Some(delta) = arg.strip_prefix('+') {
        MetricSet::Add(parse_u32(delta)?)
    } else if let Some(delta) = arg.strip_prefix('-') {
        MetricSet::Sub(parse_u32(delta)?)
    } else {
        MetricSet::Absolute(parse_u32(arg)?)
    };
    Ok(Box::new(set))
}

fn parse_asns(arg: &str) -> Result<Vec<ASN>, CompileError> {
    arg.split_whitespace()
        .map(|token| {
            token
                .parse::<ASN>()
                .ok()
                .filter(|asn| *asn != 0)
                .ok_or_else(|| CompileError::new(format!("malformed AS number {}", token)))
        })
        .collect()
}

/// Prepends a fixed fragment. A path whose latest edit was this same
/// prepend is left alone, so evaluating an attribute twice adds the
/// fragment once.
#[derive(Debug)]
struct PrependSet(AsPath);

impl CompiledRule for PrependSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let attr = &mut ctx.route.attr;
        if attr.as_path.was_prepended_with(&self.0) {
            return FilterResult::Okay;
        }
        Arc::make_mut(&mut attr.as_path).prepend(&self.0);
        attr.flags.insert(AttrFlags::AS_PATH);
        FilterResult::Okay
    }
}

fn compile_prepend(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    let asns = parse_asns(required(arg)?)?;
    Ok(Box::new(PrependSet(AsPath::from_sequence(asns))))
}

#[derive(Debug)]
struct ExcludeSet(Vec<ASN>);

impl CompiledRule for ExcludeSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let attr = &mut ctx.route.attr;
        if self.0.iter().any(|asn| attr.as_path.contains(*asn)) {
            Arc::make_mut(&mut attr.as_path).exclude(&self.0);
        }
        FilterResult::Okay
    }
}

fn compile_exclude(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(ExcludeSet(parse_asns(required(arg)?)?)))
}

#[derive(Debug)]
enum CommunitySet {
    None,
    Additive(Community),
    Replace(Community),
}

impl CompiledRule for CommunitySet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let attr = &mut ctx.route.attr;
        let new = match self {
            CommunitySet::None => None,
            CommunitySet::Additive(com) => {
                let mut merged = attr.community.as_deref().cloned().unwrap_or_default();
                merged.merge(com);
                merged.uniq_sort();
                Some(merged).filter(|merged| !merged.is_empty())
            }
            CommunitySet::Replace(com) => Some(com.clone()),
        };
        match new {
            Some(com) => {
                attr.community = Some(Arc::new(com));
                attr.flags.insert(AttrFlags::COMMUNITIES);
            }
            None => {
                attr.community = None;
                attr.flags.remove(AttrFlags::COMMUNITIES);
            }
        }
        FilterResult::Okay
    }
}

fn compile_community(arg: Option<&str>, flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    let arg = required(arg)?;
    if arg == "none" {
        return Ok(Box::new(CommunitySet::None));
    }
    let com = arg.parse::<Community>()?;
    if flags.additive {
        Ok(Box::new(CommunitySet::Additive(com)))
    } else {
        Ok(Box::new(CommunitySet::Replace(com)))
    }
}

#[derive(Debug)]
struct CommListDelete(String);

impl CompiledRule for CommListDelete {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let lists = ctx.lists;
        let attr = &mut ctx.route.attr;
        let current = match attr.community.as_deref() {
            Some(com) => com,
            None => return FilterResult::Okay,
        };
        let mut remaining = match lists.community_list_delete(&self.0, current) {
            Some(remaining) => remaining,
            None => return FilterResult::Okay,
        };
        remaining.uniq_sort();
        if remaining.is_empty() {
            attr.community = None;
            attr.flags.remove(AttrFlags::COMMUNITIES);
        } else {
            attr.community = Some(Arc::new(remaining));
        }
        FilterResult::Okay
    }
}

/// `NAME delete`
fn compile_comm_list_delete(
    arg: Option<&str>,
    _flags: RuleFlags,
) -> Result<Box<dyn CompiledRule>, CompileError> {
    let tokens: Vec<&str> = required(arg)?.split_whitespace().collect();
    match tokens.as_slice() {
        [name, "delete"] => Ok(Box::new(CommListDelete(name.to_string()))),
        _ => Err(CompileError::new("expected NAME delete")),
    }
}

#[derive(Debug)]
struct ExtCommunitySet(ExtCommunity);

impl ExtCommunitySet {
    fn compile(
        arg: Option<&str>,
        kind: ExtCommunityKind,
    ) -> Result<Box<dyn CompiledRule>, CompileError> {
        Ok(Box::new(ExtCommunitySet(ExtCommunity::parse(kind, required(arg)?)?)))
    }
}

impl CompiledRule for ExtCommunitySet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let attr = &mut ctx.route.attr;
        match attr.ecommunity.as_mut() {
            Some(ecom) => Arc::make_mut(ecom).merge(&self.0),
            None => attr.ecommunity = Some(Arc::new(self.0.clone())),
        }
        attr.flags.insert(AttrFlags::EXT_COMMUNITIES);
        FilterResult::Okay
    }
}

#[derive(Debug)]
struct OriginSet(Origin);

impl CompiledRule for OriginSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let attr = &mut ctx.route.attr;
        attr.origin = self.0;
        attr.flags.insert(AttrFlags::ORIGIN);
        FilterResult::Okay
    }
}

fn compile_origin(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(OriginSet(required(arg)?.parse()?)))
}

#[derive(Debug)]
struct AtomicAggregateSet;

impl CompiledRule for AtomicAggregateSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        ctx.route.attr.flags.insert(AttrFlags::ATOMIC_AGGREGATE);
        FilterResult::Okay
    }
}

fn compile_atomic_aggregate(
    arg: Option<&str>,
    _flags: RuleFlags,
) -> Result<Box<dyn CompiledRule>, CompileError> {
    no_argument(arg)?;
    Ok(Box::new(AtomicAggregateSet))
}

#[derive(Debug)]
struct AggregatorSet {
    asn: ASN,
    addr: Ipv4Addr,
}

impl CompiledRule for AggregatorSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let attr = &mut ctx.route.attr;
        attr.aggregator_as = self.asn;
        attr.aggregator_addr = self.addr;
        attr.flags.insert(AttrFlags::AGGREGATOR);
        FilterResult::Okay
    }
}

/// `ASN A.B.C.D`
fn compile_aggregator(
    arg: Option<&str>,
    _flags: RuleFlags,
) -> Result<Box<dyn CompiledRule>, CompileError> {
    let tokens: Vec<&str> = required(arg)?.split_whitespace().collect();
    match tokens.as_slice() {
        [asn, addr] => Ok(Box::new(AggregatorSet {
            asn: parse_u32(asn)?,
            addr: parse_ipv4(addr)?,
        })),
        _ => Err(CompileError::new("expected ASN A.B.C.D")),
    }
}

#[derive(Debug)]
struct Ipv6NexthopSet {
    addr: Ipv6Addr,
    link_local: bool,
}

impl Ipv6NexthopSet {
    fn compile(arg: Option<&str>, link_local: bool) -> Result<Box<dyn CompiledRule>, CompileError> {
        Ok(Box::new(Ipv6NexthopSet {
            addr: parse_ipv6(required(arg)?)?,
            link_local,
        }))
    }
}

impl CompiledRule for Ipv6NexthopSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let attr = &mut ctx.route.attr;
        if self.link_local {
            attr.mp_nexthop_local = self.addr;
            attr.mp_nexthop_len = 32;
        } else {
            attr.mp_nexthop_global = self.addr;
            if attr.mp_nexthop_len == 0 {
                attr.mp_nexthop_len = 16;
            }
        }
        attr.nexthop_changed_by_policy = true;
        FilterResult::Okay
    }
}

#[derive(Debug)]
struct Vpnv4NexthopSet(Ipv4Addr);

impl CompiledRule for Vpnv4NexthopSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        ctx.route.attr.mp_nexthop_global_in = self.0;
        FilterResult::Okay
    }
}

fn compile_vpnv4_nexthop(
    arg: Option<&str>,
    _flags: RuleFlags,
) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(Vpnv4NexthopSet(parse_ipv4(required(arg)?)?)))
}

#[derive(Debug)]
struct OriginatorIdSet(Ipv4Addr);

impl CompiledRule for OriginatorIdSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let attr = &mut ctx.route.attr;
        attr.originator_id = self.0;
        attr.flags.insert(AttrFlags::ORIGINATOR_ID);
        FilterResult::Okay
    }
}

fn compile_originator_id(
    arg: Option<&str>,
    _flags: RuleFlags,
) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(OriginatorIdSet(parse_ipv4(required(arg)?)?)))
}

#[derive(Debug)]
struct TagSet(u32);

impl CompiledRule for TagSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        ctx.route.attr.tag = self.0;
        FilterResult::Okay
    }
}

fn compile_tag(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(TagSet(parse_u32(required(arg)?)?)))
}

#[derive(Debug)]
struct DampeningSet(DampeningConfig);

impl CompiledRule for DampeningSet {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        ctx.route.damp = Some(self.0.clone());
        FilterResult::Okay
    }
}

/// Without an argument the defaults apply.
fn compile_dampening(
    arg: Option<&str>,
    _flags: RuleFlags,
) -> Result<Box<dyn CompiledRule>, CompileError> {
    let config = arg.unwrap_or("").parse::<DampeningConfig>()?;
    Ok(Box::new(DampeningSet(config)))
}
