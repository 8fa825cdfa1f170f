use std::net::{IpAddr, Ipv6Addr};

use rand::Rng;

use crate::route::{Community, ExtCommunity, Origin, Prefix};
use crate::route_map::{CompiledRule, MatchContext, RuleRegistry};
use crate::rules::{parse_ip, parse_ipv6, parse_u32, required, BgpRuleCommand};
use crate::shared::{CompileError, FilterResult, ListVerdict, RuleFlags};

pub(crate) fn register(registry: &mut RuleRegistry) {
    registry.install_match(BgpRuleCommand::new("peer", compile_peer));
    registry.install_match(BgpRuleCommand::new("ip address", |arg, _| {
        ListMatch::compile(arg, ListKind::Access, Subject::Prefix)
    }));
    registry.install_match(BgpRuleCommand::new("ip address prefix-list", |arg, _| {
        ListMatch::compile(arg, ListKind::Prefix, Subject::Prefix)
    }));
    registry.install_match(BgpRuleCommand::new("ip next-hop", |arg, _| {
        ListMatch::compile(arg, ListKind::Access, Subject::NextHop)
    }));
    registry.install_match(BgpRuleCommand::new("ip next-hop prefix-list", |arg, _| {
        ListMatch::compile(arg, ListKind::Prefix, Subject::NextHop)
    }));
    registry.install_match(BgpRuleCommand::new("ip route-source", |arg, _| {
        ListMatch::compile(arg, ListKind::Access, Subject::RouteSource)
    }));
    registry.install_match(BgpRuleCommand::new("ip route-source prefix-list", |arg, _| {
        ListMatch::compile(arg, ListKind::Prefix, Subject::RouteSource)
    }));
    registry.install_match(BgpRuleCommand::new("ipv6 address", |arg, _| {
        ListMatch::compile(arg, ListKind::Access, Subject::Ipv6Prefix)
    }));
    registry.install_match(BgpRuleCommand::new("ipv6 address prefix-list", |arg, _| {
        ListMatch::compile(arg, ListKind::Prefix, Subject::Ipv6Prefix)
    }));
    registry.install_match(BgpRuleCommand::new("ipv6 next-hop", compile_ipv6_nexthop));
    registry.install_match(BgpRuleCommand::new("metric", compile_metric));
    registry.install_match(BgpRuleCommand::new("as-path", compile_as_path));
    registry.install_match(BgpRuleCommand::new("community", compile_community));
    registry.install_match(BgpRuleCommand::new("extcommunity", compile_ext_community));
    registry.install_match(BgpRuleCommand::new("origin", compile_origin));
    registry.install_match(BgpRuleCommand::new("tag", compile_tag));
    registry.install_match(BgpRuleCommand::with_comment(
        "probability",
        compile_probability,
        "match a percentage of routes at random",
    ));
}

fn matched(hit: bool) -> FilterResult {
    if hit {
        FilterResult::Match
    } else {
        FilterResult::NoMatch
    }
}

fn verdict(result: Option<ListVerdict>) -> FilterResult {
    result.map_or(FilterResult::NoMatch, FilterResult::from)
}

#[derive(Debug)]
enum PeerMatch {
    Local,
    Address(IpAddr),
}

impl CompiledRule for PeerMatch {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let peer = &ctx.route.peer;
        match self {
            PeerMatch::Local => matched(peer.is_local()),
            PeerMatch::Address(addr) => matched(peer.remote_addr == Some(*addr)),
        }
    }
}

fn compile_peer(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    match required(arg)? {
        "local" => Ok(Box::new(PeerMatch::Local)),
        addr => Ok(Box::new(PeerMatch::Address(parse_ip(addr)?))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Access,
    Prefix,
}

/// What a list match rule hands to the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Subject {
    /// The match subject prefix, IPv4 only.
    Prefix,
    Ipv6Prefix,
    /// The route's IPv4 next hop as a host prefix.
    NextHop,
    /// The address of the peer the route came from.
    RouteSource,
}

#[derive(Debug)]
struct ListMatch {
    name: String,
    kind: ListKind,
    subject: Subject,
}

impl ListMatch {
    fn compile(
        arg: Option<&str>,
        kind: ListKind,
        subject: Subject,
    ) -> Result<Box<dyn CompiledRule>, CompileError> {
        Ok(Box::new(ListMatch {
            name: required(arg)?.to_string(),
            kind,
            subject,
        }))
    }

    fn subject(&self, prefix: &Prefix, ctx: &MatchContext<'_>) -> Option<Prefix> {
        match self.subject {
            Subject::Prefix => prefix.is_ipv4().then_some(*prefix),
            Subject::Ipv6Prefix => prefix.is_ipv6().then_some(*prefix),
            Subject::NextHop => Some(Prefix::from(IpAddr::V4(ctx.route.attr.nexthop))),
            Subject::RouteSource => match ctx.route.peer.remote_addr {
                Some(addr @ IpAddr::V4(_)) => Some(Prefix::from(addr)),
                _ => None,
            },
        }
    }
}

impl CompiledRule for ListMatch {
    fn apply(&self, prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let subject = match self.subject(prefix, ctx) {
            Some(subject) => subject,
            None => return FilterResult::NoMatch,
        };
        verdict(match self.kind {
            ListKind::Access => ctx.lists.access_list(&self.name, &subject),
            ListKind::Prefix => ctx.lists.prefix_list(&self.name, &subject),
        })
    }
}

#[derive(Debug)]
struct Ipv6NexthopMatch(Ipv6Addr);

impl CompiledRule for Ipv6NexthopMatch {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let attr = &ctx.route.attr;
        let global = attr.mp_nexthop_global == self.0;
        let local = attr.mp_nexthop_len == 32 && attr.mp_nexthop_local == self.0;
        matched(global || local)
    }
}

fn compile_ipv6_nexthop(
    arg: Option<&str>,
    _flags: RuleFlags,
) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(Ipv6NexthopMatch(parse_ipv6(required(arg)?)?)))
}

#[derive(Debug)]
struct MetricMatch(u32);

impl CompiledRule for MetricMatch {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        matched(ctx.route.attr.med == self.0)
    }
}

fn compile_metric(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(MetricMatch(parse_u32(required(arg)?)?)))
}

#[derive(Debug)]
struct AsPathMatch(String);

impl CompiledRule for AsPathMatch {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        verdict(ctx.lists.as_path_list(&self.0, &ctx.route.attr.as_path))
    }
}

fn compile_as_path(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(AsPathMatch(required(arg)?.to_string())))
}

#[derive(Debug)]
struct CommunityMatch {
    name: String,
    exact: bool,
}

impl CompiledRule for CommunityMatch {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let empty = Community::new();
        let com = ctx.route.attr.community.as_deref().unwrap_or(&empty);
        verdict(ctx.lists.community_list(&self.name, com, self.exact))
    }
}

/// `NAME [exact-match]`
fn compile_community(
    arg: Option<&str>,
    _flags: RuleFlags,
) -> Result<Box<dyn CompiledRule>, CompileError> {
    let mut tokens = required(arg)?.split_whitespace();
    let name = tokens.next().unwrap_or_default().to_string();
    let exact = match tokens.next() {
        None => false,
        Some("exact-match") => true,
        Some(other) => return Err(CompileError::new(format!("unexpected token {}", other))),
    };
    if tokens.next().is_some() {
        return Err(CompileError::new("trailing tokens after exact-match"));
    }
    Ok(Box::new(CommunityMatch { name, exact }))
}

#[derive(Debug)]
struct ExtCommunityMatch(String);

impl CompiledRule for ExtCommunityMatch {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        let empty = ExtCommunity::new();
        let ecom = ctx.route.attr.ecommunity.as_deref().unwrap_or(&empty);
        verdict(ctx.lists.ext_community_list(&self.0, ecom))
    }
}

fn compile_ext_community(
    arg: Option<&str>,
    _flags: RuleFlags,
) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(ExtCommunityMatch(required(arg)?.to_string())))
}

#[derive(Debug)]
struct OriginMatch(Origin);

impl CompiledRule for OriginMatch {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        matched(ctx.route.attr.origin == self.0)
    }
}

fn compile_origin(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(OriginMatch(required(arg)?.parse()?)))
}

#[derive(Debug)]
struct TagMatch(u32);

impl CompiledRule for TagMatch {
    fn apply(&self, _prefix: &Prefix, ctx: &mut MatchContext<'_>) -> FilterResult {
        matched(ctx.route.attr.tag == self.0)
    }
}

fn compile_tag(arg: Option<&str>, _flags: RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError> {
    Ok(Box::new(TagMatch(parse_u32(required(arg)?)?)))
}

#[derive(Debug)]
struct ProbabilityMatch(u32);

impl CompiledRule for ProbabilityMatch {
    fn apply(&self, _prefix: &Prefix, _ctx: &mut MatchContext<'_>) -> FilterResult {
        matched(rand::thread_rng().gen_range(0..100) < self.0)
    }
}

fn compile_probability(
    arg: Option<&str>,
    _flags: RuleFlags,
) -> Result<Box<dyn CompiledRule>, CompileError> {
    let percent = parse_u32(required(arg)?)?;
    if percent > 100 {
        return Err(CompileError::new(format!("probability {} exceeds 100", percent)));
    }
    Ok(Box::new(ProbabilityMatch(percent)))
}
