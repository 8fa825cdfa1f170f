//! BGP match and set rules registered into a [`RuleRegistry`].

pub mod match_rules;
pub mod set_rules;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use crate::route_map::{CompiledRule, RuleCommand, RuleRegistry};
use crate::shared::{CompileError, RuleFlags};

pub type CompileFn = fn(Option<&str>, RuleFlags) -> Result<Box<dyn CompiledRule>, CompileError>;

/// A rule type backed by a plain compile function.
pub struct BgpRuleCommand {
    keyword: &'static str,
    compile: CompileFn,
    comment: Option<&'static str>,
}

impl BgpRuleCommand {
    pub fn new(keyword: &'static str, compile: CompileFn) -> Arc<dyn RuleCommand> {
        Arc::new(BgpRuleCommand {
            keyword,
            compile,
            comment: None,
        })
    }

    pub fn with_comment(
        keyword: &'static str,
        compile: CompileFn,
        comment: &'static str,
    ) -> Arc<dyn RuleCommand> {
        Arc::new(BgpRuleCommand {
            keyword,
            compile,
            comment: Some(comment),
        })
    }
}

impl RuleCommand for BgpRuleCommand {
    fn keyword(&self) -> &str {
        self.keyword
    }

    fn compile(
        &self,
        arg: Option<&str>,
        flags: RuleFlags,
    ) -> Result<Box<dyn CompiledRule>, CompileError> {
        (self.compile)(arg, flags)
    }

    fn comment(&self) -> Option<&str> {
        self.comment
    }
}

/// Installs every BGP match and set rule.
pub fn register_bgp_rules(registry: &mut RuleRegistry) {
    match_rules::register(registry);
    set_rules::register(registry);
}

/// Registry preloaded with the BGP rules.
pub fn bgp_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    register_bgp_rules(&mut registry);
    registry
}

fn required(arg: Option<&str>) -> Result<&str, CompileError> {
    match arg.map(str::trim) {
        Some(arg) if !arg.is_empty() => Ok(arg),
        _ => Err(CompileError::new("argument required")),
    }
}

fn no_argument(arg: Option<&str>) -> Result<(), CompileError> {
    match arg.map(str::trim) {
        Some(arg) if !arg.is_empty() => {
            Err(CompileError::new(format!("unexpected argument {}", arg)))
        }
        _ => Ok(()),
    }
}

fn parse_u32(arg: &str) -> Result<u32, CompileError> {
    if !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CompileError::new(format!("{} is not a number", arg)));
    }
    arg.parse::<u32>()
        .map_err(|_| CompileError::new(format!("{} is out of range", arg)))
}

fn parse_ipv4(arg: &str) -> Result<Ipv4Addr, CompileError> {
    arg.parse::<Ipv4Addr>()
        .map_err(|_| CompileError::new(format!("malformed IPv4 address {}", arg)))
}

fn parse_ipv6(arg: &str) -> Result<Ipv6Addr, CompileError> {
    arg.parse::<Ipv6Addr>()
        .map_err(|_| CompileError::new(format!("malformed IPv6 address {}", arg)))
}

fn parse_ip(arg: &str) -> Result<IpAddr, CompileError> {
    arg.parse::<IpAddr>()
        .map_err(|_| CompileError::new(format!("malformed address {}", arg)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route_map::RuleKind;

    #[test]
    fn test_catalogue_is_complete() {
        let registry = bgp_registry();
        for keyword in [
            "peer",
            "ip address",
            "ip address prefix-list",
            "ip next-hop",
            "ip next-hop prefix-list",
            "ip route-source",
            "ip route-source prefix-list",
            "ipv6 address",
            "ipv6 address prefix-list",
            "ipv6 next-hop",
            "metric",
            "as-path",
            "community",
            "extcommunity",
            "origin",
            "tag",
            "probability",
        ] {
            assert!(registry.lookup_match(keyword).is_some(), "match {}", keyword);
        }
        for keyword in [
            "ip next-hop",
            "local-preference",
            "weight",
            "metric",
            "as-path prepend",
            "as-path exclude",
            "community",
            "comm-list",
            "extcommunity rt",
            "extcommunity soo",
            "origin",
            "atomic-aggregate",
            "aggregator as",
            "ipv6 next-hop global",
            "ipv6 next-hop local",
            "vpnv4 next-hop",
            "originator-id",
            "tag",
            "dampening",
        ] {
            assert!(registry.lookup_set(keyword).is_some(), "set {}", keyword);
        }
        assert_eq!(
            registry.split_clause(RuleKind::Set, "as-path prepend 65001 65001"),
            Some(("as-path prepend".to_string(), Some("65001 65001")))
        );
    }

    #[test]
    fn test_argument_helpers() {
        assert!(required(None).is_err());
        assert!(required(Some("  ")).is_err());
        assert_eq!(required(Some(" 5 ")).unwrap(), "5");
        assert!(no_argument(Some("x")).is_err());
        assert!(no_argument(None).is_ok());
        assert_eq!(parse_u32("4294967295").unwrap(), u32::MAX);
        assert!(parse_u32("4294967296").is_err());
        assert!(parse_u32("+5").is_err());
    }
}
