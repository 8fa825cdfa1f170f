use bgppolicy::route::{AsPath, AttrFlags, Community};
use bgppolicy::{
    bgp_registry, load_policy, parse_policy, Attr, BgpRoute, ConfigError, FilterResult,
    FilterStore, MatchContext, PeerInfo, Prefix, RouteDirection, RouteMapMaster,
};
use std::net::Ipv4Addr;
use std::path::Path;

fn demo_policy() -> (RouteMapMaster, FilterStore) {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("demos/policy.toml");
    let config = load_policy(&path).unwrap();
    assert_eq!(config.log_level.as_deref(), Some("info"));
    let mut master = RouteMapMaster::new(bgp_registry());
    let mut store = FilterStore::new();
    config.install(&mut master, &mut store).unwrap();
    (master, store)
}

fn upstream_route(as_path: &str, community: &str) -> BgpRoute {
    let peer = PeerInfo::new(
        65001,
        "192.0.2.1".parse().unwrap(),
        "192.0.2.2".parse().unwrap(),
    );
    let attr = Attr::new()
        .with_as_path(as_path.parse::<AsPath>().unwrap())
        .with_community(community.parse::<Community>().unwrap())
        .with_med(100);
    BgpRoute::new(peer, RouteDirection::In, attr)
}

fn eval(master: &RouteMapMaster, store: &FilterStore, map: &str, prefix: &str, route: &mut BgpRoute) -> FilterResult {
    let prefix: Prefix = prefix.parse().unwrap();
    let mut ctx = MatchContext::new(route, store);
    master.apply(map, &prefix, &mut ctx)
}

#[test]
fn test_demo_policy_installs() {
    let (master, _) = demo_policy();
    assert_eq!(master.map_names(), vec!["FROM-UPSTREAM", "TO-CUSTOMER"]);
    let index = master.lookup_index("FROM-UPSTREAM", 10).unwrap();
    let order: Vec<&str> = index.set_rules().iter().map(|rule| rule.keyword()).collect();
    assert_eq!(order, vec!["ip next-hop", "metric", "community"]);
    assert!(index.set_rules().get("community").unwrap().flags().additive);
    assert_eq!(
        master.lookup_index("FROM-UPSTREAM", 5).unwrap().description(),
        Some("drop bogons")
    );
}

#[test]
fn test_demo_policy_evaluates() {
    let (master, store) = demo_policy();

    let mut route = upstream_route("65001 3356", "65001:7");
    assert_eq!(eval(&master, &store, "FROM-UPSTREAM", "10.1.0.0/16", &mut route), FilterResult::Match);
    assert_eq!(route.attr.med, 150);
    assert_eq!(route.attr.nexthop, Ipv4Addr::new(192, 0, 2, 1));
    assert_eq!(route.attr.community.as_deref().unwrap().to_string(), "65000:100 65001:7");

    let mut bogon = upstream_route("65001", "65001:7");
    assert_eq!(
        eval(&master, &store, "FROM-UPSTREAM", "192.168.1.0/24", &mut bogon),
        FilterResult::DenyMatch
    );
    assert_eq!(bogon.attr.med, 100);

    let mut private = upstream_route("65001 64512", "65001:7");
    assert_eq!(eval(&master, &store, "FROM-UPSTREAM", "203.0.113.0/24", &mut private), FilterResult::Match);
    assert_eq!(private.attr.as_path.to_string(), "65001");
    assert!(private.attr.community.is_none());
    assert!(!private.attr.has(AttrFlags::COMMUNITIES));
    assert_eq!(private.damp.as_ref().unwrap().suppress, 1500);

    let mut outbound = upstream_route("64496", "65001:7");
    assert_eq!(eval(&master, &store, "TO-CUSTOMER", "203.0.113.0/24", &mut outbound), FilterResult::Match);
    assert_eq!(outbound.attr.as_path.to_string(), "65000 65000 64496");
}

#[test]
fn test_policy_renders_back() {
    let (master, _) = demo_policy();
    let text = master.render("TO-CUSTOMER").unwrap();
    assert_eq!(
        text,
        "route-map TO-CUSTOMER permit 10\n set as-path prepend 65000 65000\n set origin igp\n!\n"
    );
    let upstream = master.render("FROM-UPSTREAM").unwrap();
    assert!(upstream.contains(" set community 65000:100 additive\n"));
    assert!(upstream.contains(" description drop bogons\n"));
}

#[test]
fn test_install_reports_bad_clause() {
    let config = parse_policy(
        r#"
        [[route_map]]
        name = "BAD"
        [[route_map.entry]]
        action = "permit"
        preference = 10
        set = ["metric lots"]
        "#,
    )
    .unwrap();
    let mut master = RouteMapMaster::new(bgp_registry());
    let mut store = FilterStore::new();
    let err = config.install(&mut master, &mut store).unwrap_err();
    assert!(matches!(err, ConfigError::Install { .. }));
    assert!(err.to_string().starts_with("route-map BAD permit 10"));
}

#[test]
fn test_install_reports_unknown_keyword() {
    let config = parse_policy(
        r#"
        [[route_map]]
        name = "BAD"
        [[route_map.entry]]
        action = "deny"
        preference = 10
        match = ["colour red"]
        "#,
    )
    .unwrap();
    let mut master = RouteMapMaster::new(bgp_registry());
    let mut store = FilterStore::new();
    assert!(matches!(
        config.install(&mut master, &mut store),
        Err(ConfigError::Install { .. })
    ));
}

#[test]
fn test_missing_file() {
    assert!(matches!(
        load_policy(Path::new("/nonexistent/policy.toml")),
        Err(ConfigError::Io(_))
    ));
}
