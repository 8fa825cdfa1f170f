use bgppolicy::route::{Attr, BgpRoute, PeerInfo, RouteDirection};
use bgppolicy::{
    bgp_registry, FilterResult, FilterStore, MatchContext, Prefix, RouteMapMaster, RouteMapType,
    RuleFlags,
};
use ipnetwork::Ipv4Network;
use proptest::prelude::*;
use rand::seq::SliceRandom;
use std::net::Ipv4Addr;

fn store() -> FilterStore {
    let mut store = FilterStore::new();
    store
        .access_list_mut("10")
        .add_entry("permit 10.0.0.0/8".parse().unwrap());
    store
        .access_list_mut("20")
        .add_entry("deny 10.0.0.0/8".parse().unwrap());
    store
        .access_list_mut("20")
        .add_entry("permit any".parse().unwrap());
    store
}

#[derive(Debug, Clone)]
struct IndexPlan {
    preference: u32,
    deny: bool,
    acl: Option<&'static str>,
    metric: Option<u32>,
}

fn index_plan() -> impl Strategy<Value = IndexPlan> {
    (
        1u32..1000,
        any::<bool>(),
        prop_oneof![Just(None), Just(Some("10")), Just(Some("20")), Just(Some("missing"))],
        proptest::option::of(any::<u32>()),
    )
        .prop_map(|(preference, deny, acl, metric)| IndexPlan {
            preference,
            deny,
            acl,
            metric,
        })
}

fn build(plans: &[IndexPlan]) -> RouteMapMaster {
    let mut master = RouteMapMaster::new(bgp_registry());
    for plan in plans {
        let kind = if plan.deny {
            RouteMapType::Deny
        } else {
            RouteMapType::Permit
        };
        master.install_index("P", kind, plan.preference);
        if let Some(acl) = plan.acl {
            master
                .install_match_rule("P", plan.preference, "ip address", Some(acl))
                .unwrap();
        }
        if let Some(metric) = plan.metric {
            master
                .install_set_rule("P", plan.preference, "metric", Some(&metric.to_string()), RuleFlags::NONE)
                .unwrap();
        }
    }
    master
}

fn route(med: u32) -> BgpRoute {
    let peer = PeerInfo::new(
        65001,
        "192.0.2.1".parse().unwrap(),
        "192.0.2.2".parse().unwrap(),
    );
    BgpRoute::new(peer, RouteDirection::In, Attr::new().with_med(med))
}

proptest! {
    #[test]
    fn apply_only_matches_or_denies(
        plans in proptest::collection::vec(index_plan(), 0..8),
        addr in any::<u32>(),
        len in 0u8..=32,
        med in any::<u32>(),
    ) {
        let master = build(&plans);
        let store = store();
        let network = Ipv4Network::new(Ipv4Addr::from(addr), len).unwrap();
        let subject = Prefix::V4(network);
        let mut route = route(med);
        let mut ctx = MatchContext::new(&mut route, &store);
        let result = master.apply("P", &subject, &mut ctx);
        prop_assert!(matches!(result, FilterResult::Match | FilterResult::DenyMatch));
        if result == FilterResult::DenyMatch {
            prop_assert_eq!(route.attr.med, med);
        }
    }

    #[test]
    fn metric_delta_never_wraps(med in any::<u32>(), delta in any::<u32>()) {
        let mut master = RouteMapMaster::new(bgp_registry());
        master.install_index("M", RouteMapType::Permit, 10);
        master
            .install_set_rule("M", 10, "metric", Some(&format!("+{}", delta)), RuleFlags::NONE)
            .unwrap();
        let store = FilterStore::new();
        let mut route = route(med);
        let mut ctx = MatchContext::new(&mut route, &store);
        master.apply("M", &"10.0.0.0/8".parse().unwrap(), &mut ctx);
        prop_assert!(route.attr.med >= med || route.attr.med == u32::MAX - 1);
    }
}

#[test]
fn test_shuffled_insertion_keeps_order() {
    let mut rng = rand::thread_rng();
    let mut prefs: Vec<u32> = (1..=50).map(|p| p * 5).collect();
    for _ in 0..20 {
        prefs.shuffle(&mut rng);
        let mut master = RouteMapMaster::new(bgp_registry());
        for pref in &prefs {
            master.install_index("S", RouteMapType::Permit, *pref);
            master
                .install_set_rule("S", *pref, "tag", Some(&pref.to_string()), RuleFlags::NONE)
                .unwrap();
        }

        let order: Vec<u32> = master
            .lookup("S")
            .unwrap()
            .indices()
            .iter()
            .map(|index| index.preference())
            .collect();
        let mut sorted = prefs.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted);

        let store = FilterStore::new();
        let mut route = route(0);
        let mut ctx = MatchContext::new(&mut route, &store);
        assert_eq!(master.apply("S", &"10.0.0.0/8".parse().unwrap(), &mut ctx), FilterResult::Match);
        assert_eq!(route.attr.tag, 5);
    }
}
