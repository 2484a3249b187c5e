//! Service chain integration tests
//!
//! Scenario base: rule set prs1 holds one bidirectional tcp/80 rule that
//! redirects to spec s1 (two transparent nodes). Consumer c0 and the
//! provider p0 sit on bridge domain l2p1.

use gbp_fabric::{FabricError, FabricOp};
use gbp_mapping::chain::ChainInstanceStore;
use gbp_mapping::policy::{EntityKind, PolicyReader};
use gbp_mapping_test::{
    chain_fixtures::{node, spec},
    contract_fixtures::{http_classifier, policy_rule, redirect_action, rule_set},
    group_fixtures::{bridge_domain, endpoint, endpoint_group, port},
    routing_fixtures::routing_context,
    MappingHarness, TRANSPARENT,
};
use pretty_assertions::assert_eq;

fn chain_harness() -> MappingHarness {
    let mut h = MappingHarness::default();
    h.create(routing_context("l3p1")).unwrap();
    h.create(bridge_domain("l2p1", "l3p1", "net1")).unwrap();
    h.create(node("n1", TRANSPARENT)).unwrap();
    h.create(node("n2", TRANSPARENT)).unwrap();
    h.create(spec("s1", &["n1", "n2"])).unwrap();
    h.create(http_classifier("pc1")).unwrap();
    h.create(redirect_action("a1", "s1")).unwrap();
    h.create(policy_rule("r1", "pc1", &["a1"])).unwrap();
    h.create(rule_set("prs1", &["r1"])).unwrap();
    h.create(endpoint_group("c0", "l2p1", &[], &["prs1"])).unwrap();
    h
}

fn with_provider() -> (MappingHarness, String) {
    let mut h = chain_harness();
    h.create(endpoint_group("p0", "l2p1", &["prs1"], &[])).unwrap();
    let chains = h.chains();
    assert_eq!(chains.len(), 1);
    let id = chains[0].id.clone();
    (h, id)
}

fn seg(ordinal: usize, id: &str) -> String {
    format!("{}-{}", ordinal, id)
}

/// p0 provides prs1 (spec s1, two transparent nodes) and prs2 (spec s2,
/// one transparent node). Returns the two instance ids in that order.
fn with_two_chains() -> (MappingHarness, String, String) {
    let mut h = chain_harness();
    h.create(node("n3", TRANSPARENT)).unwrap();
    h.create(spec("s2", &["n3"])).unwrap();
    h.create(redirect_action("a2", "s2")).unwrap();
    h.create(policy_rule("r2", "pc1", &["a2"])).unwrap();
    h.create(rule_set("prs2", &["r2"])).unwrap();
    h.create(endpoint_group("p0", "l2p1", &["prs1", "prs2"], &[]))
        .unwrap();
    assert_eq!(h.chains().len(), 2);
    let id = |prs: &str| h.orch().chain_store().find("p0", prs).unwrap().id;
    let (first, second) = (id("prs1"), id("prs2"));
    (h, first, second)
}

fn provider_on(bd: &str) -> FabricOp {
    FabricOp::EnsureEpgCreated {
        owner: "t1".to_string(),
        epg: "p0".to_string(),
        bd_owner: "t1".to_string(),
        bd_name: bd.to_string(),
    }
}

/// Scenario:
/// 1. Provider p0 starts providing the redirecting rule set
/// 2. Expect 2 shadow bridge domains and 3 shadow endpoint groups
/// 3. p0 moves onto `0-<instance>`, `2-<instance>` provides prs1
#[test]
fn test_two_transparent_nodes_build_shadow_topology() {
    let mut h = chain_harness();
    h.reset_recording();
    h.create(endpoint_group("p0", "l2p1", &["prs1"], &[])).unwrap();

    let chains = h.chains();
    assert_eq!(chains.len(), 1);
    let sci = &chains[0];
    assert_eq!(sci.provider_epg_id, "p0");
    assert_eq!(sci.consumer_epg_id.as_deref(), Some("c0"));
    assert_eq!(sci.servicechain_specs, vec!["s1".to_string()]);
    let id = sci.id.as_str();

    let verifier = h.verifier();
    assert_eq!(
        verifier.objects("ensure_bd_created"),
        vec![seg(0, id), seg(1, id)]
    );
    assert_eq!(
        verifier.objects("ensure_epg_created"),
        vec![
            "p0".to_string(),
            seg(0, id),
            seg(1, id),
            "p0".to_string(),
            seg(2, id),
        ]
    );
    verifier
        .assert_contains(&FabricOp::EnsureEpgCreated {
            owner: "t1".to_string(),
            epg: "p0".to_string(),
            bd_owner: "t1".to_string(),
            bd_name: seg(0, id),
        })
        .unwrap();
    verifier
        .assert_contains(&FabricOp::SetContractForEpg {
            owner: "t1".to_string(),
            epg: seg(2, id),
            contract: "prs1".to_string(),
            contract_owner: "t1".to_string(),
            provider: true,
        })
        .unwrap();
    assert_eq!(h.orch().stats().chains_created, 1);
    assert_eq!(h.fabric.transactions().len(), 1, "one transaction per hook");
}

#[test]
fn test_service_port_placement() {
    let (mut h, id) = with_provider();
    for (port_id, name) in [
        ("sp1", "chain_provider_1_transparent"),
        ("sp2", "chain_consumer_2_transparent"),
        ("vm1", "web"),
    ] {
        h.add_port(port(port_id, "net1", "h1")).unwrap();
        h.create(endpoint(&format!("ep-{}", port_id), "p0", name, port_id))
            .unwrap();
    }
    h.add_port(port("dhcp", "net1", "h1")).unwrap();

    let details = h.details("tapsp1").unwrap();
    assert_eq!(details.endpoint_group_name, seg(0, &id));
    assert_eq!(details.epg_tenant, "t1");
    assert_eq!(details.ptg_id.as_deref(), Some("p0"));

    assert_eq!(h.details("tapsp2").unwrap().endpoint_group_name, seg(2, &id));
    assert_eq!(h.details("tapvm1").unwrap().endpoint_group_name, "p0");

    let shadow = h.details("tapdhcp").unwrap();
    assert_eq!(shadow.endpoint_group_name, "Shd-l2p1");
    assert_eq!(shadow.ptg_id, None);
    assert_eq!(shadow.l2_policy_id.as_deref(), Some("l2p1"));
}

#[test]
fn test_bad_device_names() {
    let (mut h, _) = with_provider();
    assert_eq!(h.details("eth0").unwrap_err().type_name(), "InvalidDevice");
    assert_eq!(h.details("tap").unwrap_err().type_name(), "InvalidDevice");
    assert_eq!(h.details("tapnope").unwrap_err().type_name(), "NotFound");
}

#[test]
fn test_chain_build_notifies_service_ports() {
    let mut h = chain_harness();
    h.create(endpoint_group("p0", "l2p1", &[], &[])).unwrap();
    h.add_port(port("sp1", "net1", "h1")).unwrap();
    h.add_port(port("vm1", "net1", "h1")).unwrap();
    h.create(endpoint("ep-sp1", "p0", "chain_provider_1_transparent", "sp1"))
        .unwrap();
    h.create(endpoint("ep-vm1", "p0", "web", "vm1")).unwrap();
    h.reset_recording();

    h.update(endpoint_group("p0", "l2p1", &["prs1"], &[])).unwrap();

    assert_eq!(h.chains().len(), 1);
    assert_eq!(h.notifier.notified(), vec!["sp1".to_string()]);
}

/// Scenario: retargeting the redirect from s1 to s2, both with two
/// transparent nodes, keeps the instance and its shadow objects.
#[test]
fn test_action_retarget_with_same_shape() {
    let (mut h, id) = with_provider();
    h.create(node("n3", TRANSPARENT)).unwrap();
    h.create(node("n4", TRANSPARENT)).unwrap();
    h.create(spec("s2", &["n3", "n4"])).unwrap();
    h.reset_recording();

    h.update(redirect_action("a1", "s2")).unwrap();

    let chains = h.chains();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].id, id);
    assert_eq!(chains[0].servicechain_specs, vec!["s2".to_string()]);
    let verifier = h.verifier();
    verifier.assert_absent("ensure_bd_created").unwrap();
    verifier.assert_absent("delete_bd").unwrap();
    assert!(h.calls().is_empty());
    assert_eq!(h.orch().stats().chains_updated, 1);
}

#[test]
fn test_action_retarget_with_new_shape_rebuilds() {
    let (mut h, id) = with_provider();
    h.create(node("n3", TRANSPARENT)).unwrap();
    h.create(spec("s3", &["n3"])).unwrap();
    h.reset_recording();

    h.update(redirect_action("a1", "s3")).unwrap();

    assert_eq!(h.chains()[0].id, id);
    let verifier = h.verifier();
    assert_eq!(verifier.objects("delete_bd"), vec![seg(1, &id), seg(0, &id)]);
    assert_eq!(verifier.objects("ensure_bd_created"), vec![seg(0, &id)]);
    verifier
        .assert_before(
            &FabricOp::DeleteBd {
                owner: "t1".to_string(),
                bd: seg(0, &id),
            },
            &FabricOp::EnsureBdCreated {
                owner: "t1".to_string(),
                bd: seg(0, &id),
                ctx_owner: "t1".to_string(),
                ctx_name: "l3p1".to_string(),
                allow_broadcast: true,
            },
        )
        .unwrap();
}

#[test]
fn test_spec_node_change_rebuilds() {
    let (mut h, id) = with_provider();
    h.create(node("lb", "LOADBALANCER")).unwrap();
    h.reset_recording();

    h.update(spec("s1", &["n1", "lb"])).unwrap();

    let verifier = h.verifier();
    assert_eq!(verifier.objects("delete_bd"), vec![seg(1, &id), seg(0, &id)]);
    assert_eq!(verifier.objects("ensure_bd_created"), vec![seg(0, &id)]);
    assert_eq!(h.chains()[0].id, id);
}

/// Scenario: deleting the sole provider leaves no instance and reverses
/// every shadow object in descending ordinal order.
#[test]
fn test_provider_delete_tears_down_chain() {
    let (mut h, id) = with_provider();
    h.reset_recording();

    h.delete(EntityKind::EndpointGroup, "p0").unwrap();

    assert!(h.chains().is_empty());
    let verifier = h.verifier();
    assert_eq!(
        verifier.objects("delete_epg"),
        vec![seg(2, &id), seg(1, &id), seg(0, &id), "p0".to_string()]
    );
    assert_eq!(verifier.objects("delete_bd"), vec![seg(1, &id), seg(0, &id)]);
    verifier.assert_absent("ensure_epg_created").unwrap();
    assert_eq!(h.orch().stats().chains_deleted, 1);
}

/// Scenario:
/// 1. p0 is spliced into two transparent chains
/// 2. p0 stops providing prs2
/// 3. Expect prs2's shadow path gone and p0 moved onto prs1's entry
///    segment, never back onto its own bridge domain
#[test]
fn test_dissolving_one_of_two_chains_keeps_provider_spliced() {
    let (mut h, first, second) = with_two_chains();
    h.reset_recording();

    h.update(endpoint_group("p0", "l2p1", &["prs1"], &[])).unwrap();

    let chains = h.chains();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].id, first);
    let verifier = h.verifier();
    assert_eq!(verifier.objects("delete_bd"), vec![seg(0, &second)]);
    verifier.assert_contains(&provider_on(&seg(0, &first))).unwrap();
    assert!(!verifier.calls().contains(&provider_on("l2p1")));
    verifier.assert_absent("ensure_bd_created").unwrap();
}

/// Scenario:
/// 1. p0 is spliced into two transparent chains
/// 2. prs1 loses its redirect rule
/// 3. Expect only prs1's instance torn down; prs2's instance keeps its id,
///    specs and shadow objects, and p0 lands on its entry segment
#[test]
fn test_rule_set_losing_redirect_dissolves_only_its_chain() {
    let (mut h, first, second) = with_two_chains();
    h.reset_recording();

    h.update(rule_set("prs1", &[])).unwrap();

    let chains = h.chains();
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].id, second);
    assert_eq!(chains[0].policy_rule_set_id, "prs2");
    assert_eq!(chains[0].servicechain_specs, vec!["s2".to_string()]);

    let verifier = h.verifier();
    assert_eq!(
        verifier.objects("delete_bd"),
        vec![seg(1, &first), seg(0, &first)]
    );
    assert_eq!(
        verifier.objects("delete_epg"),
        vec![seg(2, &first), seg(1, &first), seg(0, &first)]
    );
    verifier.assert_contains(&provider_on(&seg(0, &second))).unwrap();
    assert!(!verifier.calls().contains(&provider_on("l2p1")));
    assert!(!verifier
        .calls()
        .iter()
        .any(|op| op.object().ends_with(second.as_str())));
    assert_eq!(h.orch().stats().chains_deleted, 1);
}

#[test]
fn test_consumer_delete_hands_chain_to_next_consumer() {
    let (mut h, _) = with_provider();
    h.create(endpoint_group("c1", "l2p1", &[], &["prs1"])).unwrap();

    h.delete(EntityKind::EndpointGroup, "c0").unwrap();
    assert_eq!(h.chains()[0].consumer_epg_id.as_deref(), Some("c1"));

    h.delete(EntityKind::EndpointGroup, "c1").unwrap();
    assert_eq!(h.chains()[0].consumer_epg_id, None);
}

#[test]
fn test_fabric_failure_leaves_chain_store_untouched() {
    let mut h = chain_harness();
    h.fabric
        .fail_next_commit(FabricError::unreachable("controller down"));

    let err = h
        .create(endpoint_group("p0", "l2p1", &["prs1"], &[]))
        .unwrap_err();

    assert_eq!(err.type_name(), "FabricError");
    assert!(h.chains().is_empty());
    assert!(h.policy().endpoint_group("p0").is_none());
    assert_eq!(h.orch().stats().fabric_failures, 1);

    // The framework retries and the chain appears.
    h.create(endpoint_group("p0", "l2p1", &["prs1"], &[])).unwrap();
    assert_eq!(h.chains().len(), 1);
}

#[test]
fn test_rule_set_delete_dissolves_chain() {
    let (mut h, id) = with_provider();
    h.update(endpoint_group("p0", "l2p1", &[], &[])).unwrap();
    h.update(endpoint_group("c0", "l2p1", &[], &[])).unwrap();
    assert!(h.chains().is_empty());
    h.reset_recording();

    h.delete(EntityKind::PolicyRuleSet, "prs1").unwrap();
    let verifier = h.verifier();
    verifier.assert_count("delete_contract", 1).unwrap();
    assert!(!verifier
        .calls()
        .iter()
        .any(|op| op.object().ends_with(id.as_str())));
}
