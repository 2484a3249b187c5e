//! Concurrent hook tests
//!
//! Hooks for different objects run in parallel against one orchestrator.
//! The fabric holds every commit at a barrier so both hooks have planned
//! before either applies its chain changes.

use std::sync::{Arc, Barrier};
use std::thread;

use gbp_fabric::{FabricController, FabricResult, RecordingFabric, Transaction};
use gbp_mapping::chain::ChainInstanceStore;
use gbp_mapping::policy::{PolicyObject, PolicyStore};
use gbp_mapping::{HookContext, HookEvent, MappingConfig, MappingOrch, Phase};
use gbp_mapping_test::{
    chain_fixtures::{node, spec},
    contract_fixtures::{http_classifier, policy_rule, redirect_action, rule_set},
    group_fixtures::{bridge_domain, endpoint_group},
    init_test_logging,
    routing_fixtures::routing_context,
    TENANT, TRANSPARENT,
};
use pretty_assertions::assert_eq;

/// Records commits once `parties` of them are in flight together.
struct RendezvousFabric {
    inner: RecordingFabric,
    barrier: Barrier,
}

impl RendezvousFabric {
    fn new(parties: usize) -> Self {
        Self {
            inner: RecordingFabric::new(),
            barrier: Barrier::new(parties),
        }
    }
}

impl FabricController for RendezvousFabric {
    fn commit(&self, txn: Transaction) -> FabricResult<()> {
        self.barrier.wait();
        self.inner.commit(txn)
    }
}

/// Final state: p0 provides prs1, and prs1 holds the redirecting rule r1.
fn chained_policy() -> PolicyStore {
    let mut policy = PolicyStore::new();
    let objects: Vec<PolicyObject> = vec![
        routing_context("l3p1").into(),
        bridge_domain("l2p1", "l3p1", "net1").into(),
        node("n1", TRANSPARENT).into(),
        spec("s1", &["n1"]).into(),
        http_classifier("pc1").into(),
        redirect_action("a1", "s1").into(),
        policy_rule("r1", "pc1", &["a1"]).into(),
        rule_set("prs1", &["r1"]).into(),
        endpoint_group("c0", "l2p1", &[], &["prs1"]).into(),
        endpoint_group("p0", "l2p1", &["prs1"], &[]).into(),
    ];
    for object in objects {
        policy.upsert(object);
    }
    policy
}

/// Scenario:
/// 1. p0 starts providing prs1 while prs1 gains its redirect rule
/// 2. Both hooks plan the (p0, prs1) chain before either commits
/// 3. Expect a single instance and a single shadow path
#[test]
fn test_racing_hooks_create_one_chain() {
    init_test_logging();
    let fabric = Arc::new(RendezvousFabric::new(2));
    let orch = MappingOrch::new(MappingConfig::default(), fabric.clone());
    let policy = chained_policy();

    let provider_update = HookEvent::new(
        Phase::PostUpdate,
        endpoint_group("p0", "l2p1", &["prs1"], &[]).into(),
    )
    .with_original(endpoint_group("p0", "l2p1", &[], &[]).into());
    let rule_set_update = HookEvent::new(Phase::PostUpdate, rule_set("prs1", &["r1"]).into())
        .with_original(rule_set("prs1", &[]).into());

    thread::scope(|s| {
        for event in [&provider_update, &rule_set_update] {
            let orch = &orch;
            let policy = &policy;
            s.spawn(move || {
                let ctx = HookContext::new(TENANT, policy);
                orch.dispatch(&ctx, event).unwrap();
            });
        }
    });

    let chains = orch.chain_store().for_provider("p0");
    assert_eq!(chains.len(), 1);
    assert_eq!(chains[0].policy_rule_set_id, "prs1");
    assert_eq!(orch.stats().chains_created, 1);
    assert_eq!(fabric.inner.calls_named("ensure_bd_created").len(), 1);
    assert_eq!(fabric.inner.transactions().len(), 2);
}

/// Dissolving a chain frees its (provider, rule set) pair for a new one.
#[test]
fn test_pair_reusable_after_dissolve() {
    init_test_logging();
    let fabric = Arc::new(RecordingFabric::new());
    let orch = MappingOrch::new(MappingConfig::default(), fabric.clone());
    let mut policy = chained_policy();

    let create = |policy: &PolicyStore| {
        let ctx = HookContext::new(TENANT, policy);
        let event = HookEvent::new(
            Phase::PostUpdate,
            endpoint_group("p0", "l2p1", &["prs1"], &[]).into(),
        )
        .with_original(endpoint_group("p0", "l2p1", &[], &[]).into());
        orch.dispatch(&ctx, &event).unwrap();
    };
    create(&policy);
    let first = orch.chain_store().instances();
    assert_eq!(first.len(), 1);

    policy.upsert(endpoint_group("p0", "l2p1", &[], &[]).into());
    let ctx = HookContext::new(TENANT, &policy);
    let event = HookEvent::new(
        Phase::PostUpdate,
        endpoint_group("p0", "l2p1", &[], &[]).into(),
    )
    .with_original(endpoint_group("p0", "l2p1", &["prs1"], &[]).into());
    orch.dispatch(&ctx, &event).unwrap();
    assert!(orch.chain_store().instances().is_empty());

    policy.upsert(endpoint_group("p0", "l2p1", &["prs1"], &[]).into());
    create(&policy);
    let second = orch.chain_store().instances();
    assert_eq!(second.len(), 1);
    assert_ne!(second[0].id, first[0].id);
}
