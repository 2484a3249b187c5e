//! HA address ownership integration tests

use gbp_mapping::ha_ip::IpOwnerInfo;
use gbp_mapping_test::{
    group_fixtures::{bridge_domain, port},
    routing_fixtures::routing_context,
    MappingHarness,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn owners(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

fn report(port: &str, ip: &str) -> IpOwnerInfo {
    IpOwnerInfo {
        port: port.to_string(),
        ip_address_v4: Some(ip.to_string()),
        ..IpOwnerInfo::default()
    }
}

fn ha_harness() -> MappingHarness {
    let mut h = MappingHarness::default();
    h.create(routing_context("l3p1")).unwrap();
    h.create(bridge_domain("l2p1", "l3p1", "net1")).unwrap();
    h.add_port(port("p1", "net1", "h1")).unwrap();
    h.add_port(port("p2", "net1", "h2")).unwrap();
    h.reset_recording();
    h
}

#[test]
fn test_claim_is_idempotent() {
    let mut h = ha_harness();
    assert_eq!(h.ip_owner(report("p1", "10.0.0.10")).unwrap(), owners(&["p1"]));
    assert_eq!(h.ip_owner(report("p1", "10.0.0.10")).unwrap(), owners(&["p1"]));

    assert_eq!(h.orch().ha_ip().associations().unwrap().len(), 1);
    assert_eq!(
        h.details("tapp1").unwrap().owned_addresses,
        vec!["10.0.0.10".to_string()]
    );
    assert!(h.calls().is_empty(), "ownership never reaches the fabric");
}

#[test]
fn test_claim_moves_address_and_notifies_both_ports() {
    let mut h = ha_harness();
    h.ip_owner(report("p1", "10.0.0.10")).unwrap();
    h.reset_recording();

    assert_eq!(
        h.ip_owner(report("p2", "10.0.0.10")).unwrap(),
        owners(&["p1", "p2"])
    );
    assert_eq!(h.notifier.notified(), vec!["p1".to_string(), "p2".to_string()]);
    assert!(h.details("tapp1").unwrap().owned_addresses.is_empty());
    assert_eq!(
        h.details("tapp2").unwrap().owned_addresses,
        vec!["10.0.0.10".to_string()]
    );
}

#[test]
fn test_dual_stack_report() {
    let mut h = ha_harness();
    let info = IpOwnerInfo {
        port: "p1".to_string(),
        ip_address_v4: Some("10.0.0.10".to_string()),
        ip_address_v6: Some("2001:db8::10".to_string()),
        network_id: None,
    };
    h.ip_owner(info).unwrap();

    assert_eq!(
        h.details("tapp1").unwrap().owned_addresses,
        vec!["10.0.0.10".to_string(), "2001:db8::10".to_string()]
    );
}

#[test]
fn test_unknown_port_report_ignored() {
    let mut h = ha_harness();
    assert!(h.ip_owner(report("ghost", "10.0.0.10")).unwrap().is_empty());
    assert!(h.orch().ha_ip().associations().unwrap().is_empty());
    assert!(h.notifier.notified().is_empty());
}

#[test]
fn test_empty_report_changes_nothing() {
    let mut h = ha_harness();
    let info = IpOwnerInfo {
        port: "p1".to_string(),
        ..IpOwnerInfo::default()
    };
    assert!(h.ip_owner(info).unwrap().is_empty());
    assert!(h.notifier.notified().is_empty());
}

#[test]
fn test_port_delete_releases_addresses() {
    let mut h = ha_harness();
    h.ip_owner(report("p1", "10.0.0.10")).unwrap();
    h.delete_port("p1").unwrap();

    assert!(h.orch().ha_ip().associations().unwrap().is_empty());
    assert_eq!(h.ip_owner(report("p2", "10.0.0.10")).unwrap(), owners(&["p2"]));
}
