//! Agent-facing queries and reports.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::hooks::HookContext;
use super::orch::{Counters, HookPlan, MappingOrch};
use crate::audit::AuditCategory;
use crate::error::{MappingError, MappingResult};
use crate::ha_ip::IpOwnerInfo;
use crate::naming::shadow_epg_name;
use crate::policy::{EndpointGroup, Port};
use crate::shadow::{placement_epg, ChainRole};

/// Prefix of agent device names; the rest is the port id.
pub const DEVICE_PREFIX: &str = "tap";

/// What an agent programs a port with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GbpDetails {
    pub device: String,
    pub port_id: String,
    /// Policy endpoint group, absent for ports outside any group
    pub ptg_id: Option<String>,
    /// Fabric endpoint group the port is placed in
    pub endpoint_group_name: String,
    pub epg_tenant: String,
    pub l2_policy_id: Option<String>,
    pub host: String,
    /// Floating addresses the port currently answers for
    pub owned_addresses: Vec<String>,
}

impl MappingOrch {
    /// Resolves where a port belongs on the fabric. Read only.
    #[instrument(skip(self, ctx))]
    pub fn get_gbp_details(
        &self,
        ctx: &HookContext<'_>,
        device: &str,
        host: &str,
    ) -> MappingResult<GbpDetails> {
        let port_id = device
            .strip_prefix(DEVICE_PREFIX)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| MappingError::InvalidDevice(device.to_string()))?;
        let port = ctx
            .policy
            .port(port_id)
            .ok_or_else(|| MappingError::not_found("port", port_id))?;

        let (ptg_id, endpoint_group_name, epg_tenant, l2_policy_id) =
            match ctx.policy.endpoint_for_port(port_id) {
                Some(ep) => {
                    let epg = ctx.policy.endpoint_group(&ep.endpoint_group_id).ok_or_else(|| {
                        MappingError::not_found("endpoint_group", &ep.endpoint_group_id)
                    })?;
                    let (name, tenant) = self.placement(ctx, &epg, &ep.name)?;
                    (Some(epg.id.clone()), name, tenant, Some(epg.bridge_domain_id))
                }
                None => {
                    let bd = ctx
                        .policy
                        .bridge_domain_for_network(&port.network_id)
                        .ok_or_else(|| MappingError::not_found("bridge_domain", &port.network_id))?;
                    debug!(port_id, bd = %bd.id, "Port has no endpoint, using shadow group");
                    (
                        None,
                        shadow_epg_name(&self.name(&bd.id)),
                        self.owner_of(&bd),
                        Some(bd.id),
                    )
                }
            };

        Counters::bump(&self.counters.details_served);
        Ok(GbpDetails {
            device: device.to_string(),
            port_id: port_id.to_string(),
            ptg_id,
            endpoint_group_name,
            epg_tenant,
            l2_policy_id,
            host: host.to_string(),
            owned_addresses: self.ha_ip.ips_of(port_id)?,
        })
    }

    /// Fabric group (and its owner) for an endpoint named `endpoint_name`.
    fn placement(
        &self,
        ctx: &HookContext<'_>,
        epg: &EndpointGroup,
        endpoint_name: &str,
    ) -> MappingResult<(String, String)> {
        let plain = (self.name(&epg.id), self.owner_of(epg));
        let Some(role) = ChainRole::parse(endpoint_name) else {
            return Ok(plain);
        };
        let Some(instance) = self.chains.for_provider(&epg.id).into_iter().next() else {
            debug!(epg = %epg.id, endpoint_name, "Service port outside any chain");
            return Ok(plain);
        };
        let nodes = self.chain_node_kinds(ctx.policy, &instance.servicechain_specs, None);
        let name = placement_epg(&instance.id, &plain.0, &nodes, &role);
        if name == plain.0 {
            return Ok(plain);
        }
        let bd = self.epg_bridge_domain(ctx, epg)?;
        let (shadow_owner, _) = self.bd_context(ctx, &bd);
        Ok((name, shadow_owner))
    }

    /// Applies an agent's floating address report and pushes placement to
    /// every port whose ownership changed.
    pub fn update_ip_owner(
        &self,
        ctx: &HookContext<'_>,
        info: &IpOwnerInfo,
    ) -> MappingResult<BTreeSet<String>> {
        let Some(port) = ctx.policy.port(&info.port) else {
            debug!(port_id = %info.port, "Ignoring IP owner report for unknown port");
            return Ok(BTreeSet::new());
        };
        let affected = self.ha_ip.update_ip_owner(info, &port)?;

        let mut plan = HookPlan::new(format!("update_ip_owner:{}", info.port));
        for port_id in &affected {
            if let Some(port) = ctx.policy.port(port_id) {
                plan.notify(port);
            }
        }
        self.commit(plan, AuditCategory::Ownership, "port", &info.port, ctx.tenant_id)?;
        Ok(affected)
    }

    /// Drops a deleted port's floating address ownership.
    pub fn port_deleted(&self, port: &Port) -> MappingResult<usize> {
        Ok(self.ha_ip.port_deleted(&port.id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MappingConfig;
    use crate::ha_ip::MemoryHaIpStore;
    use crate::notifier::RecordingNotifier;
    use crate::policy::{BridgeDomain, Endpoint, PolicyObject, PolicyStore};
    use gbp_fabric::RecordingFabric;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn port(id: &str) -> Port {
        Port {
            id: id.to_string(),
            network_id: "net1".to_string(),
            host: Some("h1".to_string()),
            device_owner: None,
        }
    }

    fn policy() -> PolicyStore {
        let mut policy = PolicyStore::new();
        policy.upsert(PolicyObject::BridgeDomain(BridgeDomain {
            id: "l2p1".to_string(),
            tenant_id: "t1".to_string(),
            shared: false,
            routing_context_id: "l3p1".to_string(),
            allow_broadcast: true,
            network_id: "net1".to_string(),
            subnets: vec![],
        }));
        policy.upsert(PolicyObject::EndpointGroup(EndpointGroup {
            id: "ptg1".to_string(),
            tenant_id: "t1".to_string(),
            shared: false,
            bridge_domain_id: "l2p1".to_string(),
            subnets: vec![],
            provided_policy_rule_sets: BTreeMap::new(),
            consumed_policy_rule_sets: BTreeMap::new(),
        }));
        policy.upsert_port(port("port1"));
        policy.upsert_port(port("port2"));
        policy
    }

    fn orch() -> MappingOrch {
        MappingOrch::new(MappingConfig::default(), Arc::new(RecordingFabric::new()))
    }

    #[test]
    fn test_port_in_group() {
        let orch = orch();
        let mut policy = policy();
        policy.upsert(PolicyObject::Endpoint(Endpoint {
            id: "pt1".to_string(),
            name: "web".to_string(),
            endpoint_group_id: "ptg1".to_string(),
            port_id: Some("port1".to_string()),
            explicit_port: false,
        }));
        let ctx = HookContext::new("t1", &policy);

        let details = orch.get_gbp_details(&ctx, "tapport1", "h1").unwrap();
        assert_eq!(details.port_id, "port1");
        assert_eq!(details.ptg_id.as_deref(), Some("ptg1"));
        assert_eq!(details.endpoint_group_name, "ptg1");
        assert_eq!(details.epg_tenant, "t1");
        assert_eq!(details.l2_policy_id.as_deref(), Some("l2p1"));
        assert_eq!(orch.stats().details_served, 1);
    }

    #[test]
    fn test_port_without_endpoint_maps_to_shadow() {
        let orch = orch();
        let policy = policy();
        let ctx = HookContext::new("t1", &policy);

        let details = orch.get_gbp_details(&ctx, "tapport2", "h1").unwrap();
        assert_eq!(details.ptg_id, None);
        assert_eq!(details.endpoint_group_name, "Shd-l2p1");
    }

    #[test]
    fn test_bad_device() {
        let orch = orch();
        let policy = policy();
        let ctx = HookContext::new("t1", &policy);
        let err = orch.get_gbp_details(&ctx, "eth0", "h1").unwrap_err();
        assert_eq!(err.type_name(), "InvalidDevice");
    }

    #[test]
    fn test_owner_move_notifies_both_ports() {
        let store = Arc::new(MemoryHaIpStore::new());
        store.register_port("port1", "net1");
        store.register_port("port2", "net1");
        let notifier = Arc::new(RecordingNotifier::new());
        let orch = orch()
            .with_ha_ip_store(store)
            .with_notifier(notifier.clone());
        let policy = policy();
        let ctx = HookContext::new("t1", &policy);

        let report = |port: &str| IpOwnerInfo {
            port: port.to_string(),
            ip_address_v4: Some("10.0.0.100".to_string()),
            ..IpOwnerInfo::default()
        };
        orch.update_ip_owner(&ctx, &report("port1")).unwrap();
        notifier.clear();

        let affected = orch.update_ip_owner(&ctx, &report("port2")).unwrap();
        assert_eq!(affected.into_iter().collect::<Vec<_>>(), vec!["port1", "port2"]);
        assert_eq!(notifier.notified(), vec!["port1", "port2"]);
        assert_eq!(
            orch.get_gbp_details(&ctx, "tapport2", "h1").unwrap().owned_addresses,
            vec!["10.0.0.100"]
        );
    }

    #[test]
    fn test_default_store_records_reported_owner() {
        let orch = orch();
        let policy = policy();
        let ctx = HookContext::new("t1", &policy);
        let info = IpOwnerInfo {
            port: "port1".to_string(),
            ip_address_v4: Some("10.0.0.100".to_string()),
            ..IpOwnerInfo::default()
        };

        orch.update_ip_owner(&ctx, &info).unwrap();
        assert_eq!(
            orch.ha_ip().owner_of("10.0.0.100", "net1").unwrap().as_deref(),
            Some("port1")
        );
        assert_eq!(
            orch.get_gbp_details(&ctx, "tapport1", "h1").unwrap().owned_addresses,
            vec!["10.0.0.100"]
        );
    }

    #[test]
    fn test_unknown_port_report_ignored() {
        let orch = orch();
        let policy = policy();
        let ctx = HookContext::new("t1", &policy);
        let info = IpOwnerInfo {
            port: "ghost".to_string(),
            ip_address_v4: Some("10.0.0.100".to_string()),
            ..IpOwnerInfo::default()
        };
        assert!(orch.update_ip_owner(&ctx, &info).unwrap().is_empty());
    }
}
