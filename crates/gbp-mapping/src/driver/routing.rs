//! Routing contexts, external segments and external policies.

use std::collections::{BTreeMap, BTreeSet};

use gbp_fabric::FabricOp;
use gbp_types::IpAddress;
use tracing::{debug, warn};

use super::hooks::HookContext;
use super::orch::{HookPlan, MappingOrch};
use crate::audit::AuditCategory;
use crate::config::SegmentCatalogEntry;
use crate::error::{MappingError, MappingResult};
use crate::policy::{ExternalPolicy, ExternalRoute, ExternalSegment, RoutingContext};

/// A supported external segment resolved against the catalog.
struct AttachedSegment<'c> {
    segment: ExternalSegment,
    entry: &'c SegmentCatalogEntry,
    owner: String,
    name: String,
}

impl MappingOrch {
    fn attached_segment(
        &self,
        ctx: &HookContext<'_>,
        segment_id: &str,
    ) -> Option<AttachedSegment<'_>> {
        let segment = ctx.policy.external_segment(segment_id)?;
        self.catalog_segment(segment)
    }

    fn catalog_segment(&self, segment: ExternalSegment) -> Option<AttachedSegment<'_>> {
        let Some(entry) = self.config.supported_segment(&segment.name) else {
            debug!(segment = %segment.name, "External segment not in catalog, ignoring");
            return None;
        };
        Some(AttachedSegment {
            owner: self.owner_of(&segment),
            name: self.name(&segment.id),
            segment,
            entry,
        })
    }

    fn nexthop(entry: &SegmentCatalogEntry, nexthop: Option<IpAddress>) -> Option<String> {
        nexthop
            .or_else(|| entry.default_gateway())
            .map(|ip| ip.to_string())
    }

    /// Rejects constraint violations and fills in implicit segment addresses.
    pub(super) fn validate_routing_context(
        &self,
        ctx: &HookContext<'_>,
        rc: &RoutingContext,
    ) -> MappingResult<RoutingContext> {
        let mut normalized = rc.clone();
        for (segment_id, ips) in normalized.external_segments.iter_mut() {
            if ips.len() > 1 {
                return Err(MappingError::OnlyOneAddressIsAllowedPerExternalSegment {
                    segment: segment_id.clone(),
                    routing_context: rc.id.clone(),
                    count: ips.len(),
                });
            }
            if let Some(existing) = ctx
                .policy
                .routing_contexts_for_segment(segment_id)
                .into_iter()
                .find(|other| other.id != rc.id)
            {
                return Err(MappingError::OnlyOneL3PolicyIsAllowedPerExternalSegment {
                    segment: segment_id.clone(),
                    routing_context: rc.id.clone(),
                    existing: existing.id,
                });
            }
            if ips.is_empty() {
                if let Some(attached) = self.attached_segment(ctx, segment_id) {
                    let address = attached.entry.exposed_address().to_string();
                    debug!(segment_id = %segment_id, %address, "Assigning exposed address");
                    ips.push(address);
                }
            }
        }
        Ok(normalized)
    }

    fn plug_segment(
        &self,
        ctx: &HookContext<'_>,
        plan: &mut HookPlan,
        rc: &RoutingContext,
        segment_id: &str,
        ips: &[String],
    ) {
        let Some(attached) = self.attached_segment(ctx, segment_id) else {
            return;
        };
        plan.txn.push(FabricOp::EnsureExternalRoutedNetworkCreated {
            owner: attached.owner.clone(),
            segment: attached.name.clone(),
            context: self.name(&rc.id),
        });
        self.node_profile(plan, &attached, ips);
        for route in &attached.segment.external_routes {
            self.static_route(plan, &attached, route);
        }
    }

    fn node_profile(&self, plan: &mut HookPlan, attached: &AttachedSegment<'_>, ips: &[String]) {
        let address = ips
            .first()
            .cloned()
            .unwrap_or_else(|| attached.entry.exposed_address().to_string());
        plan.txn.push(FabricOp::EnsureLogicalNodeProfileCreated {
            owner: attached.owner.clone(),
            segment: attached.name.clone(),
            switch: attached.entry.switch.clone(),
            module: attached.entry.port.module().to_string(),
            port: attached.entry.port.port().to_string(),
            encap: attached.entry.encap.to_string(),
            address,
            router_id: attached.entry.router_id.to_string(),
        });
    }

    fn static_route(&self, plan: &mut HookPlan, attached: &AttachedSegment<'_>, route: &ExternalRoute) {
        let Some(nexthop) = Self::nexthop(attached.entry, route.nexthop) else {
            warn!(segment = %attached.name, destination = %route.destination, "No next hop for route");
            return;
        };
        plan.txn.push(FabricOp::EnsureStaticRouteCreated {
            owner: attached.owner.clone(),
            segment: attached.name.clone(),
            switch: attached.entry.switch.clone(),
            subnet: route.destination.to_string(),
            nexthop,
        });
    }

    fn unplug_segment(&self, ctx: &HookContext<'_>, plan: &mut HookPlan, segment_id: &str) {
        if let Some(attached) = self.attached_segment(ctx, segment_id) {
            plan.txn.push(FabricOp::DeleteExternalRoutedNetwork {
                owner: attached.owner,
                segment: attached.name,
            });
        }
    }

    pub(super) fn routing_context_created(
        &self,
        ctx: &HookContext<'_>,
        rc: &RoutingContext,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("create_routing_context:{}", rc.id));
        plan.txn.push(FabricOp::EnsureContextEnforced {
            owner: self.owner_of(rc),
            context: self.name(&rc.id),
        });
        for (segment_id, ips) in &rc.external_segments {
            self.plug_segment(ctx, &mut plan, rc, segment_id, ips);
        }
        self.commit(plan, AuditCategory::Create, "routing_context", &rc.id, ctx.tenant_id)
    }

    pub(super) fn routing_context_updated(
        &self,
        ctx: &HookContext<'_>,
        original: &RoutingContext,
        rc: &RoutingContext,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("update_routing_context:{}", rc.id));
        for segment_id in original.external_segments.keys() {
            if !rc.external_segments.contains_key(segment_id) {
                self.unplug_segment(ctx, &mut plan, segment_id);
            }
        }
        for (segment_id, ips) in &rc.external_segments {
            match original.external_segments.get(segment_id) {
                None => self.plug_segment(ctx, &mut plan, rc, segment_id, ips),
                Some(old_ips) if old_ips != ips => {
                    if let Some(attached) = self.attached_segment(ctx, segment_id) {
                        self.node_profile(&mut plan, &attached, ips);
                    }
                }
                Some(_) => {}
            }
        }
        self.commit(plan, AuditCategory::Modify, "routing_context", &rc.id, ctx.tenant_id)
    }

    pub(super) fn routing_context_deleted(
        &self,
        ctx: &HookContext<'_>,
        rc: &RoutingContext,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("delete_routing_context:{}", rc.id));
        for segment_id in rc.external_segments.keys().rev() {
            self.unplug_segment(ctx, &mut plan, segment_id);
        }
        plan.txn.push(FabricOp::EnsureContextDeleted {
            owner: self.owner_of(rc),
            context: self.name(&rc.id),
        });
        self.commit(plan, AuditCategory::Delete, "routing_context", &rc.id, ctx.tenant_id)
    }

    pub(super) fn validate_external_segment(&self, es: &ExternalSegment) -> MappingResult<()> {
        if es.port_address_translation {
            return Err(MappingError::UnsupportedFeature {
                feature: format!("port address translation on external segment {}", es.name),
            });
        }
        Ok(())
    }

    pub(super) fn external_segment_updated(
        &self,
        ctx: &HookContext<'_>,
        original: &ExternalSegment,
        es: &ExternalSegment,
    ) -> MappingResult<()> {
        let Some(attached) = self.catalog_segment(es.clone()) else {
            return Ok(());
        };
        let old_routes: BTreeMap<String, Option<IpAddress>> = original
            .external_routes
            .iter()
            .map(|r| (r.destination.to_string(), r.nexthop))
            .collect();
        let new_routes: BTreeMap<String, Option<IpAddress>> = es
            .external_routes
            .iter()
            .map(|r| (r.destination.to_string(), r.nexthop))
            .collect();
        let policies = ctx.policy.external_policies_for_segment(&es.id);
        let switch = attached.entry.switch.clone();

        let mut plan = HookPlan::new(format!("update_external_segment:{}", es.id));
        let removed: Vec<String> = old_routes
            .keys()
            .filter(|subnet| !new_routes.contains_key(*subnet))
            .cloned()
            .collect();
        for subnet in &removed {
            plan.txn.push(FabricOp::EnsureStaticRouteDeleted {
                owner: attached.owner.clone(),
                segment: attached.name.clone(),
                switch: switch.clone(),
                subnet: subnet.clone(),
            });
        }
        if !removed.is_empty() {
            for ep in &policies {
                plan.txn.push(FabricOp::EnsureExternalEpgRoutesDeleted {
                    owner: attached.owner.clone(),
                    segment: attached.name.clone(),
                    external_epg: self.name(&ep.id),
                    subnets: removed.clone(),
                });
                // The last route takes the external EPG with it.
                if new_routes.is_empty() {
                    self.external_contracts(&mut plan, &attached, ep, false);
                    self.external_epg_deleted(&mut plan, &attached, ep);
                }
            }
        }

        for (subnet, nexthop) in &new_routes {
            match old_routes.get(subnet) {
                Some(old) if old == nexthop => continue,
                Some(old) => {
                    if let Some(old_nexthop) = Self::nexthop(attached.entry, *old) {
                        plan.txn.push(FabricOp::EnsureNextHopDeleted {
                            owner: attached.owner.clone(),
                            segment: attached.name.clone(),
                            switch: switch.clone(),
                            subnet: subnet.clone(),
                            nexthop: old_nexthop,
                        });
                    }
                }
                None => {}
            }
            let Some(resolved) = Self::nexthop(attached.entry, *nexthop) else {
                warn!(segment = %attached.name, %subnet, "No next hop for route");
                continue;
            };
            plan.txn.push(FabricOp::EnsureStaticRouteCreated {
                owner: attached.owner.clone(),
                segment: attached.name.clone(),
                switch: switch.clone(),
                subnet: subnet.clone(),
                nexthop: resolved,
            });
            for ep in &policies {
                plan.txn.push(FabricOp::EnsureExternalEpgCreated {
                    owner: attached.owner.clone(),
                    segment: attached.name.clone(),
                    external_epg: self.name(&ep.id),
                    subnet: subnet.clone(),
                });
            }
        }

        // External EPGs come into being with the first route.
        if old_routes.is_empty() && !new_routes.is_empty() {
            for ep in &policies {
                self.external_contracts(&mut plan, &attached, ep, true);
            }
        }
        self.commit(plan, AuditCategory::Modify, "external_segment", &es.id, ctx.tenant_id)
    }

    pub(super) fn external_segment_deleted(
        &self,
        ctx: &HookContext<'_>,
        es: &ExternalSegment,
    ) -> MappingResult<()> {
        let Some(attached) = self.catalog_segment(es.clone()) else {
            return Ok(());
        };
        let mut plan = HookPlan::new(format!("delete_external_segment:{}", es.id));
        plan.txn.push(FabricOp::DeleteExternalRoutedNetwork {
            owner: attached.owner,
            segment: attached.name,
        });
        self.commit(plan, AuditCategory::Delete, "external_segment", &es.id, ctx.tenant_id)
    }

    /// Supported segments of an external policy that carry routes.
    fn routed_segments<'i>(
        &self,
        ctx: &HookContext<'_>,
        segment_ids: impl IntoIterator<Item = &'i String>,
    ) -> Vec<AttachedSegment<'_>> {
        segment_ids
            .into_iter()
            .filter_map(|id| self.attached_segment(ctx, id))
            .filter(|attached| !attached.segment.external_routes.is_empty())
            .collect()
    }

    fn external_contract_op(
        &self,
        attached: &AttachedSegment<'_>,
        ep: &ExternalPolicy,
        rule_set_id: &str,
        provided: bool,
        set: bool,
    ) -> FabricOp {
        let owner = attached.owner.clone();
        let segment = attached.name.clone();
        let external_epg = self.name(&ep.id);
        let contract = self.name(rule_set_id);
        if set {
            FabricOp::SetContractForExternalEpg {
                owner,
                segment,
                external_epg,
                contract,
                provided,
            }
        } else {
            FabricOp::UnsetContractForExternalEpg {
                owner,
                segment,
                external_epg,
                contract,
                provided,
            }
        }
    }

    /// Sets (or unsets, in reverse) every contract of the policy.
    fn external_contracts(
        &self,
        plan: &mut HookPlan,
        attached: &AttachedSegment<'_>,
        ep: &ExternalPolicy,
        set: bool,
    ) {
        let mut ops: Vec<FabricOp> = ep
            .provided_policy_rule_sets
            .keys()
            .map(|prs| self.external_contract_op(attached, ep, prs, true, set))
            .chain(
                ep.consumed_policy_rule_sets
                    .keys()
                    .map(|prs| self.external_contract_op(attached, ep, prs, false, set)),
            )
            .collect();
        if !set {
            ops.reverse();
        }
        plan.txn.extend(ops);
    }

    fn external_epg_created(&self, plan: &mut HookPlan, attached: &AttachedSegment<'_>, ep: &ExternalPolicy) {
        for route in &attached.segment.external_routes {
            plan.txn.push(FabricOp::EnsureExternalEpgCreated {
                owner: attached.owner.clone(),
                segment: attached.name.clone(),
                external_epg: self.name(&ep.id),
                subnet: route.destination.to_string(),
            });
        }
        self.external_contracts(plan, attached, ep, true);
    }

    fn external_epg_deleted(&self, plan: &mut HookPlan, attached: &AttachedSegment<'_>, ep: &ExternalPolicy) {
        plan.txn.push(FabricOp::EnsureExternalEpgDeleted {
            owner: attached.owner.clone(),
            segment: attached.name.clone(),
            external_epg: self.name(&ep.id),
        });
    }

    pub(super) fn external_policy_created(
        &self,
        ctx: &HookContext<'_>,
        ep: &ExternalPolicy,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("create_external_policy:{}", ep.id));
        for attached in self.routed_segments(ctx, &ep.external_segments) {
            self.external_epg_created(&mut plan, &attached, ep);
        }
        self.commit(plan, AuditCategory::Create, "external_policy", &ep.id, ctx.tenant_id)
    }

    pub(super) fn external_policy_updated(
        &self,
        ctx: &HookContext<'_>,
        original: &ExternalPolicy,
        ep: &ExternalPolicy,
    ) -> MappingResult<()> {
        let old_segments: BTreeSet<&String> = original.external_segments.iter().collect();
        let new_segments: BTreeSet<&String> = ep.external_segments.iter().collect();
        let mut plan = HookPlan::new(format!("update_external_policy:{}", ep.id));

        for attached in self.routed_segments(ctx, old_segments.difference(&new_segments).copied()) {
            self.external_epg_deleted(&mut plan, &attached, ep);
        }
        for attached in self.routed_segments(ctx, new_segments.difference(&old_segments).copied()) {
            self.external_epg_created(&mut plan, &attached, ep);
        }
        for attached in self.routed_segments(ctx, new_segments.intersection(&old_segments).copied()) {
            for (maps, provided) in [
                ((&original.provided_policy_rule_sets, &ep.provided_policy_rule_sets), true),
                ((&original.consumed_policy_rule_sets, &ep.consumed_policy_rule_sets), false),
            ] {
                let (before, after) = maps;
                for prs in before.keys().filter(|prs| !after.contains_key(*prs)) {
                    plan.txn
                        .push(self.external_contract_op(&attached, ep, prs, provided, false));
                }
                for prs in after.keys().filter(|prs| !before.contains_key(*prs)) {
                    plan.txn
                        .push(self.external_contract_op(&attached, ep, prs, provided, true));
                }
            }
        }
        self.commit(plan, AuditCategory::Modify, "external_policy", &ep.id, ctx.tenant_id)
    }

    pub(super) fn external_policy_deleted(
        &self,
        ctx: &HookContext<'_>,
        ep: &ExternalPolicy,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("delete_external_policy:{}", ep.id));
        for attached in self.routed_segments(ctx, ep.external_segments.iter().rev()) {
            self.external_contracts(&mut plan, &attached, ep, false);
            self.external_epg_deleted(&mut plan, &attached, ep);
        }
        self.commit(plan, AuditCategory::Delete, "external_policy", &ep.id, ctx.tenant_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MappingConfig;
    use crate::driver::{HookEvent, Phase};
    use crate::policy::{PolicyObject, PolicyStore};
    use gbp_fabric::RecordingFabric;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const CONFIG: &str = r#"
external_segments:
  supported:
    switch: "401"
    port: "1/48"
    encap: vlan-100
    router_id: 1.0.0.1
    cidr_exposed: 192.168.0.2/24
"#;

    fn segment(name: &str, routes: &[(&str, Option<&str>)]) -> ExternalSegment {
        ExternalSegment {
            id: format!("es-{}", name),
            name: name.to_string(),
            tenant_id: "t1".to_string(),
            shared: false,
            cidr: "192.168.0.0/24".parse().unwrap(),
            port_address_translation: false,
            external_routes: routes
                .iter()
                .map(|(dst, nh)| ExternalRoute {
                    destination: dst.parse().unwrap(),
                    nexthop: nh.map(|n| n.parse().unwrap()),
                })
                .collect(),
        }
    }

    fn routing_context(segments: &[(&str, &[&str])]) -> RoutingContext {
        RoutingContext {
            id: "l3p1".to_string(),
            tenant_id: "t1".to_string(),
            shared: false,
            external_segments: segments
                .iter()
                .map(|(id, ips)| (id.to_string(), ips.iter().map(|ip| ip.to_string()).collect()))
                .collect(),
        }
    }

    fn setup() -> (Arc<RecordingFabric>, MappingOrch) {
        let fabric = Arc::new(RecordingFabric::new());
        let config = MappingConfig::from_yaml_str(CONFIG).unwrap();
        let orch = MappingOrch::new(config, fabric.clone());
        (fabric, orch)
    }

    #[test]
    fn test_exposed_address_fills_empty_list() {
        let (_, orch) = setup();
        let mut policy = PolicyStore::new();
        policy.upsert(PolicyObject::ExternalSegment(segment("supported", &[])));
        let ctx = HookContext::new("t1", &policy);

        let rc = routing_context(&[("es-supported", &[])]);
        let event = HookEvent::new(Phase::PreCreate, PolicyObject::RoutingContext(rc));
        let Some(PolicyObject::RoutingContext(normalized)) = orch.dispatch(&ctx, &event).unwrap()
        else {
            panic!("expected a normalised routing context");
        };
        assert_eq!(normalized.external_segments["es-supported"], vec!["192.168.0.2"]);
    }

    #[test]
    fn test_second_routing_context_on_segment_rejected() {
        let (fabric, orch) = setup();
        let mut policy = PolicyStore::new();
        policy.upsert(PolicyObject::ExternalSegment(segment("supported", &[])));
        let mut existing = routing_context(&[("es-supported", &["192.168.0.3"])]);
        existing.id = "l3p0".to_string();
        policy.upsert(PolicyObject::RoutingContext(existing));
        let ctx = HookContext::new("t1", &policy);

        let rc = routing_context(&[("es-supported", &["192.168.0.4"])]);
        let event = HookEvent::new(Phase::PreCreate, PolicyObject::RoutingContext(rc));
        let err = orch.dispatch(&ctx, &event).unwrap_err();
        assert_eq!(err.type_name(), "OnlyOneL3PolicyIsAllowedPerExternalSegment");
        assert_eq!(orch.stats().policy_rejections, 1);
        assert!(fabric.calls().is_empty());
    }

    #[test]
    fn test_two_addresses_rejected() {
        let (_, orch) = setup();
        let policy = PolicyStore::new();
        let ctx = HookContext::new("t1", &policy);

        let rc = routing_context(&[("es-supported", &["192.168.0.3", "192.168.0.4"])]);
        let event = HookEvent::new(Phase::PreUpdate, PolicyObject::RoutingContext(rc));
        let err = orch.dispatch(&ctx, &event).unwrap_err();
        assert_eq!(err.type_name(), "OnlyOneAddressIsAllowedPerExternalSegment");
    }

    #[test]
    fn test_unsupported_segment_is_ignored() {
        let (fabric, orch) = setup();
        let mut policy = PolicyStore::new();
        policy.upsert(PolicyObject::ExternalSegment(segment(
            "unsupported",
            &[("0.0.0.0/0", None)],
        )));
        let ctx = HookContext::new("t1", &policy);

        let rc = routing_context(&[("es-unsupported", &["192.168.0.3"])]);
        let event = HookEvent::new(Phase::PostCreate, PolicyObject::RoutingContext(rc));
        orch.dispatch(&ctx, &event).unwrap();
        let names: Vec<&str> = fabric.calls().iter().map(|op| op.name()).collect();
        assert_eq!(names, vec!["ensure_context_enforced"]);
    }

    #[test]
    fn test_pat_rejected() {
        let (_, orch) = setup();
        let policy = PolicyStore::new();
        let ctx = HookContext::new("t1", &policy);

        let mut es = segment("supported", &[]);
        es.port_address_translation = true;
        let event = HookEvent::new(Phase::PreCreate, PolicyObject::ExternalSegment(es));
        let err = orch.dispatch(&ctx, &event).unwrap_err();
        assert_eq!(err.type_name(), "UnsupportedFeature");
    }

    #[test]
    fn test_removing_last_route_drops_external_epg() {
        let (fabric, orch) = setup();
        let mut policy = PolicyStore::new();
        let es = segment("supported", &[("128.0.0.0/16", None)]);
        policy.upsert(PolicyObject::ExternalSegment(es.clone()));
        let ep = ExternalPolicy {
            id: "ep1".to_string(),
            tenant_id: "t1".to_string(),
            shared: false,
            external_segments: vec!["es-supported".to_string()],
            provided_policy_rule_sets: BTreeMap::from([("prs1".to_string(), String::new())]),
            consumed_policy_rule_sets: BTreeMap::new(),
        };
        policy.upsert(PolicyObject::ExternalPolicy(ep.clone()));
        let ctx = HookContext::new("t1", &policy);

        let updated = segment("supported", &[]);
        let event = HookEvent::new(Phase::PostUpdate, PolicyObject::ExternalSegment(updated.clone()))
            .with_original(PolicyObject::ExternalSegment(es));
        orch.dispatch(&ctx, &event).unwrap();
        assert_eq!(
            fabric.calls(),
            vec![
                FabricOp::EnsureStaticRouteDeleted {
                    owner: "t1".to_string(),
                    segment: "es-supported".to_string(),
                    switch: "401".to_string(),
                    subnet: "128.0.0.0/16".to_string(),
                },
                FabricOp::EnsureExternalEpgRoutesDeleted {
                    owner: "t1".to_string(),
                    segment: "es-supported".to_string(),
                    external_epg: "ep1".to_string(),
                    subnets: vec!["128.0.0.0/16".to_string()],
                },
                FabricOp::UnsetContractForExternalEpg {
                    owner: "t1".to_string(),
                    segment: "es-supported".to_string(),
                    external_epg: "ep1".to_string(),
                    contract: "prs1".to_string(),
                    provided: true,
                },
                FabricOp::EnsureExternalEpgDeleted {
                    owner: "t1".to_string(),
                    segment: "es-supported".to_string(),
                    external_epg: "ep1".to_string(),
                },
            ]
        );

        // Nothing is left for the policy's own delete to clean up.
        fabric.clear();
        policy.upsert(PolicyObject::ExternalSegment(updated));
        let ctx = HookContext::new("t1", &policy);
        let event = HookEvent::new(Phase::PostDelete, PolicyObject::ExternalPolicy(ep));
        orch.dispatch(&ctx, &event).unwrap();
        assert!(fabric.calls().is_empty());
    }

    #[test]
    fn test_nexthop_change() {
        let (fabric, orch) = setup();
        let mut policy = PolicyStore::new();
        let es = segment("supported", &[("128.0.0.0/16", Some("192.168.0.254"))]);
        policy.upsert(PolicyObject::ExternalSegment(es.clone()));
        let ctx = HookContext::new("t1", &policy);

        let updated = segment("supported", &[("128.0.0.0/16", None)]);
        let event = HookEvent::new(Phase::PostUpdate, PolicyObject::ExternalSegment(updated))
            .with_original(PolicyObject::ExternalSegment(es));
        orch.dispatch(&ctx, &event).unwrap();
        assert_eq!(
            fabric.calls(),
            vec![
                FabricOp::EnsureNextHopDeleted {
                    owner: "t1".to_string(),
                    segment: "es-supported".to_string(),
                    switch: "401".to_string(),
                    subnet: "128.0.0.0/16".to_string(),
                    nexthop: "192.168.0.254".to_string(),
                },
                FabricOp::EnsureStaticRouteCreated {
                    owner: "t1".to_string(),
                    segment: "es-supported".to_string(),
                    switch: "401".to_string(),
                    subnet: "128.0.0.0/16".to_string(),
                    nexthop: "192.168.0.1".to_string(),
                },
            ]
        );
    }
}
