//! Bridge domains, endpoint groups, endpoints and subnets.

use std::collections::BTreeSet;

use gbp_fabric::FabricOp;
use tracing::debug;

use super::hooks::HookContext;
use super::orch::{HookPlan, MappingOrch};
use crate::audit::AuditCategory;
use crate::error::{MappingError, MappingResult};
use crate::naming::shadow_epg_name;
use crate::policy::{BridgeDomain, Endpoint, EndpointGroup, Port, Subnet};
use crate::resolver::{self, ChainPlan, ChainUpdate};

impl MappingOrch {
    /// Owner and name of the context a bridge domain routes in.
    pub(super) fn bd_context(&self, ctx: &HookContext<'_>, bd: &BridgeDomain) -> (String, String) {
        let ctx_owner = match ctx.policy.routing_context(&bd.routing_context_id) {
            Some(rc) => self.owner_of(&rc),
            None => {
                debug!(bd = %bd.id, rc = %bd.routing_context_id, "Routing context not in snapshot");
                self.owner_of(bd)
            }
        };
        (ctx_owner, self.name(&bd.routing_context_id))
    }

    fn ensure_bd_op(&self, ctx: &HookContext<'_>, bd: &BridgeDomain) -> FabricOp {
        let (ctx_owner, ctx_name) = self.bd_context(ctx, bd);
        FabricOp::EnsureBdCreated {
            owner: self.owner_of(bd),
            bd: self.name(&bd.id),
            ctx_owner,
            ctx_name,
            allow_broadcast: bd.allow_broadcast,
        }
    }

    fn shadow_epg_op(&self, bd: &BridgeDomain) -> FabricOp {
        let owner = self.owner_of(bd);
        let bd_name = self.name(&bd.id);
        FabricOp::EnsureEpgCreated {
            owner: owner.clone(),
            epg: shadow_epg_name(&bd_name),
            bd_owner: owner,
            bd_name,
        }
    }

    fn subnet_op(&self, bd: &BridgeDomain, subnet: &Subnet, create: bool) -> Option<FabricOp> {
        let gateway = subnet.gateway_notation()?;
        let owner = self.owner_of(bd);
        let bd = self.name(&bd.id);
        Some(if create {
            FabricOp::EnsureSubnetCreated { owner, bd, gateway }
        } else {
            FabricOp::EnsureSubnetDeleted { owner, bd, gateway }
        })
    }

    pub(super) fn bridge_domain_created(
        &self,
        ctx: &HookContext<'_>,
        bd: &BridgeDomain,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("create_bridge_domain:{}", bd.id));
        plan.txn.push(self.ensure_bd_op(ctx, bd));
        plan.txn.push(self.shadow_epg_op(bd));
        for subnet in &bd.subnets {
            plan.txn.extend(self.subnet_op(bd, subnet, true));
        }
        self.commit(plan, AuditCategory::Create, "bridge_domain", &bd.id, ctx.tenant_id)
    }

    pub(super) fn bridge_domain_updated(
        &self,
        ctx: &HookContext<'_>,
        original: &BridgeDomain,
        bd: &BridgeDomain,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("update_bridge_domain:{}", bd.id));
        if original.allow_broadcast != bd.allow_broadcast
            || original.routing_context_id != bd.routing_context_id
        {
            plan.txn.push(self.ensure_bd_op(ctx, bd));
        }

        for old in &original.subnets {
            if !bd.subnets.iter().any(|s| s.id == old.id) {
                plan.txn.extend(self.subnet_op(bd, old, false));
            }
        }
        for subnet in &bd.subnets {
            match original.subnets.iter().find(|s| s.id == subnet.id) {
                None => plan.txn.extend(self.subnet_op(bd, subnet, true)),
                Some(old) if old.gateway_notation() != subnet.gateway_notation() => {
                    plan.txn.extend(self.subnet_op(bd, subnet, true));
                    plan.txn.extend(self.subnet_op(bd, old, false));
                }
                Some(_) => {}
            }
        }
        self.commit(plan, AuditCategory::Modify, "bridge_domain", &bd.id, ctx.tenant_id)
    }

    pub(super) fn bridge_domain_deleted(
        &self,
        ctx: &HookContext<'_>,
        bd: &BridgeDomain,
    ) -> MappingResult<()> {
        let owner = self.owner_of(bd);
        let bd_name = self.name(&bd.id);
        let mut plan = HookPlan::new(format!("delete_bridge_domain:{}", bd.id));
        for subnet in bd.subnets.iter().rev() {
            plan.txn.extend(self.subnet_op(bd, subnet, false));
        }
        plan.txn.push(FabricOp::DeleteEpg {
            owner: owner.clone(),
            epg: shadow_epg_name(&bd_name),
        });
        plan.txn.push(FabricOp::DeleteBd { owner, bd: bd_name });
        self.commit(plan, AuditCategory::Delete, "bridge_domain", &bd.id, ctx.tenant_id)
    }

    pub(super) fn epg_bridge_domain(
        &self,
        ctx: &HookContext<'_>,
        epg: &EndpointGroup,
    ) -> MappingResult<BridgeDomain> {
        ctx.policy
            .bridge_domain(&epg.bridge_domain_id)
            .ok_or_else(|| MappingError::not_found("bridge_domain", &epg.bridge_domain_id))
    }

    /// Sets or unsets one contract on an endpoint group.
    fn epg_contract_op(
        &self,
        ctx: &HookContext<'_>,
        epg: &EndpointGroup,
        rule_set_id: &str,
        provider: bool,
        set: bool,
    ) -> MappingResult<FabricOp> {
        let contract_owner = match ctx.policy.policy_rule_set(rule_set_id) {
            Some(prs) => self.owner_of(&prs),
            None if !set => self.owner_of(epg),
            None => return Err(MappingError::not_found("policy_rule_set", rule_set_id)),
        };
        let owner = self.owner_of(epg);
        let epg = self.name(&epg.id);
        let contract = self.name(rule_set_id);
        Ok(if set {
            FabricOp::SetContractForEpg {
                owner,
                epg,
                contract,
                contract_owner,
                provider,
            }
        } else {
            FabricOp::UnsetContractForEpg {
                owner,
                epg,
                contract,
                contract_owner,
                provider,
            }
        })
    }

    /// Records the group as consumer of chains that have none.
    fn attach_consumer(&self, epg: &EndpointGroup, plan: &mut ChainPlan) {
        let claimed: BTreeSet<String> = plan
            .update
            .iter()
            .map(|u| u.previous.id.clone())
            .chain(plan.delete.iter().map(|sci| sci.id.clone()))
            .collect();
        for prs in epg.consumed_policy_rule_sets.keys() {
            for instance in self.chains.for_rule_set(prs) {
                if instance.consumer_epg_id.is_some() || claimed.contains(&instance.id) {
                    continue;
                }
                let mut current = instance.clone();
                current.consumer_epg_id = Some(epg.id.clone());
                plan.update.push(ChainUpdate {
                    previous: instance,
                    current,
                });
            }
        }
    }

    pub(super) fn endpoint_group_created(
        &self,
        ctx: &HookContext<'_>,
        epg: &EndpointGroup,
    ) -> MappingResult<()> {
        let bd = self.epg_bridge_domain(ctx, epg)?;
        let mut plan = HookPlan::new(format!("create_endpoint_group:{}", epg.id));
        plan.txn.push(FabricOp::EnsureEpgCreated {
            owner: self.owner_of(epg),
            epg: self.name(&epg.id),
            bd_owner: self.owner_of(&bd),
            bd_name: self.name(&bd.id),
        });
        let first_on_bd = ctx
            .policy
            .endpoint_groups_on_bridge_domain(&bd.id)
            .iter()
            .all(|other| other.id == epg.id);
        if first_on_bd {
            plan.txn.push(self.shadow_epg_op(&bd));
        }
        for prs in epg.provided_policy_rule_sets.keys() {
            plan.txn.push(self.epg_contract_op(ctx, epg, prs, true, true)?);
        }
        for prs in epg.consumed_policy_rule_sets.keys() {
            plan.txn.push(self.epg_contract_op(ctx, epg, prs, false, true)?);
        }

        let existing = self.chains.for_provider(&epg.id);
        let mut chains = resolver::plan_provider_chains(ctx.policy, &epg.id, &existing, None);
        self.attach_consumer(epg, &mut chains);
        self.plan_chains(ctx, &mut plan, chains, Some(epg))?;
        self.commit(plan, AuditCategory::Create, "endpoint_group", &epg.id, ctx.tenant_id)
    }

    pub(super) fn endpoint_group_updated(
        &self,
        ctx: &HookContext<'_>,
        original: &EndpointGroup,
        epg: &EndpointGroup,
    ) -> MappingResult<()> {
        let bd = self.epg_bridge_domain(ctx, epg)?;
        let mut plan = HookPlan::new(format!("update_endpoint_group:{}", epg.id));

        for (provider, before, after) in [
            (true, &original.provided_policy_rule_sets, &epg.provided_policy_rule_sets),
            (false, &original.consumed_policy_rule_sets, &epg.consumed_policy_rule_sets),
        ] {
            for prs in before.keys().filter(|prs| !after.contains_key(*prs)) {
                plan.txn.push(self.epg_contract_op(ctx, epg, prs, provider, false)?);
            }
            for prs in after.keys().filter(|prs| !before.contains_key(*prs)) {
                plan.txn.push(self.epg_contract_op(ctx, epg, prs, provider, true)?);
            }
        }

        for subnet_id in epg.subnets.iter().filter(|id| !original.subnets.contains(id)) {
            match bd.subnets.iter().find(|s| &s.id == subnet_id) {
                Some(subnet) => plan.txn.extend(self.subnet_op(&bd, subnet, true)),
                None => debug!(subnet_id = %subnet_id, bd = %bd.id, "Subnet not on bridge domain"),
            }
        }

        let existing = self.chains.for_provider(&epg.id);
        let mut chains = resolver::plan_provider_chains(ctx.policy, &epg.id, &existing, None);
        self.attach_consumer(epg, &mut chains);
        self.plan_chains(ctx, &mut plan, chains, Some(epg))?;
        self.commit(plan, AuditCategory::Modify, "endpoint_group", &epg.id, ctx.tenant_id)
    }

    pub(super) fn endpoint_group_deleted(
        &self,
        ctx: &HookContext<'_>,
        epg: &EndpointGroup,
    ) -> MappingResult<()> {
        let bd = self.epg_bridge_domain(ctx, epg)?;
        let mut plan = HookPlan::new(format!("delete_endpoint_group:{}", epg.id));

        let mut chains = ChainPlan {
            delete: self.chains.for_provider(&epg.id),
            ..ChainPlan::default()
        };
        // Chains it consumed fall back to the next consumer, if any.
        for prs in epg.consumed_policy_rule_sets.keys() {
            for instance in self.chains.for_rule_set(prs) {
                if instance.consumer_epg_id.as_deref() != Some(epg.id.as_str())
                    || instance.provider_epg_id == epg.id
                {
                    continue;
                }
                let mut current = instance.clone();
                current.consumer_epg_id = resolver::first_consumer(ctx.policy, prs);
                chains.update.push(ChainUpdate {
                    previous: instance,
                    current,
                });
            }
        }
        self.plan_chains(ctx, &mut plan, chains, Some(epg))?;

        for prs in epg.consumed_policy_rule_sets.keys().rev() {
            plan.txn.push(self.epg_contract_op(ctx, epg, prs, false, false)?);
        }
        for prs in epg.provided_policy_rule_sets.keys().rev() {
            plan.txn.push(self.epg_contract_op(ctx, epg, prs, true, false)?);
        }
        let last_on_bd = ctx
            .policy
            .endpoint_groups_on_bridge_domain(&bd.id)
            .iter()
            .all(|other| other.id == epg.id);
        if last_on_bd {
            plan.txn.push(FabricOp::DeleteEpg {
                owner: self.owner_of(&bd),
                epg: shadow_epg_name(&self.name(&bd.id)),
            });
        }
        plan.txn.push(FabricOp::DeleteEpg {
            owner: self.owner_of(epg),
            epg: self.name(&epg.id),
        });
        self.commit(plan, AuditCategory::Delete, "endpoint_group", &epg.id, ctx.tenant_id)
    }

    pub(super) fn bound_port(&self, ctx: &HookContext<'_>, ep: &Endpoint) -> Option<Port> {
        let port = ctx.policy.port(ep.port_id.as_deref()?)?;
        port.is_bound().then_some(port)
    }

    pub(super) fn endpoint_created(&self, ctx: &HookContext<'_>, ep: &Endpoint) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("create_endpoint:{}", ep.id));
        if ep.explicit_port {
            if let Some(port) = self.bound_port(ctx, ep) {
                plan.notify(port);
            }
        }
        self.commit(plan, AuditCategory::Create, "endpoint", &ep.id, ctx.tenant_id)
    }

    pub(super) fn endpoint_updated(
        &self,
        ctx: &HookContext<'_>,
        original: &Endpoint,
        ep: &Endpoint,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("update_endpoint:{}", ep.id));
        if original.endpoint_group_id != ep.endpoint_group_id || original.name != ep.name {
            if let Some(port) = self.bound_port(ctx, ep) {
                plan.notify(port);
            }
        }
        self.commit(plan, AuditCategory::Modify, "endpoint", &ep.id, ctx.tenant_id)
    }

    pub(super) fn endpoint_deleted(&self, ctx: &HookContext<'_>, ep: &Endpoint) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("delete_endpoint:{}", ep.id));
        if ep.explicit_port {
            if let Some(port) = self.bound_port(ctx, ep) {
                plan.notify(port);
            }
        }
        self.commit(plan, AuditCategory::Delete, "endpoint", &ep.id, ctx.tenant_id)
    }

    /// Ensures a new subnet on the bridge domain of its network.
    pub fn process_subnet_added(&self, ctx: &HookContext<'_>, subnet: &Subnet) -> MappingResult<()> {
        let Some(bd) = ctx.policy.bridge_domain_for_network(&subnet.network_id) else {
            debug!(subnet = %subnet.id, network = %subnet.network_id, "Subnet outside any bridge domain");
            return Ok(());
        };
        let mut plan = HookPlan::new(format!("add_subnet:{}", subnet.id));
        plan.txn.extend(self.subnet_op(&bd, subnet, true));
        self.commit(plan, AuditCategory::Create, "subnet", &subnet.id, ctx.tenant_id)
    }

    /// Moves the fabric subnet when the gateway changes.
    pub fn process_subnet_changed(
        &self,
        ctx: &HookContext<'_>,
        original: &Subnet,
        subnet: &Subnet,
    ) -> MappingResult<()> {
        if original.gateway_notation() == subnet.gateway_notation() {
            return Ok(());
        }
        let Some(bd) = ctx.policy.bridge_domain_for_network(&subnet.network_id) else {
            debug!(subnet = %subnet.id, network = %subnet.network_id, "Subnet outside any bridge domain");
            return Ok(());
        };
        let mut plan = HookPlan::new(format!("update_subnet:{}", subnet.id));
        plan.txn.extend(self.subnet_op(&bd, subnet, true));
        plan.txn.extend(self.subnet_op(&bd, original, false));
        self.commit(plan, AuditCategory::Modify, "subnet", &subnet.id, ctx.tenant_id)
    }
}
