//! Service chain instances and their shadow topology.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::hooks::HookContext;
use super::orch::{HookPlan, MappingOrch};
use crate::audit::AuditCategory;
use crate::chain::{ChainChange, ChainClaim};
use crate::error::{MappingError, MappingResult};
use crate::policy::{
    EndpointGroup, PolicyReader, ServiceChainInstance, ServiceChainSpec,
};
use crate::resolver::{self, ChainPlan, ChainUpdate};
use crate::shadow::{ChainRole, ProviderExit, ShadowTopology};

/// Chains a plan removes or reshapes, as seen by the provider's other
/// chains.
#[derive(Debug, Default)]
struct ChainMoves {
    removed: BTreeSet<String>,
    /// instance id -> specs after the plan
    respecced: BTreeMap<String, Vec<String>>,
}

impl ChainMoves {
    fn of(chains: &ChainPlan) -> Self {
        Self {
            removed: chains.delete.iter().map(|sci| sci.id.clone()).collect(),
            respecced: chains
                .update
                .iter()
                .map(|u| (u.current.id.clone(), u.current.servicechain_specs.clone()))
                .collect(),
        }
    }
}

impl MappingOrch {
    /// Kinds of the flattened chain's nodes, `true` for transparent ones.
    ///
    /// `replacing` stands in for the stored spec with the same id.
    pub(crate) fn chain_node_kinds(
        &self,
        policy: &dyn PolicyReader,
        specs: &[String],
        replacing: Option<&ServiceChainSpec>,
    ) -> Vec<bool> {
        specs
            .iter()
            .filter_map(|id| match replacing {
                Some(spec) if &spec.id == id => Some(spec.clone()),
                _ => policy.servicechain_spec(id),
            })
            .flat_map(|spec| spec.nodes)
            .filter_map(|node_id| policy.servicechain_node(&node_id))
            .map(|node| self.config.is_transparent(&node.service_type))
            .collect()
    }

    fn transparent_count(
        &self,
        policy: &dyn PolicyReader,
        specs: &[String],
        replacing: Option<&ServiceChainSpec>,
    ) -> usize {
        self.chain_node_kinds(policy, specs, replacing)
            .into_iter()
            .filter(|t| *t)
            .count()
    }

    pub(super) fn shadow_topology(
        &self,
        ctx: &HookContext<'_>,
        instance: &ServiceChainInstance,
        provider: &EndpointGroup,
        transparent_nodes: usize,
    ) -> MappingResult<ShadowTopology> {
        let bd = self.epg_bridge_domain(ctx, provider)?;
        let (tenant, context) = self.bd_context(ctx, &bd);
        let rule_set_owner = ctx
            .policy
            .policy_rule_set(&instance.policy_rule_set_id)
            .map(|prs| self.owner_of(&prs))
            .unwrap_or_else(|| self.owner_of(provider));
        Ok(ShadowTopology {
            instance_id: instance.id.clone(),
            tenant,
            context,
            provider_owner: self.owner_of(provider),
            provider: self.name(&provider.id),
            bd_owner: self.owner_of(&bd),
            bd: self.name(&bd.id),
            rule_set_owner,
            rule_set: self.name(&instance.policy_rule_set_id),
            transparent_nodes,
        })
    }

    /// The chain's provider, preferring the hook's own object.
    fn chain_provider(
        &self,
        ctx: &HookContext<'_>,
        provider_epg_id: &str,
        hint: Option<&EndpointGroup>,
    ) -> Option<EndpointGroup> {
        hint.filter(|epg| epg.id == provider_epg_id)
            .cloned()
            .or_else(|| ctx.policy.endpoint_group(provider_epg_id))
    }

    /// Queues notifications for the provider's bound service ports.
    fn notify_chain_ports(&self, ctx: &HookContext<'_>, plan: &mut HookPlan, provider_epg_id: &str) {
        for ep in ctx.policy.endpoints_in_group(provider_epg_id) {
            if ChainRole::parse(&ep.name).is_none() {
                continue;
            }
            if let Some(port) = self.bound_port(ctx, &ep) {
                plan.notify(port);
            }
        }
    }

    /// Where the provider goes once `instance_id`'s shadow path is gone.
    ///
    /// A provider still spliced into another transparent chain moves onto
    /// that chain's entry segment, the lowest instance id first.
    fn provider_exit(
        &self,
        ctx: &HookContext<'_>,
        instance_id: &str,
        provider: &EndpointGroup,
        moves: &ChainMoves,
    ) -> MappingResult<ProviderExit> {
        if ctx.policy.endpoint_group(&provider.id).is_none() {
            return Ok(ProviderExit::Gone);
        }
        for sci in self.chains.for_provider(&provider.id) {
            if sci.id == instance_id || moves.removed.contains(&sci.id) {
                continue;
            }
            let specs = moves.respecced.get(&sci.id).unwrap_or(&sci.servicechain_specs);
            let n = self.transparent_count(ctx.policy, specs, None);
            if n > 0 {
                debug!(instance = instance_id, survivor = %sci.id, "Provider stays chained");
                return Ok(self.shadow_topology(ctx, &sci, provider, n)?.entry());
            }
        }
        Ok(ProviderExit::Restore)
    }

    /// Turns a chain plan into fabric operations and store changes on `plan`.
    pub(super) fn plan_chains(
        &self,
        ctx: &HookContext<'_>,
        plan: &mut HookPlan,
        chains: ChainPlan,
        provider_hint: Option<&EndpointGroup>,
    ) -> MappingResult<()> {
        let moves = ChainMoves::of(&chains);
        for instance in chains.delete {
            match self.chain_provider(ctx, &instance.provider_epg_id, provider_hint) {
                Some(provider) => {
                    let n = self.transparent_count(ctx.policy, &instance.servicechain_specs, None);
                    if n > 0 {
                        let exit = self.provider_exit(ctx, &instance.id, &provider, &moves)?;
                        self.shadow_topology(ctx, &instance, &provider, n)?
                            .teardown(&mut plan.txn, &exit);
                        self.notify_chain_ports(ctx, plan, &provider.id);
                    }
                }
                None => warn!(
                    instance = %instance.id,
                    provider = %instance.provider_epg_id,
                    "Chain provider unknown, skipping shadow teardown"
                ),
            }
            info!(
                instance = %instance.id,
                provider = %instance.provider_epg_id,
                policy_rule_set = %instance.policy_rule_set_id,
                "Dissolving service chain"
            );
            plan.chain_changes.push(ChainChange::Delete(instance.id));
        }

        for update in chains.update {
            if update.specs_changed() {
                self.respec_chain(ctx, plan, &update, None, provider_hint, &moves)?;
            }
            plan.chain_changes.push(ChainChange::Update(update.current));
        }

        for desired in chains.create {
            let instance = desired.into_instance(Uuid::new_v4().to_string());
            match ChainClaim::acquire(&self.chains, &instance) {
                Ok(claim) => plan.claims.push(claim),
                Err(holder) => {
                    debug!(
                        provider = %instance.provider_epg_id,
                        policy_rule_set = %instance.policy_rule_set_id,
                        holder = %holder,
                        "Pair already chained, skipping creation"
                    );
                    continue;
                }
            }
            let provider = self
                .chain_provider(ctx, &instance.provider_epg_id, provider_hint)
                .ok_or_else(|| MappingError::not_found("endpoint_group", &instance.provider_epg_id))?;
            let n = self.transparent_count(ctx.policy, &instance.servicechain_specs, None);
            if n > 0 {
                self.shadow_topology(ctx, &instance, &provider, n)?
                    .build(&mut plan.txn);
                self.notify_chain_ports(ctx, plan, &provider.id);
            }
            info!(
                instance = %instance.id,
                provider = %instance.provider_epg_id,
                policy_rule_set = %instance.policy_rule_set_id,
                transparent_nodes = n,
                "Creating service chain"
            );
            plan.chain_changes.push(ChainChange::Create(instance));
        }
        Ok(())
    }

    /// Rebuilds the shadow topology when the transparent node count moves.
    fn respec_chain(
        &self,
        ctx: &HookContext<'_>,
        plan: &mut HookPlan,
        update: &ChainUpdate,
        replaced_spec: Option<&ServiceChainSpec>,
        provider_hint: Option<&EndpointGroup>,
        moves: &ChainMoves,
    ) -> MappingResult<()> {
        let before = self.transparent_count(
            ctx.policy,
            &update.previous.servicechain_specs,
            replaced_spec,
        );
        let after = self.transparent_count(ctx.policy, &update.current.servicechain_specs, None);
        if before == after {
            debug!(instance = %update.current.id, transparent_nodes = after, "Chain shape unchanged");
            return Ok(());
        }
        let Some(provider) = self.chain_provider(ctx, &update.current.provider_epg_id, provider_hint)
        else {
            warn!(instance = %update.current.id, "Chain provider unknown, skipping rebuild");
            return Ok(());
        };
        info!(
            instance = %update.current.id,
            from = before,
            to = after,
            "Rebuilding shadow topology"
        );
        if before > 0 {
            let exit = if after > 0 {
                ProviderExit::Restore
            } else {
                self.provider_exit(ctx, &update.current.id, &provider, moves)?
            };
            self.shadow_topology(ctx, &update.previous, &provider, before)?
                .teardown(&mut plan.txn, &exit);
        }
        if after > 0 {
            self.shadow_topology(ctx, &update.current, &provider, after)?
                .build(&mut plan.txn);
        }
        self.notify_chain_ports(ctx, plan, &provider.id);
        Ok(())
    }

    /// Reconciles chains of every provider of the given rule sets.
    pub(super) fn reconcile_rule_sets(
        &self,
        ctx: &HookContext<'_>,
        plan: &mut HookPlan,
        rule_set_ids: &BTreeSet<String>,
    ) -> MappingResult<()> {
        let ids: Vec<String> = rule_set_ids.iter().cloned().collect();
        let mut providers: BTreeSet<String> = resolver::chains_for_rule(ctx.policy, &ids, None)
            .into_iter()
            .map(|(provider, _)| provider)
            .collect();
        for prs in rule_set_ids {
            providers.extend(
                self.chains
                    .for_rule_set(prs)
                    .into_iter()
                    .map(|sci| sci.provider_epg_id),
            );
        }

        let mut chains = ChainPlan::default();
        for provider in &providers {
            let existing = self.chains.for_provider(provider);
            chains.merge(resolver::plan_provider_chains(
                ctx.policy,
                provider,
                &existing,
                Some(rule_set_ids),
            ));
        }
        self.plan_chains(ctx, plan, chains, None)
    }

    pub(super) fn servicechain_spec_updated(
        &self,
        ctx: &HookContext<'_>,
        original: &ServiceChainSpec,
        spec: &ServiceChainSpec,
    ) -> MappingResult<()> {
        if original.nodes == spec.nodes {
            return Ok(());
        }
        let mut plan = HookPlan::new(format!("update_servicechain_spec:{}", spec.id));
        for instance in self
            .chains
            .instances()
            .into_iter()
            .filter(|sci| sci.servicechain_specs.contains(&spec.id))
        {
            let update = ChainUpdate {
                previous: instance.clone(),
                current: instance,
            };
            self.respec_chain(
                ctx,
                &mut plan,
                &update,
                Some(original),
                None,
                &ChainMoves::default(),
            )?;
        }
        self.commit(plan, AuditCategory::Modify, "servicechain_spec", &spec.id, ctx.tenant_id)
    }
}
