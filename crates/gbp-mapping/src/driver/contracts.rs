//! Policy rules, classifiers, actions and rule sets.
//!
//! A rule becomes one tenant filter, plus a `reverse-` filter matching the
//! return traffic of one-way rules. A rule set becomes a contract with one
//! subject whose in/out filters follow each rule's classifier direction.

use std::collections::BTreeSet;

use gbp_fabric::{FabricOp, FilterEntry, SubjectDirection};
use tracing::debug;

use super::hooks::HookContext;
use super::orch::{HookPlan, MappingOrch};
use crate::audit::AuditCategory;
use crate::error::{MappingError, MappingResult};
use crate::naming::reverse_filter_name;
use crate::policy::{
    Direction, PolicyAction, PolicyClassifier, PolicyRule, PolicyRuleSet,
};
use crate::resolver::ChainPlan;

fn filter_entries(classifier: &PolicyClassifier) -> (FilterEntry, FilterEntry) {
    let mut forward = FilterEntry::ip();
    forward.protocol = classifier.protocol.clone();
    let mut reverse = forward.clone();
    if let Some(range) = classifier.port_range {
        forward.d_from_port = Some(range.from_port());
        forward.d_to_port = Some(range.to_port());
        reverse.s_from_port = Some(range.from_port());
        reverse.s_to_port = Some(range.to_port());
    }
    (forward, reverse)
}

impl MappingOrch {
    pub(super) fn validate_policy_rule(&self, rule: &PolicyRule) -> MappingResult<()> {
        if rule.actions.len() > 1 {
            return Err(MappingError::MultipleActionsNotSupported {
                rule: rule.id.clone(),
                count: rule.actions.len(),
            });
        }
        Ok(())
    }

    fn rule_classifier(
        &self,
        ctx: &HookContext<'_>,
        rule: &PolicyRule,
    ) -> MappingResult<PolicyClassifier> {
        ctx.policy
            .classifier(&rule.classifier_id)
            .ok_or_else(|| MappingError::not_found("policy_classifier", &rule.classifier_id))
    }

    /// Creates or deletes a rule's filters; deletion runs in reverse.
    fn filter_ops(&self, rule: &PolicyRule, classifier: &PolicyClassifier, create: bool) -> Vec<FabricOp> {
        let owner = self.owner_of(rule);
        let forward = self.name(&rule.id);
        let reverse = reverse_filter_name(&forward);
        let one_way = classifier.direction != Direction::Bi;

        if create {
            let (forward_entry, reverse_entry) = filter_entries(classifier);
            let mut ops = vec![FabricOp::CreateTenantFilter {
                owner: owner.clone(),
                filter: forward,
                entry: forward_entry,
            }];
            if one_way {
                ops.push(FabricOp::CreateTenantFilter {
                    owner,
                    filter: reverse,
                    entry: reverse_entry,
                });
            }
            ops
        } else {
            let mut ops = Vec::new();
            if one_way {
                ops.push(FabricOp::DeleteTenantFilter {
                    owner: owner.clone(),
                    filter: reverse,
                });
            }
            ops.push(FabricOp::DeleteTenantFilter {
                owner,
                filter: forward,
            });
            ops
        }
    }

    /// Subject filters a rule contributes to a rule set's contract.
    fn subject_filter_ops(
        &self,
        prs: &PolicyRuleSet,
        rule: &PolicyRule,
        classifier: &PolicyClassifier,
        unset: bool,
    ) -> Vec<FabricOp> {
        let forward = self.name(&rule.id);
        let reverse = reverse_filter_name(&forward);
        let filters = match classifier.direction {
            Direction::Bi => [
                (SubjectDirection::In, forward.clone()),
                (SubjectDirection::Out, forward),
            ],
            Direction::In => [
                (SubjectDirection::In, forward),
                (SubjectDirection::Out, reverse),
            ],
            Direction::Out => [
                (SubjectDirection::Out, forward),
                (SubjectDirection::In, reverse),
            ],
        };

        let owner = self.owner_of(prs);
        let contract = self.name(&prs.id);
        let rule_owner = self.owner_of(rule);
        let mut ops: Vec<FabricOp> = filters
            .into_iter()
            .map(|(direction, filter)| FabricOp::ManageContractSubjectFilter {
                owner: owner.clone(),
                contract: contract.clone(),
                subject: contract.clone(),
                filter,
                rule_owner: rule_owner.clone(),
                direction,
                unset,
            })
            .collect();
        if unset {
            ops.reverse();
        }
        ops
    }

    /// Subject filters of a rule looked up by id; unknown rules contribute none.
    fn rule_subject_filters(
        &self,
        ctx: &HookContext<'_>,
        prs: &PolicyRuleSet,
        rule_id: &str,
        unset: bool,
    ) -> MappingResult<Vec<FabricOp>> {
        let Some(rule) = ctx.policy.policy_rule(rule_id) else {
            if unset {
                debug!(rule = %rule_id, prs = %prs.id, "Rule gone, nothing to unset");
                return Ok(Vec::new());
            }
            return Err(MappingError::not_found("policy_rule", rule_id));
        };
        let classifier = self.rule_classifier(ctx, &rule)?;
        Ok(self.subject_filter_ops(prs, &rule, &classifier, unset))
    }

    /// Replaces a rule's filters and re-applies them in every rule set
    /// that lists the rule.
    fn refilter_rule(
        &self,
        ctx: &HookContext<'_>,
        plan: &mut HookPlan,
        before: (&PolicyRule, &PolicyClassifier),
        after: (&PolicyRule, &PolicyClassifier),
    ) {
        let rule_sets: Vec<PolicyRuleSet> = ctx
            .policy
            .rule_sets_containing(&after.0.id)
            .iter()
            .filter_map(|id| ctx.policy.policy_rule_set(id))
            .collect();
        for prs in &rule_sets {
            plan.txn
                .extend(self.subject_filter_ops(prs, before.0, before.1, true));
        }
        plan.txn.extend(self.filter_ops(before.0, before.1, false));
        plan.txn.extend(self.filter_ops(after.0, after.1, true));
        for prs in &rule_sets {
            plan.txn
                .extend(self.subject_filter_ops(prs, after.0, after.1, false));
        }
    }

    pub(super) fn policy_rule_created(
        &self,
        ctx: &HookContext<'_>,
        rule: &PolicyRule,
    ) -> MappingResult<()> {
        let classifier = self.rule_classifier(ctx, rule)?;
        let mut plan = HookPlan::new(format!("create_policy_rule:{}", rule.id));
        plan.txn.extend(self.filter_ops(rule, &classifier, true));
        self.commit(plan, AuditCategory::Create, "policy_rule", &rule.id, ctx.tenant_id)
    }

    pub(super) fn policy_rule_updated(
        &self,
        ctx: &HookContext<'_>,
        original: &PolicyRule,
        rule: &PolicyRule,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("update_policy_rule:{}", rule.id));
        if original.classifier_id != rule.classifier_id {
            let old_classifier = self.rule_classifier(ctx, original)?;
            let classifier = self.rule_classifier(ctx, rule)?;
            self.refilter_rule(ctx, &mut plan, (original, &old_classifier), (rule, &classifier));
        }
        if original.actions != rule.actions {
            let rule_sets: BTreeSet<String> =
                ctx.policy.rule_sets_containing(&rule.id).into_iter().collect();
            self.reconcile_rule_sets(ctx, &mut plan, &rule_sets)?;
        }
        self.commit(plan, AuditCategory::Modify, "policy_rule", &rule.id, ctx.tenant_id)
    }

    pub(super) fn policy_rule_deleted(
        &self,
        ctx: &HookContext<'_>,
        rule: &PolicyRule,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("delete_policy_rule:{}", rule.id));
        match ctx.policy.classifier(&rule.classifier_id) {
            Some(classifier) => plan.txn.extend(self.filter_ops(rule, &classifier, false)),
            None => {
                // Direction unknown: drop both filters.
                let owner = self.owner_of(rule);
                let forward = self.name(&rule.id);
                plan.txn.push(FabricOp::DeleteTenantFilter {
                    owner: owner.clone(),
                    filter: reverse_filter_name(&forward),
                });
                plan.txn.push(FabricOp::DeleteTenantFilter {
                    owner,
                    filter: forward,
                });
            }
        }
        self.commit(plan, AuditCategory::Delete, "policy_rule", &rule.id, ctx.tenant_id)
    }

    pub(super) fn classifier_updated(
        &self,
        ctx: &HookContext<'_>,
        original: &PolicyClassifier,
        classifier: &PolicyClassifier,
    ) -> MappingResult<()> {
        if original.direction == classifier.direction
            && original.protocol == classifier.protocol
            && original.port_range == classifier.port_range
        {
            return Ok(());
        }
        let mut plan = HookPlan::new(format!("update_policy_classifier:{}", classifier.id));
        for rule in ctx.policy.rules_using_classifier(&classifier.id) {
            self.refilter_rule(ctx, &mut plan, (&rule, original), (&rule, classifier));
        }
        self.commit(
            plan,
            AuditCategory::Modify,
            "policy_classifier",
            &classifier.id,
            ctx.tenant_id,
        )
    }

    pub(super) fn action_updated(
        &self,
        ctx: &HookContext<'_>,
        original: &PolicyAction,
        action: &PolicyAction,
    ) -> MappingResult<()> {
        if original.action_type == action.action_type && original.action_value == action.action_value
        {
            return Ok(());
        }
        let rule_sets: BTreeSet<String> = ctx
            .policy
            .rules_using_action(&action.id)
            .iter()
            .flat_map(|rule| ctx.policy.rule_sets_containing(&rule.id))
            .collect();
        let mut plan = HookPlan::new(format!("update_policy_action:{}", action.id));
        self.reconcile_rule_sets(ctx, &mut plan, &rule_sets)?;
        self.commit(plan, AuditCategory::Modify, "policy_action", &action.id, ctx.tenant_id)
    }

    pub(super) fn rule_set_created(
        &self,
        ctx: &HookContext<'_>,
        prs: &PolicyRuleSet,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("create_policy_rule_set:{}", prs.id));
        plan.txn.push(FabricOp::CreateContract {
            owner: self.owner_of(prs),
            contract: self.name(&prs.id),
        });
        for rule_id in &prs.policy_rules {
            plan.txn.extend(self.rule_subject_filters(ctx, prs, rule_id, false)?);
        }
        self.reconcile_rule_sets(ctx, &mut plan, &BTreeSet::from([prs.id.clone()]))?;
        self.commit(plan, AuditCategory::Create, "policy_rule_set", &prs.id, ctx.tenant_id)
    }

    pub(super) fn rule_set_updated(
        &self,
        ctx: &HookContext<'_>,
        original: &PolicyRuleSet,
        prs: &PolicyRuleSet,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("update_policy_rule_set:{}", prs.id));
        for rule_id in original.policy_rules.iter().filter(|r| !prs.policy_rules.contains(r)) {
            plan.txn.extend(self.rule_subject_filters(ctx, original, rule_id, true)?);
        }
        for rule_id in prs.policy_rules.iter().filter(|r| !original.policy_rules.contains(r)) {
            plan.txn.extend(self.rule_subject_filters(ctx, prs, rule_id, false)?);
        }
        self.reconcile_rule_sets(ctx, &mut plan, &BTreeSet::from([prs.id.clone()]))?;
        self.commit(plan, AuditCategory::Modify, "policy_rule_set", &prs.id, ctx.tenant_id)
    }

    pub(super) fn rule_set_deleted(
        &self,
        ctx: &HookContext<'_>,
        prs: &PolicyRuleSet,
    ) -> MappingResult<()> {
        let mut plan = HookPlan::new(format!("delete_policy_rule_set:{}", prs.id));
        let chains = ChainPlan {
            delete: self.chains.for_rule_set(&prs.id),
            ..ChainPlan::default()
        };
        self.plan_chains(ctx, &mut plan, chains, None)?;
        plan.txn.push(FabricOp::DeleteContract {
            owner: self.owner_of(prs),
            contract: self.name(&prs.id),
        });
        self.commit(plan, AuditCategory::Delete, "policy_rule_set", &prs.id, ctx.tenant_id)
    }
}
