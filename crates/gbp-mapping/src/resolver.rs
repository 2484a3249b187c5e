//! Redirect and service chain resolution.
//!
//! Everything here is a pure query over a [`PolicyReader`]. The orchestrator
//! turns the resulting [`ChainPlan`] into fabric operations and chain store
//! changes.

use crate::policy::{EndpointGroup, PolicyAction, PolicyReader, ServiceChainInstance};
use std::collections::{BTreeMap, BTreeSet};

/// The rule that makes a rule set redirect, and the action it redirects with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectMatch {
    pub policy_rule_set: String,
    pub action: PolicyAction,
    pub rule: String,
}

impl RedirectMatch {
    /// Service chain specs the redirect sends traffic through.
    pub fn specs(&self) -> Vec<String> {
        self.action.action_value.iter().cloned().collect()
    }
}

/// First redirect rule of the rule set, in ascending rule id order.
pub fn redirect_for_rule_set(policy: &dyn PolicyReader, rule_set_id: &str) -> Option<RedirectMatch> {
    let prs = policy.policy_rule_set(rule_set_id)?;
    let mut rule_ids = prs.policy_rules;
    rule_ids.sort();
    rule_ids.dedup();

    rule_ids.into_iter().find_map(|rule_id| {
        let rule = policy.policy_rule(&rule_id)?;
        rule.actions
            .iter()
            .filter_map(|action_id| policy.action(action_id))
            .find(PolicyAction::is_redirect)
            .map(|action| RedirectMatch {
                policy_rule_set: rule_set_id.to_string(),
                action,
                rule: rule_id.clone(),
            })
    })
}

/// Rule sets carrying a redirect, optionally limited to `candidates`.
pub fn find_redirect_policy_rule_sets(
    policy: &dyn PolicyReader,
    candidates: Option<&BTreeSet<String>>,
) -> Vec<RedirectMatch> {
    policy
        .policy_rule_sets()
        .into_iter()
        .filter(|prs| candidates.map_or(true, |c| c.contains(&prs.id)))
        .filter_map(|prs| redirect_for_rule_set(policy, &prs.id))
        .collect()
}

/// (provider, rule set) pairs a chain should exist for, among the rule sets
/// a rule belongs to.
pub fn chains_for_rule(
    policy: &dyn PolicyReader,
    rule_set_ids: &[String],
    restrict: Option<&BTreeSet<String>>,
) -> BTreeSet<(String, String)> {
    let candidates: BTreeSet<String> = rule_set_ids
        .iter()
        .filter(|id| restrict.map_or(true, |r| r.contains(*id)))
        .cloned()
        .collect();

    find_redirect_policy_rule_sets(policy, Some(&candidates))
        .into_iter()
        .flat_map(|m| {
            policy
                .providers_of(&m.policy_rule_set)
                .into_iter()
                .map(move |epg| (epg.id, m.policy_rule_set.clone()))
        })
        .collect()
}

/// Consumer recorded on a new or consumer-less instance.
pub fn first_consumer(policy: &dyn PolicyReader, rule_set_id: &str) -> Option<String> {
    policy
        .consumers_of(rule_set_id)
        .into_iter()
        .map(|epg| epg.id)
        .next()
}

/// A chain that should exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredChain {
    pub provider_epg_id: String,
    pub policy_rule_set_id: String,
    pub servicechain_specs: Vec<String>,
    pub consumer_epg_id: Option<String>,
}

impl DesiredChain {
    pub fn into_instance(self, id: impl Into<String>) -> ServiceChainInstance {
        ServiceChainInstance {
            id: id.into(),
            provider_epg_id: self.provider_epg_id,
            consumer_epg_id: self.consumer_epg_id,
            policy_rule_set_id: self.policy_rule_set_id,
            servicechain_specs: self.servicechain_specs,
        }
    }
}

/// Chains a provider should have, keyed by rule set.
pub fn desired_chains_for_provider(
    policy: &dyn PolicyReader,
    provider: &EndpointGroup,
) -> BTreeMap<String, DesiredChain> {
    provider
        .provided_policy_rule_sets
        .keys()
        .filter_map(|prs_id| redirect_for_rule_set(policy, prs_id))
        .map(|m| {
            let chain = DesiredChain {
                provider_epg_id: provider.id.clone(),
                policy_rule_set_id: m.policy_rule_set.clone(),
                servicechain_specs: m.specs(),
                consumer_epg_id: first_consumer(policy, &m.policy_rule_set),
            };
            (m.policy_rule_set, chain)
        })
        .collect()
}

/// An existing instance whose specs or consumer change in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainUpdate {
    pub previous: ServiceChainInstance,
    pub current: ServiceChainInstance,
}

impl ChainUpdate {
    pub fn specs_changed(&self) -> bool {
        self.previous.servicechain_specs != self.current.servicechain_specs
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainPlan {
    pub create: Vec<DesiredChain>,
    pub update: Vec<ChainUpdate>,
    pub delete: Vec<ServiceChainInstance>,
}

impl ChainPlan {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    pub fn merge(&mut self, other: ChainPlan) {
        self.create.extend(other.create);
        self.update.extend(other.update);
        self.delete.extend(other.delete);
    }
}

/// Diffs a provider's existing instances against what the policy asks for.
///
/// A missing provider wants no chains. With `restrict`, only instances and
/// desires for those rule sets are considered.
pub fn plan_provider_chains(
    policy: &dyn PolicyReader,
    provider_epg_id: &str,
    existing: &[ServiceChainInstance],
    restrict: Option<&BTreeSet<String>>,
) -> ChainPlan {
    let in_scope = |prs: &str| restrict.map_or(true, |r| r.contains(prs));
    let mut desired = policy
        .endpoint_group(provider_epg_id)
        .map(|epg| desired_chains_for_provider(policy, &epg))
        .unwrap_or_default();
    desired.retain(|prs, _| in_scope(prs.as_str()));

    let mut plan = ChainPlan::default();
    for instance in existing.iter().filter(|sci| in_scope(sci.policy_rule_set_id.as_str())) {
        match desired.remove(&instance.policy_rule_set_id) {
            None => plan.delete.push(instance.clone()),
            Some(want) => {
                let mut current = instance.clone();
                current.servicechain_specs = want.servicechain_specs;
                if current.consumer_epg_id.is_none() {
                    current.consumer_epg_id = want.consumer_epg_id;
                }
                if &current != instance {
                    plan.update.push(ChainUpdate {
                        previous: instance.clone(),
                        current,
                    });
                }
            }
        }
    }
    plan.create.extend(desired.into_values());
    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::*;
    use pretty_assertions::assert_eq;

    fn action(id: &str, redirect: Option<&str>) -> PolicyObject {
        PolicyObject::PolicyAction(PolicyAction {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            shared: false,
            action_type: if redirect.is_some() {
                ActionType::Redirect
            } else {
                ActionType::Allow
            },
            action_value: redirect.map(str::to_string),
        })
    }

    fn rule(id: &str, action: &str) -> PolicyObject {
        PolicyObject::PolicyRule(PolicyRule {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            shared: false,
            classifier_id: "pc1".to_string(),
            actions: vec![action.to_string()],
        })
    }

    fn rule_set(id: &str, rules: &[&str]) -> PolicyObject {
        PolicyObject::PolicyRuleSet(PolicyRuleSet {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            shared: false,
            policy_rules: rules.iter().map(|r| r.to_string()).collect(),
        })
    }

    fn epg(id: &str, provided: &[&str], consumed: &[&str]) -> PolicyObject {
        PolicyObject::EndpointGroup(EndpointGroup {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            shared: false,
            bridge_domain_id: "l2p1".to_string(),
            subnets: vec![],
            provided_policy_rule_sets: provided
                .iter()
                .map(|p| (p.to_string(), String::new()))
                .collect(),
            consumed_policy_rule_sets: consumed
                .iter()
                .map(|p| (p.to_string(), String::new()))
                .collect(),
        })
    }

    fn policy() -> PolicyStore {
        let mut store = PolicyStore::new();
        for object in [
            action("allow", None),
            action("redir-a", Some("spec-a")),
            action("redir-b", Some("spec-b")),
            rule("r1", "allow"),
            rule("r2", "redir-b"),
            rule("r3", "redir-a"),
            rule_set("prs-redirect", &["r3", "r1", "r2"]),
            rule_set("prs-plain", &["r1"]),
            epg("ptg-p", &["prs-redirect", "prs-plain"], &[]),
            epg("ptg-c", &[], &["prs-redirect"]),
        ] {
            store.upsert(object);
        }
        store
    }

    #[test]
    fn test_lowest_redirect_rule_wins() {
        let store = policy();
        let found = find_redirect_policy_rule_sets(&store, None);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].policy_rule_set, "prs-redirect");
        assert_eq!(found[0].rule, "r2");
        assert_eq!(found[0].specs(), vec!["spec-b"]);
    }

    #[test]
    fn test_candidates_restrict_search() {
        let store = policy();
        let only_plain = BTreeSet::from(["prs-plain".to_string()]);
        assert!(find_redirect_policy_rule_sets(&store, Some(&only_plain)).is_empty());
    }

    #[test]
    fn test_chains_for_rule() {
        let store = policy();
        let rule_sets = store.rule_sets_containing("r1");
        assert_eq!(
            chains_for_rule(&store, &rule_sets, None),
            BTreeSet::from([("ptg-p".to_string(), "prs-redirect".to_string())])
        );
        let restrict = BTreeSet::from(["prs-plain".to_string()]);
        assert!(chains_for_rule(&store, &rule_sets, Some(&restrict)).is_empty());
    }

    #[test]
    fn test_plan_creates_missing_chain() {
        let store = policy();
        let plan = plan_provider_chains(&store, "ptg-p", &[], None);
        assert_eq!(
            plan.create,
            vec![DesiredChain {
                provider_epg_id: "ptg-p".to_string(),
                policy_rule_set_id: "prs-redirect".to_string(),
                servicechain_specs: vec!["spec-b".to_string()],
                consumer_epg_id: Some("ptg-c".to_string()),
            }]
        );
        assert!(plan.update.is_empty() && plan.delete.is_empty());
    }

    #[test]
    fn test_plan_updates_specs_in_place() {
        let store = policy();
        let existing = ServiceChainInstance {
            id: "sci1".to_string(),
            provider_epg_id: "ptg-p".to_string(),
            consumer_epg_id: Some("ptg-c".to_string()),
            policy_rule_set_id: "prs-redirect".to_string(),
            servicechain_specs: vec!["spec-old".to_string()],
        };
        let plan = plan_provider_chains(&store, "ptg-p", &[existing], None);
        assert!(plan.create.is_empty());
        assert_eq!(plan.update.len(), 1);
        assert!(plan.update[0].specs_changed());
        assert_eq!(plan.update[0].current.id, "sci1");
        assert_eq!(plan.update[0].current.servicechain_specs, vec!["spec-b"]);
    }

    #[test]
    fn test_plan_deletes_for_missing_provider() {
        let store = policy();
        let existing = ServiceChainInstance {
            id: "sci1".to_string(),
            provider_epg_id: "gone".to_string(),
            consumer_epg_id: None,
            policy_rule_set_id: "prs-redirect".to_string(),
            servicechain_specs: vec!["spec-b".to_string()],
        };
        let plan = plan_provider_chains(&store, "gone", &[existing.clone()], None);
        assert_eq!(plan.delete, vec![existing]);
    }
}
