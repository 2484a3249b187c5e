//! Read access to the policy snapshot a hook runs against.

use super::types::*;
use std::collections::{BTreeMap, HashMap};

/// Lookups a lifecycle hook may perform on related policy objects.
///
/// Post-phase hooks see the snapshot after the change was persisted,
/// pre-phase hooks see it before.
pub trait PolicyReader {
    fn routing_context(&self, id: &str) -> Option<RoutingContext>;
    /// Routing contexts holding an address on the given external segment.
    fn routing_contexts_for_segment(&self, segment_id: &str) -> Vec<RoutingContext>;

    fn bridge_domain(&self, id: &str) -> Option<BridgeDomain>;
    fn bridge_domain_for_network(&self, network_id: &str) -> Option<BridgeDomain>;

    fn endpoint_group(&self, id: &str) -> Option<EndpointGroup>;
    fn endpoint_groups_on_bridge_domain(&self, bridge_domain_id: &str) -> Vec<EndpointGroup>;
    /// Endpoint groups providing the rule set, ordered by id.
    fn providers_of(&self, policy_rule_set_id: &str) -> Vec<EndpointGroup>;
    /// Endpoint groups consuming the rule set, ordered by id.
    fn consumers_of(&self, policy_rule_set_id: &str) -> Vec<EndpointGroup>;

    fn endpoint(&self, id: &str) -> Option<Endpoint>;
    fn endpoint_for_port(&self, port_id: &str) -> Option<Endpoint>;
    /// Endpoints of a group, ordered by id.
    fn endpoints_in_group(&self, endpoint_group_id: &str) -> Vec<Endpoint>;
    fn port(&self, id: &str) -> Option<Port>;

    fn policy_rule_set(&self, id: &str) -> Option<PolicyRuleSet>;
    fn policy_rule_sets(&self) -> Vec<PolicyRuleSet>;
    /// Ids of rule sets listing the rule, ordered.
    fn rule_sets_containing(&self, rule_id: &str) -> Vec<String>;

    fn policy_rule(&self, id: &str) -> Option<PolicyRule>;
    fn rules_using_classifier(&self, classifier_id: &str) -> Vec<PolicyRule>;
    fn rules_using_action(&self, action_id: &str) -> Vec<PolicyRule>;
    fn classifier(&self, id: &str) -> Option<PolicyClassifier>;
    fn action(&self, id: &str) -> Option<PolicyAction>;

    fn external_segment(&self, id: &str) -> Option<ExternalSegment>;
    fn external_policies_for_segment(&self, segment_id: &str) -> Vec<ExternalPolicy>;

    fn servicechain_spec(&self, id: &str) -> Option<ServiceChainSpec>;
    fn servicechain_node(&self, id: &str) -> Option<ServiceChainNode>;
}

/// In-memory policy snapshot.
///
/// Keeps objects in id order and maintains port and network indexes so the
/// agent-facing lookups do not scan.
#[derive(Debug, Clone, Default)]
pub struct PolicyStore {
    routing_contexts: BTreeMap<String, RoutingContext>,
    bridge_domains: BTreeMap<String, BridgeDomain>,
    endpoint_groups: BTreeMap<String, EndpointGroup>,
    endpoints: BTreeMap<String, Endpoint>,
    ports: BTreeMap<String, Port>,
    policy_rule_sets: BTreeMap<String, PolicyRuleSet>,
    policy_rules: BTreeMap<String, PolicyRule>,
    classifiers: BTreeMap<String, PolicyClassifier>,
    actions: BTreeMap<String, PolicyAction>,
    external_segments: BTreeMap<String, ExternalSegment>,
    external_policies: BTreeMap<String, ExternalPolicy>,
    servicechain_specs: BTreeMap<String, ServiceChainSpec>,
    servicechain_nodes: BTreeMap<String, ServiceChainNode>,
    /// port id -> endpoint id
    endpoint_by_port: HashMap<String, String>,
    /// network id -> bridge domain id
    bridge_domain_by_network: HashMap<String, String>,
}

impl PolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an object.
    pub fn upsert(&mut self, object: PolicyObject) {
        match object {
            PolicyObject::RoutingContext(o) => {
                self.routing_contexts.insert(o.id.clone(), o);
            }
            PolicyObject::BridgeDomain(o) => {
                self.unindex_bridge_domain(&o.id);
                self.bridge_domain_by_network
                    .insert(o.network_id.clone(), o.id.clone());
                self.bridge_domains.insert(o.id.clone(), o);
            }
            PolicyObject::EndpointGroup(o) => {
                self.endpoint_groups.insert(o.id.clone(), o);
            }
            PolicyObject::Endpoint(o) => {
                self.unindex_endpoint(&o.id);
                if let Some(port_id) = &o.port_id {
                    self.endpoint_by_port.insert(port_id.clone(), o.id.clone());
                }
                self.endpoints.insert(o.id.clone(), o);
            }
            PolicyObject::PolicyRuleSet(o) => {
                self.policy_rule_sets.insert(o.id.clone(), o);
            }
            PolicyObject::PolicyRule(o) => {
                self.policy_rules.insert(o.id.clone(), o);
            }
            PolicyObject::PolicyClassifier(o) => {
                self.classifiers.insert(o.id.clone(), o);
            }
            PolicyObject::PolicyAction(o) => {
                self.actions.insert(o.id.clone(), o);
            }
            PolicyObject::ExternalSegment(o) => {
                self.external_segments.insert(o.id.clone(), o);
            }
            PolicyObject::ExternalPolicy(o) => {
                self.external_policies.insert(o.id.clone(), o);
            }
            PolicyObject::ServiceChainSpec(o) => {
                self.servicechain_specs.insert(o.id.clone(), o);
            }
            PolicyObject::ServiceChainNode(o) => {
                self.servicechain_nodes.insert(o.id.clone(), o);
            }
        }
    }

    /// Removes an object, returning it when present.
    pub fn remove(&mut self, kind: EntityKind, id: &str) -> Option<PolicyObject> {
        match kind {
            EntityKind::RoutingContext => self
                .routing_contexts
                .remove(id)
                .map(PolicyObject::RoutingContext),
            EntityKind::BridgeDomain => {
                self.unindex_bridge_domain(id);
                self.bridge_domains.remove(id).map(PolicyObject::BridgeDomain)
            }
            EntityKind::EndpointGroup => self
                .endpoint_groups
                .remove(id)
                .map(PolicyObject::EndpointGroup),
            EntityKind::Endpoint => {
                self.unindex_endpoint(id);
                self.endpoints.remove(id).map(PolicyObject::Endpoint)
            }
            EntityKind::PolicyRuleSet => self
                .policy_rule_sets
                .remove(id)
                .map(PolicyObject::PolicyRuleSet),
            EntityKind::PolicyRule => self.policy_rules.remove(id).map(PolicyObject::PolicyRule),
            EntityKind::PolicyClassifier => self
                .classifiers
                .remove(id)
                .map(PolicyObject::PolicyClassifier),
            EntityKind::PolicyAction => self.actions.remove(id).map(PolicyObject::PolicyAction),
            EntityKind::ExternalSegment => self
                .external_segments
                .remove(id)
                .map(PolicyObject::ExternalSegment),
            EntityKind::ExternalPolicy => self
                .external_policies
                .remove(id)
                .map(PolicyObject::ExternalPolicy),
            EntityKind::ServiceChainSpec => self
                .servicechain_specs
                .remove(id)
                .map(PolicyObject::ServiceChainSpec),
            EntityKind::ServiceChainNode => self
                .servicechain_nodes
                .remove(id)
                .map(PolicyObject::ServiceChainNode),
        }
    }

    /// Returns the stored object of the given kind.
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<PolicyObject> {
        match kind {
            EntityKind::RoutingContext => self.routing_context(id).map(PolicyObject::RoutingContext),
            EntityKind::BridgeDomain => self.bridge_domain(id).map(PolicyObject::BridgeDomain),
            EntityKind::EndpointGroup => self.endpoint_group(id).map(PolicyObject::EndpointGroup),
            EntityKind::Endpoint => self.endpoint(id).map(PolicyObject::Endpoint),
            EntityKind::PolicyRuleSet => self.policy_rule_set(id).map(PolicyObject::PolicyRuleSet),
            EntityKind::PolicyRule => self.policy_rule(id).map(PolicyObject::PolicyRule),
            EntityKind::PolicyClassifier => self.classifier(id).map(PolicyObject::PolicyClassifier),
            EntityKind::PolicyAction => self.action(id).map(PolicyObject::PolicyAction),
            EntityKind::ExternalSegment => {
                self.external_segment(id).map(PolicyObject::ExternalSegment)
            }
            EntityKind::ExternalPolicy => self
                .external_policies
                .get(id)
                .cloned()
                .map(PolicyObject::ExternalPolicy),
            EntityKind::ServiceChainSpec => {
                self.servicechain_spec(id).map(PolicyObject::ServiceChainSpec)
            }
            EntityKind::ServiceChainNode => {
                self.servicechain_node(id).map(PolicyObject::ServiceChainNode)
            }
        }
    }

    pub fn upsert_port(&mut self, port: Port) {
        self.ports.insert(port.id.clone(), port);
    }

    pub fn remove_port(&mut self, port_id: &str) -> Option<Port> {
        self.ports.remove(port_id)
    }

    fn unindex_endpoint(&mut self, id: &str) {
        if let Some(port_id) = self.endpoints.get(id).and_then(|ep| ep.port_id.as_ref()) {
            self.endpoint_by_port.remove(port_id);
        }
    }

    fn unindex_bridge_domain(&mut self, id: &str) {
        if let Some(bd) = self.bridge_domains.get(id) {
            self.bridge_domain_by_network.remove(&bd.network_id);
        }
    }
}

impl PolicyReader for PolicyStore {
    fn routing_context(&self, id: &str) -> Option<RoutingContext> {
        self.routing_contexts.get(id).cloned()
    }

    fn routing_contexts_for_segment(&self, segment_id: &str) -> Vec<RoutingContext> {
        self.routing_contexts
            .values()
            .filter(|rc| rc.external_segments.contains_key(segment_id))
            .cloned()
            .collect()
    }

    fn bridge_domain(&self, id: &str) -> Option<BridgeDomain> {
        self.bridge_domains.get(id).cloned()
    }

    fn bridge_domain_for_network(&self, network_id: &str) -> Option<BridgeDomain> {
        self.bridge_domain_by_network
            .get(network_id)
            .and_then(|id| self.bridge_domains.get(id))
            .cloned()
    }

    fn endpoint_group(&self, id: &str) -> Option<EndpointGroup> {
        self.endpoint_groups.get(id).cloned()
    }

    fn endpoint_groups_on_bridge_domain(&self, bridge_domain_id: &str) -> Vec<EndpointGroup> {
        self.endpoint_groups
            .values()
            .filter(|epg| epg.bridge_domain_id == bridge_domain_id)
            .cloned()
            .collect()
    }

    fn providers_of(&self, policy_rule_set_id: &str) -> Vec<EndpointGroup> {
        self.endpoint_groups
            .values()
            .filter(|epg| epg.provided_policy_rule_sets.contains_key(policy_rule_set_id))
            .cloned()
            .collect()
    }

    fn consumers_of(&self, policy_rule_set_id: &str) -> Vec<EndpointGroup> {
        self.endpoint_groups
            .values()
            .filter(|epg| epg.consumed_policy_rule_sets.contains_key(policy_rule_set_id))
            .cloned()
            .collect()
    }

    fn endpoint(&self, id: &str) -> Option<Endpoint> {
        self.endpoints.get(id).cloned()
    }

    fn endpoint_for_port(&self, port_id: &str) -> Option<Endpoint> {
        self.endpoint_by_port
            .get(port_id)
            .and_then(|id| self.endpoints.get(id))
            .cloned()
    }

    fn endpoints_in_group(&self, endpoint_group_id: &str) -> Vec<Endpoint> {
        self.endpoints
            .values()
            .filter(|ep| ep.endpoint_group_id == endpoint_group_id)
            .cloned()
            .collect()
    }

    fn port(&self, id: &str) -> Option<Port> {
        self.ports.get(id).cloned()
    }

    fn policy_rule_set(&self, id: &str) -> Option<PolicyRuleSet> {
        self.policy_rule_sets.get(id).cloned()
    }

    fn policy_rule_sets(&self) -> Vec<PolicyRuleSet> {
        self.policy_rule_sets.values().cloned().collect()
    }

    fn rule_sets_containing(&self, rule_id: &str) -> Vec<String> {
        self.policy_rule_sets
            .values()
            .filter(|prs| prs.policy_rules.iter().any(|r| r == rule_id))
            .map(|prs| prs.id.clone())
            .collect()
    }

    fn policy_rule(&self, id: &str) -> Option<PolicyRule> {
        self.policy_rules.get(id).cloned()
    }

    fn rules_using_classifier(&self, classifier_id: &str) -> Vec<PolicyRule> {
        self.policy_rules
            .values()
            .filter(|rule| rule.classifier_id == classifier_id)
            .cloned()
            .collect()
    }

    fn rules_using_action(&self, action_id: &str) -> Vec<PolicyRule> {
        self.policy_rules
            .values()
            .filter(|rule| rule.actions.iter().any(|a| a == action_id))
            .cloned()
            .collect()
    }

    fn classifier(&self, id: &str) -> Option<PolicyClassifier> {
        self.classifiers.get(id).cloned()
    }

    fn action(&self, id: &str) -> Option<PolicyAction> {
        self.actions.get(id).cloned()
    }

    fn external_segment(&self, id: &str) -> Option<ExternalSegment> {
        self.external_segments.get(id).cloned()
    }

    fn external_policies_for_segment(&self, segment_id: &str) -> Vec<ExternalPolicy> {
        self.external_policies
            .values()
            .filter(|ep| ep.external_segments.iter().any(|es| es == segment_id))
            .cloned()
            .collect()
    }

    fn servicechain_spec(&self, id: &str) -> Option<ServiceChainSpec> {
        self.servicechain_specs.get(id).cloned()
    }

    fn servicechain_node(&self, id: &str) -> Option<ServiceChainNode> {
        self.servicechain_nodes.get(id).cloned()
    }
}
