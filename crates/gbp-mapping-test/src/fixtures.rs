//! Test fixtures for common policy shapes
//!
//! Every object lives in tenant [`TENANT`] unless a test overrides it.

use gbp_mapping::policy::{
    ActionType, BridgeDomain, Direction, Endpoint, EndpointGroup, ExternalPolicy, ExternalRoute,
    ExternalSegment, PolicyAction, PolicyClassifier, PolicyRule, PolicyRuleSet, Port,
    RoutingContext, ServiceChainNode, ServiceChainSpec, Subnet,
};
use gbp_mapping::MappingConfig;
use std::collections::BTreeMap;

/// Tenant of every fixture object.
pub const TENANT: &str = "t1";

/// Transparent service type of the default configuration.
pub const TRANSPARENT: &str = "FIREWALL_TRANSPARENT";

/// Catalog with one supported segment named `supported`.
pub const SUPPORTED_CATALOG: &str = r#"
external_segments:
  supported:
    switch: "401"
    port: "1/48"
    encap: vlan-100
    router_id: 1.0.0.1
    cidr_exposed: 192.168.0.2/24
"#;

/// Configuration carrying [`SUPPORTED_CATALOG`].
pub fn supported_config() -> MappingConfig {
    MappingConfig::from_yaml_str(SUPPORTED_CATALOG).expect("built-in catalog is valid")
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn scopes(values: &[&str]) -> BTreeMap<String, String> {
    values
        .iter()
        .map(|v| (v.to_string(), String::new()))
        .collect()
}

/// Routing contexts, external segments and external policies
pub mod routing_fixtures {
    use super::*;

    pub fn routing_context(id: &str) -> RoutingContext {
        RoutingContext {
            id: id.to_string(),
            tenant_id: TENANT.to_string(),
            shared: false,
            external_segments: BTreeMap::new(),
        }
    }

    /// Routing context holding `addresses` on one external segment.
    pub fn attached_routing_context(id: &str, segment: &str, addresses: &[&str]) -> RoutingContext {
        let mut rc = routing_context(id);
        rc.external_segments.insert(segment.to_string(), ids(addresses));
        rc
    }

    /// Route to `destination`; `None` uses the segment gateway.
    pub fn route(destination: &str, nexthop: Option<&str>) -> ExternalRoute {
        ExternalRoute {
            destination: destination.parse().expect("valid destination prefix"),
            nexthop: nexthop.map(|nh| nh.parse().expect("valid next hop")),
        }
    }

    pub fn external_segment(id: &str, name: &str, routes: Vec<ExternalRoute>) -> ExternalSegment {
        ExternalSegment {
            id: id.to_string(),
            name: name.to_string(),
            tenant_id: TENANT.to_string(),
            shared: false,
            cidr: "192.168.0.0/24".parse().expect("valid segment cidr"),
            port_address_translation: false,
            external_routes: routes,
        }
    }

    /// The `supported` segment with a default route via 192.168.0.254 and
    /// a 128.0.0.0/16 route via the segment gateway.
    pub fn supported_segment(id: &str) -> ExternalSegment {
        external_segment(
            id,
            "supported",
            vec![
                route("0.0.0.0/0", Some("192.168.0.254")),
                route("128.0.0.0/16", None),
            ],
        )
    }

    pub fn external_policy(
        id: &str,
        segments: &[&str],
        provided: &[&str],
        consumed: &[&str],
    ) -> ExternalPolicy {
        ExternalPolicy {
            id: id.to_string(),
            tenant_id: TENANT.to_string(),
            shared: false,
            external_segments: ids(segments),
            provided_policy_rule_sets: scopes(provided),
            consumed_policy_rule_sets: scopes(consumed),
        }
    }
}

/// Bridge domains, endpoint groups, endpoints and ports
pub mod group_fixtures {
    use super::*;

    pub fn subnet(id: &str, network: &str, cidr: &str) -> Subnet {
        Subnet {
            id: id.to_string(),
            network_id: network.to_string(),
            cidr: cidr.parse().expect("valid subnet cidr"),
            gateway_ip: None,
        }
    }

    pub fn bridge_domain(id: &str, routing_context: &str, network: &str) -> BridgeDomain {
        BridgeDomain {
            id: id.to_string(),
            tenant_id: TENANT.to_string(),
            shared: false,
            routing_context_id: routing_context.to_string(),
            allow_broadcast: true,
            network_id: network.to_string(),
            subnets: Vec::new(),
        }
    }

    pub fn endpoint_group(
        id: &str,
        bridge_domain: &str,
        provided: &[&str],
        consumed: &[&str],
    ) -> EndpointGroup {
        EndpointGroup {
            id: id.to_string(),
            tenant_id: TENANT.to_string(),
            shared: false,
            bridge_domain_id: bridge_domain.to_string(),
            subnets: Vec::new(),
            provided_policy_rule_sets: scopes(provided),
            consumed_policy_rule_sets: scopes(consumed),
        }
    }

    /// Endpoint with a user-supplied port.
    pub fn endpoint(id: &str, group: &str, name: &str, port: &str) -> Endpoint {
        Endpoint {
            id: id.to_string(),
            name: name.to_string(),
            endpoint_group_id: group.to_string(),
            port_id: Some(port.to_string()),
            explicit_port: true,
        }
    }

    /// Port bound to `host`.
    pub fn port(id: &str, network: &str, host: &str) -> Port {
        Port {
            id: id.to_string(),
            network_id: network.to_string(),
            host: Some(host.to_string()),
            device_owner: None,
        }
    }
}

/// Classifiers, actions, rules and rule sets
pub mod contract_fixtures {
    use super::*;

    pub fn classifier(
        id: &str,
        direction: Direction,
        protocol: Option<&str>,
        ports: Option<&str>,
    ) -> PolicyClassifier {
        PolicyClassifier {
            id: id.to_string(),
            tenant_id: TENANT.to_string(),
            shared: false,
            direction,
            protocol: protocol.map(str::to_string),
            port_range: ports.map(|p| p.parse().expect("valid port range")),
        }
    }

    /// TCP port 80 in both directions.
    pub fn http_classifier(id: &str) -> PolicyClassifier {
        classifier(id, Direction::Bi, Some("tcp"), Some("80"))
    }

    pub fn allow_action(id: &str) -> PolicyAction {
        PolicyAction {
            id: id.to_string(),
            tenant_id: TENANT.to_string(),
            shared: false,
            action_type: ActionType::Allow,
            action_value: None,
        }
    }

    pub fn redirect_action(id: &str, spec: &str) -> PolicyAction {
        PolicyAction {
            id: id.to_string(),
            tenant_id: TENANT.to_string(),
            shared: false,
            action_type: ActionType::Redirect,
            action_value: Some(spec.to_string()),
        }
    }

    pub fn policy_rule(id: &str, classifier: &str, actions: &[&str]) -> PolicyRule {
        PolicyRule {
            id: id.to_string(),
            tenant_id: TENANT.to_string(),
            shared: false,
            classifier_id: classifier.to_string(),
            actions: ids(actions),
        }
    }

    pub fn rule_set(id: &str, rules: &[&str]) -> PolicyRuleSet {
        PolicyRuleSet {
            id: id.to_string(),
            tenant_id: TENANT.to_string(),
            shared: false,
            policy_rules: ids(rules),
        }
    }
}

/// Service chain specs and nodes
pub mod chain_fixtures {
    use super::*;

    pub fn node(id: &str, service_type: &str) -> ServiceChainNode {
        ServiceChainNode {
            id: id.to_string(),
            service_type: service_type.to_string(),
        }
    }

    pub fn spec(id: &str, nodes: &[&str]) -> ServiceChainSpec {
        ServiceChainSpec {
            id: id.to_string(),
            nodes: ids(nodes),
        }
    }
}
