//! Group-policy object model.
//!
//! These are the objects the policy framework hands to lifecycle hooks.
//! The mapping core reads them; it never persists them.

use gbp_types::{IpAddress, IpPrefix, PortRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Objects that live in a tenant and may be shared across tenants.
pub trait Scoped {
    fn tenant_id(&self) -> &str;
    fn shared(&self) -> bool;
}

macro_rules! impl_scoped {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Scoped for $ty {
                fn tenant_id(&self) -> &str {
                    &self.tenant_id
                }

                fn shared(&self) -> bool {
                    self.shared
                }
            }
        )+
    };
}

fn default_true() -> bool {
    true
}

/// L3 policy: one routing context (VRF) on the fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingContext {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub shared: bool,
    /// External segment id -> addresses this context holds on it.
    #[serde(default)]
    pub external_segments: BTreeMap<String, Vec<String>>,
}

/// L2 policy: one bridge domain on the fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDomain {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub shared: bool,
    pub routing_context_id: String,
    #[serde(default = "default_true")]
    pub allow_broadcast: bool,
    pub network_id: String,
    #[serde(default)]
    pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub id: String,
    pub network_id: String,
    pub cidr: IpPrefix,
    #[serde(default)]
    pub gateway_ip: Option<IpAddress>,
}

impl Subnet {
    /// Gateway in `address/prefixlen` form, the way the fabric names BD subnets.
    ///
    /// Without an explicit gateway the first host of the CIDR is used.
    pub fn gateway_notation(&self) -> Option<String> {
        self.gateway_ip
            .or_else(|| self.cidr.host(1))
            .map(|gw| self.cidr.with_address(&gw))
    }
}

/// Policy target group: one endpoint group on the fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointGroup {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub shared: bool,
    pub bridge_domain_id: String,
    #[serde(default)]
    pub subnets: Vec<String>,
    /// Provided rule set id -> opaque scope.
    #[serde(default)]
    pub provided_policy_rule_sets: BTreeMap<String, String>,
    #[serde(default)]
    pub consumed_policy_rule_sets: BTreeMap<String, String>,
}

/// Policy target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub endpoint_group_id: String,
    #[serde(default)]
    pub port_id: Option<String>,
    /// True when the port was supplied by the user rather than created
    /// along with the endpoint.
    #[serde(default)]
    pub explicit_port: bool,
}

/// Network port, owned by the port-management collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    pub id: String,
    pub network_id: String,
    #[serde(default)]
    pub host: Option<String>,
    /// Set for ports created on behalf of another service, e.g. `network:router_interface`.
    #[serde(default)]
    pub device_owner: Option<String>,
}

impl Port {
    /// A port is bound once a host has claimed it.
    pub fn is_bound(&self) -> bool {
        self.host.as_deref().is_some_and(|h| !h.is_empty())
    }
}

/// Policy rule set: one contract on the fabric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRuleSet {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub policy_rules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub shared: bool,
    pub classifier_id: String,
    #[serde(default)]
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Bi,
    In,
    Out,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Bi => write!(f, "bi"),
            Direction::In => write!(f, "in"),
            Direction::Out => write!(f, "out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyClassifier {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub port_range: Option<PortRange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Allow,
    Redirect,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyAction {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub shared: bool,
    pub action_type: ActionType,
    /// For redirects: the service chain spec traffic is sent through.
    #[serde(default)]
    pub action_value: Option<String>,
}

impl PolicyAction {
    pub fn is_redirect(&self) -> bool {
        self.action_type == ActionType::Redirect
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalRoute {
    pub destination: IpPrefix,
    /// Absent means "use the segment's default gateway".
    #[serde(default)]
    pub nexthop: Option<IpAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalSegment {
    pub id: String,
    /// Key into the supported-segment catalog.
    pub name: String,
    pub tenant_id: String,
    #[serde(default)]
    pub shared: bool,
    pub cidr: IpPrefix,
    #[serde(default)]
    pub port_address_translation: bool,
    #[serde(default)]
    pub external_routes: Vec<ExternalRoute>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPolicy {
    pub id: String,
    pub tenant_id: String,
    #[serde(default)]
    pub shared: bool,
    #[serde(default)]
    pub external_segments: Vec<String>,
    #[serde(default)]
    pub provided_policy_rule_sets: BTreeMap<String, String>,
    #[serde(default)]
    pub consumed_policy_rule_sets: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceChainSpec {
    pub id: String,
    #[serde(default)]
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceChainNode {
    pub id: String,
    pub service_type: String,
}

/// A service chain bound to one (provider, redirecting rule set) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceChainInstance {
    pub id: String,
    pub provider_epg_id: String,
    #[serde(default)]
    pub consumer_epg_id: Option<String>,
    pub policy_rule_set_id: String,
    #[serde(default)]
    pub servicechain_specs: Vec<String>,
}

impl_scoped!(
    RoutingContext,
    BridgeDomain,
    EndpointGroup,
    PolicyRuleSet,
    PolicyRule,
    PolicyClassifier,
    PolicyAction,
    ExternalSegment,
    ExternalPolicy,
);

/// Kinds of objects the lifecycle framework fires hooks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    RoutingContext,
    BridgeDomain,
    EndpointGroup,
    Endpoint,
    PolicyRuleSet,
    PolicyRule,
    PolicyClassifier,
    PolicyAction,
    ExternalSegment,
    ExternalPolicy,
    ServiceChainSpec,
    ServiceChainNode,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::RoutingContext => "routing_context",
            EntityKind::BridgeDomain => "bridge_domain",
            EntityKind::EndpointGroup => "endpoint_group",
            EntityKind::Endpoint => "endpoint",
            EntityKind::PolicyRuleSet => "policy_rule_set",
            EntityKind::PolicyRule => "policy_rule",
            EntityKind::PolicyClassifier => "policy_classifier",
            EntityKind::PolicyAction => "policy_action",
            EntityKind::ExternalSegment => "external_segment",
            EntityKind::ExternalPolicy => "external_policy",
            EntityKind::ServiceChainSpec => "servicechain_spec",
            EntityKind::ServiceChainNode => "servicechain_node",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A policy object of any kind, tagged with its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyObject {
    RoutingContext(RoutingContext),
    BridgeDomain(BridgeDomain),
    EndpointGroup(EndpointGroup),
    Endpoint(Endpoint),
    PolicyRuleSet(PolicyRuleSet),
    PolicyRule(PolicyRule),
    PolicyClassifier(PolicyClassifier),
    PolicyAction(PolicyAction),
    ExternalSegment(ExternalSegment),
    ExternalPolicy(ExternalPolicy),
    #[serde(rename = "servicechain_spec")]
    ServiceChainSpec(ServiceChainSpec),
    #[serde(rename = "servicechain_node")]
    ServiceChainNode(ServiceChainNode),
}

impl PolicyObject {
    pub fn kind(&self) -> EntityKind {
        match self {
            PolicyObject::RoutingContext(_) => EntityKind::RoutingContext,
            PolicyObject::BridgeDomain(_) => EntityKind::BridgeDomain,
            PolicyObject::EndpointGroup(_) => EntityKind::EndpointGroup,
            PolicyObject::Endpoint(_) => EntityKind::Endpoint,
            PolicyObject::PolicyRuleSet(_) => EntityKind::PolicyRuleSet,
            PolicyObject::PolicyRule(_) => EntityKind::PolicyRule,
            PolicyObject::PolicyClassifier(_) => EntityKind::PolicyClassifier,
            PolicyObject::PolicyAction(_) => EntityKind::PolicyAction,
            PolicyObject::ExternalSegment(_) => EntityKind::ExternalSegment,
            PolicyObject::ExternalPolicy(_) => EntityKind::ExternalPolicy,
            PolicyObject::ServiceChainSpec(_) => EntityKind::ServiceChainSpec,
            PolicyObject::ServiceChainNode(_) => EntityKind::ServiceChainNode,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            PolicyObject::RoutingContext(o) => &o.id,
            PolicyObject::BridgeDomain(o) => &o.id,
            PolicyObject::EndpointGroup(o) => &o.id,
            PolicyObject::Endpoint(o) => &o.id,
            PolicyObject::PolicyRuleSet(o) => &o.id,
            PolicyObject::PolicyRule(o) => &o.id,
            PolicyObject::PolicyClassifier(o) => &o.id,
            PolicyObject::PolicyAction(o) => &o.id,
            PolicyObject::ExternalSegment(o) => &o.id,
            PolicyObject::ExternalPolicy(o) => &o.id,
            PolicyObject::ServiceChainSpec(o) => &o.id,
            PolicyObject::ServiceChainNode(o) => &o.id,
        }
    }
}

macro_rules! impl_into_object {
    ($($ty:ident),+ $(,)?) => {
        $(
            impl From<$ty> for PolicyObject {
                fn from(object: $ty) -> Self {
                    PolicyObject::$ty(object)
                }
            }
        )+
    };
}

impl_into_object!(
    RoutingContext,
    BridgeDomain,
    EndpointGroup,
    Endpoint,
    PolicyRuleSet,
    PolicyRule,
    PolicyClassifier,
    PolicyAction,
    ExternalSegment,
    ExternalPolicy,
    ServiceChainSpec,
    ServiceChainNode,
);
