//! Policy model and snapshot access.

mod store;
mod types;

pub use store::{PolicyReader, PolicyStore};
pub use types::{
    ActionType, BridgeDomain, Direction, Endpoint, EndpointGroup, EntityKind, ExternalPolicy,
    ExternalRoute, ExternalSegment, PolicyAction, PolicyClassifier, PolicyObject, PolicyRule,
    PolicyRuleSet, Port, RoutingContext, Scoped, ServiceChainInstance, ServiceChainNode,
    ServiceChainSpec, Subnet,
};
