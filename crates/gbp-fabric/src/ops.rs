//! Typed fabric operations.
//!
//! One [`FabricOp`] variant exists per idempotent "ensure"/"delete" call the
//! fabric-controller client exposes. Every variant carries the `owner`
//! tenant the object is created under; shared policy objects resolve to the
//! common tenant before an operation is built.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Side of a contract subject a filter is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectDirection {
    In,
    Out,
}

impl fmt::Display for SubjectDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectDirection::In => write!(f, "in"),
            SubjectDirection::Out => write!(f, "out"),
        }
    }
}

/// Match criteria of a tenant filter entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterEntry {
    pub ether_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_from_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_to_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_from_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s_to_port: Option<u16>,
}

impl FilterEntry {
    /// An IP entry with no protocol or port restriction.
    pub fn ip() -> Self {
        FilterEntry {
            ether_type: "ip".to_string(),
            protocol: None,
            d_from_port: None,
            d_to_port: None,
            s_from_port: None,
            s_to_port: None,
        }
    }

    /// An entry matching every frame.
    pub fn unspecified() -> Self {
        FilterEntry {
            ether_type: "unspecified".to_string(),
            ..FilterEntry::ip()
        }
    }
}

/// A single idempotent call on the fabric controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FabricOp {
    EnsureContextEnforced {
        owner: String,
        context: String,
    },
    EnsureContextDeleted {
        owner: String,
        context: String,
    },
    EnsureBdCreated {
        owner: String,
        bd: String,
        ctx_owner: String,
        ctx_name: String,
        allow_broadcast: bool,
    },
    DeleteBd {
        owner: String,
        bd: String,
    },
    EnsureEpgCreated {
        owner: String,
        epg: String,
        bd_owner: String,
        bd_name: String,
    },
    DeleteEpg {
        owner: String,
        epg: String,
    },
    EnsureSubnetCreated {
        owner: String,
        bd: String,
        gateway: String,
    },
    EnsureSubnetDeleted {
        owner: String,
        bd: String,
        gateway: String,
    },
    CreateContract {
        owner: String,
        contract: String,
    },
    DeleteContract {
        owner: String,
        contract: String,
    },
    SetContractForEpg {
        owner: String,
        epg: String,
        contract: String,
        contract_owner: String,
        provider: bool,
    },
    UnsetContractForEpg {
        owner: String,
        epg: String,
        contract: String,
        contract_owner: String,
        provider: bool,
    },
    CreateTenantFilter {
        owner: String,
        filter: String,
        entry: FilterEntry,
    },
    DeleteTenantFilter {
        owner: String,
        filter: String,
    },
    ManageContractSubjectFilter {
        owner: String,
        contract: String,
        subject: String,
        filter: String,
        rule_owner: String,
        direction: SubjectDirection,
        unset: bool,
    },
    EnsureExternalRoutedNetworkCreated {
        owner: String,
        segment: String,
        context: String,
    },
    DeleteExternalRoutedNetwork {
        owner: String,
        segment: String,
    },
    EnsureLogicalNodeProfileCreated {
        owner: String,
        segment: String,
        switch: String,
        module: String,
        port: String,
        encap: String,
        address: String,
        router_id: String,
    },
    EnsureStaticRouteCreated {
        owner: String,
        segment: String,
        switch: String,
        subnet: String,
        nexthop: String,
    },
    EnsureStaticRouteDeleted {
        owner: String,
        segment: String,
        switch: String,
        subnet: String,
    },
    EnsureNextHopDeleted {
        owner: String,
        segment: String,
        switch: String,
        subnet: String,
        nexthop: String,
    },
    EnsureExternalEpgCreated {
        owner: String,
        segment: String,
        external_epg: String,
        subnet: String,
    },
    EnsureExternalEpgRoutesDeleted {
        owner: String,
        segment: String,
        external_epg: String,
        subnets: Vec<String>,
    },
    EnsureExternalEpgDeleted {
        owner: String,
        segment: String,
        external_epg: String,
    },
    SetContractForExternalEpg {
        owner: String,
        segment: String,
        external_epg: String,
        contract: String,
        provided: bool,
    },
    UnsetContractForExternalEpg {
        owner: String,
        segment: String,
        external_epg: String,
        contract: String,
        provided: bool,
    },
}

impl FabricOp {
    /// Stable snake_case name of the call, as used in logs and call logs.
    pub fn name(&self) -> &'static str {
        match self {
            FabricOp::EnsureContextEnforced { .. } => "ensure_context_enforced",
            FabricOp::EnsureContextDeleted { .. } => "ensure_context_deleted",
            FabricOp::EnsureBdCreated { .. } => "ensure_bd_created",
            FabricOp::DeleteBd { .. } => "delete_bd",
            FabricOp::EnsureEpgCreated { .. } => "ensure_epg_created",
            FabricOp::DeleteEpg { .. } => "delete_epg",
            FabricOp::EnsureSubnetCreated { .. } => "ensure_subnet_created",
            FabricOp::EnsureSubnetDeleted { .. } => "ensure_subnet_deleted",
            FabricOp::CreateContract { .. } => "create_contract",
            FabricOp::DeleteContract { .. } => "delete_contract",
            FabricOp::SetContractForEpg { .. } => "set_contract_for_epg",
            FabricOp::UnsetContractForEpg { .. } => "unset_contract_for_epg",
            FabricOp::CreateTenantFilter { .. } => "create_tenant_filter",
            FabricOp::DeleteTenantFilter { .. } => "delete_tenant_filter",
            FabricOp::ManageContractSubjectFilter { .. } => "manage_contract_subject_filter",
            FabricOp::EnsureExternalRoutedNetworkCreated { .. } => {
                "ensure_external_routed_network_created"
            }
            FabricOp::DeleteExternalRoutedNetwork { .. } => "delete_external_routed_network",
            FabricOp::EnsureLogicalNodeProfileCreated { .. } => {
                "ensure_logical_node_profile_created"
            }
            FabricOp::EnsureStaticRouteCreated { .. } => "ensure_static_route_created",
            FabricOp::EnsureStaticRouteDeleted { .. } => "ensure_static_route_deleted",
            FabricOp::EnsureNextHopDeleted { .. } => "ensure_next_hop_deleted",
            FabricOp::EnsureExternalEpgCreated { .. } => "ensure_external_epg_created",
            FabricOp::EnsureExternalEpgRoutesDeleted { .. } => {
                "ensure_external_epg_routes_deleted"
            }
            FabricOp::EnsureExternalEpgDeleted { .. } => "ensure_external_epg_deleted",
            FabricOp::SetContractForExternalEpg { .. } => "set_contract_for_external_epg",
            FabricOp::UnsetContractForExternalEpg { .. } => "unset_contract_for_external_epg",
        }
    }

    /// Tenant the affected object lives in.
    pub fn owner(&self) -> &str {
        match self {
            FabricOp::EnsureContextEnforced { owner, .. }
            | FabricOp::EnsureContextDeleted { owner, .. }
            | FabricOp::EnsureBdCreated { owner, .. }
            | FabricOp::DeleteBd { owner, .. }
            | FabricOp::EnsureEpgCreated { owner, .. }
            | FabricOp::DeleteEpg { owner, .. }
            | FabricOp::EnsureSubnetCreated { owner, .. }
            | FabricOp::EnsureSubnetDeleted { owner, .. }
            | FabricOp::CreateContract { owner, .. }
            | FabricOp::DeleteContract { owner, .. }
            | FabricOp::SetContractForEpg { owner, .. }
            | FabricOp::UnsetContractForEpg { owner, .. }
            | FabricOp::CreateTenantFilter { owner, .. }
            | FabricOp::DeleteTenantFilter { owner, .. }
            | FabricOp::ManageContractSubjectFilter { owner, .. }
            | FabricOp::EnsureExternalRoutedNetworkCreated { owner, .. }
            | FabricOp::DeleteExternalRoutedNetwork { owner, .. }
            | FabricOp::EnsureLogicalNodeProfileCreated { owner, .. }
            | FabricOp::EnsureStaticRouteCreated { owner, .. }
            | FabricOp::EnsureStaticRouteDeleted { owner, .. }
            | FabricOp::EnsureNextHopDeleted { owner, .. }
            | FabricOp::EnsureExternalEpgCreated { owner, .. }
            | FabricOp::EnsureExternalEpgRoutesDeleted { owner, .. }
            | FabricOp::EnsureExternalEpgDeleted { owner, .. }
            | FabricOp::SetContractForExternalEpg { owner, .. }
            | FabricOp::UnsetContractForExternalEpg { owner, .. } => owner,
        }
    }

    /// Name of the primary object the call acts on.
    pub fn object(&self) -> &str {
        match self {
            FabricOp::EnsureContextEnforced { context, .. }
            | FabricOp::EnsureContextDeleted { context, .. } => context,
            FabricOp::EnsureBdCreated { bd, .. }
            | FabricOp::DeleteBd { bd, .. }
            | FabricOp::EnsureSubnetCreated { bd, .. }
            | FabricOp::EnsureSubnetDeleted { bd, .. } => bd,
            FabricOp::EnsureEpgCreated { epg, .. }
            | FabricOp::DeleteEpg { epg, .. }
            | FabricOp::SetContractForEpg { epg, .. }
            | FabricOp::UnsetContractForEpg { epg, .. } => epg,
            FabricOp::CreateContract { contract, .. }
            | FabricOp::DeleteContract { contract, .. }
            | FabricOp::ManageContractSubjectFilter { contract, .. } => contract,
            FabricOp::CreateTenantFilter { filter, .. }
            | FabricOp::DeleteTenantFilter { filter, .. } => filter,
            FabricOp::EnsureExternalRoutedNetworkCreated { segment, .. }
            | FabricOp::DeleteExternalRoutedNetwork { segment, .. }
            | FabricOp::EnsureLogicalNodeProfileCreated { segment, .. }
            | FabricOp::EnsureStaticRouteCreated { segment, .. }
            | FabricOp::EnsureStaticRouteDeleted { segment, .. }
            | FabricOp::EnsureNextHopDeleted { segment, .. } => segment,
            FabricOp::EnsureExternalEpgCreated { external_epg, .. }
            | FabricOp::EnsureExternalEpgRoutesDeleted { external_epg, .. }
            | FabricOp::EnsureExternalEpgDeleted { external_epg, .. }
            | FabricOp::SetContractForExternalEpg { external_epg, .. }
            | FabricOp::UnsetContractForExternalEpg { external_epg, .. } => external_epg,
        }
    }

    /// Returns true for calls that remove state from the fabric.
    pub fn is_removal(&self) -> bool {
        match self {
            FabricOp::ManageContractSubjectFilter { unset, .. } => *unset,
            FabricOp::EnsureContextDeleted { .. }
            | FabricOp::DeleteBd { .. }
            | FabricOp::DeleteEpg { .. }
            | FabricOp::EnsureSubnetDeleted { .. }
            | FabricOp::DeleteContract { .. }
            | FabricOp::UnsetContractForEpg { .. }
            | FabricOp::DeleteTenantFilter { .. }
            | FabricOp::DeleteExternalRoutedNetwork { .. }
            | FabricOp::EnsureStaticRouteDeleted { .. }
            | FabricOp::EnsureNextHopDeleted { .. }
            | FabricOp::EnsureExternalEpgRoutesDeleted { .. }
            | FabricOp::EnsureExternalEpgDeleted { .. }
            | FabricOp::UnsetContractForExternalEpg { .. } => true,
            _ => false,
        }
    }
}

impl fmt::Display for FabricOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}/{})", self.name(), self.owner(), self.object())
    }
}
