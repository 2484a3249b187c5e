//! Error types for the mapping core.

use crate::ha_ip::StoreError;
use gbp_fabric::FabricError;
use thiserror::Error;

/// Error type for lifecycle hooks and agent queries.
///
/// The first four variants are policy-constraint violations: they are
/// raised before any fabric operation is built and carry a stable
/// [`type_name`](MappingError::type_name) callers may surface to users.
#[derive(Debug, Clone, Error)]
pub enum MappingError {
    #[error("external segment {segment} is already used by routing context {existing}; {routing_context} cannot attach to it")]
    OnlyOneL3PolicyIsAllowedPerExternalSegment {
        segment: String,
        routing_context: String,
        existing: String,
    },

    #[error("routing context {routing_context} requests {count} addresses on external segment {segment}; only one is allowed")]
    OnlyOneAddressIsAllowedPerExternalSegment {
        segment: String,
        routing_context: String,
        count: usize,
    },

    #[error("unsupported feature: {feature}")]
    UnsupportedFeature { feature: String },

    #[error("policy rule {rule} has {count} actions; only one action per rule is supported")]
    MultipleActionsNotSupported { rule: String, count: usize },

    /// A related object the hook needs is missing from the snapshot.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The agent sent a device name that does not embed a port id.
    #[error("invalid device identifier: {0}")]
    InvalidDevice(String),

    /// The hook event is malformed (e.g. update without the previous value).
    #[error("invalid hook event: {0}")]
    InvalidEvent(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Fabric(#[from] FabricError),

    #[error("ownership store error: {0}")]
    Store(#[from] StoreError),
}

impl MappingError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        MappingError::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Stable name of the error, suitable for API responses.
    pub fn type_name(&self) -> &'static str {
        match self {
            MappingError::OnlyOneL3PolicyIsAllowedPerExternalSegment { .. } => {
                "OnlyOneL3PolicyIsAllowedPerExternalSegment"
            }
            MappingError::OnlyOneAddressIsAllowedPerExternalSegment { .. } => {
                "OnlyOneAddressIsAllowedPerExternalSegment"
            }
            MappingError::UnsupportedFeature { .. } => "UnsupportedFeature",
            MappingError::MultipleActionsNotSupported { .. } => "MultipleActionsNotSupported",
            MappingError::NotFound { .. } => "NotFound",
            MappingError::InvalidDevice(_) => "InvalidDevice",
            MappingError::InvalidEvent(_) => "InvalidEvent",
            MappingError::InvalidConfig(_) => "InvalidConfig",
            MappingError::Fabric(_) => "FabricError",
            MappingError::Store(_) => "StoreError",
        }
    }

    /// Returns true for policy-constraint violations.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            MappingError::OnlyOneL3PolicyIsAllowedPerExternalSegment { .. }
                | MappingError::OnlyOneAddressIsAllowedPerExternalSegment { .. }
                | MappingError::UnsupportedFeature { .. }
                | MappingError::MultipleActionsNotSupported { .. }
        )
    }
}

/// Result type for the mapping core.
pub type MappingResult<T> = Result<T, MappingError>;
