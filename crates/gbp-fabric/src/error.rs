//! Fabric error types.
//!
//! Every failure reported by the fabric-controller client is mapped onto
//! [`FabricError`]. The mapping core never retries; a failed commit aborts
//! the lifecycle hook that produced the transaction.

use thiserror::Error;

/// Error type for fabric operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FabricError {
    /// The controller refused one of the operations in the transaction.
    #[error("fabric rejected {operation}: {message}")]
    Rejected { operation: String, message: String },

    /// An object referenced by an operation does not exist.
    #[error("fabric object not found: {object}")]
    NotFound { object: String },

    /// The object still has dependents and cannot be removed.
    #[error("fabric object in use: {object}")]
    ObjectInUse { object: String },

    /// The controller could not be reached.
    #[error("fabric controller unreachable: {message}")]
    Unreachable { message: String },

    /// Internal error.
    #[error("internal fabric error: {message}")]
    Internal { message: String },
}

impl FabricError {
    /// Creates a rejection error for a named operation.
    pub fn rejected(operation: impl Into<String>, message: impl Into<String>) -> Self {
        FabricError::Rejected {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Creates a not found error with an object description.
    pub fn not_found(object: impl Into<String>) -> Self {
        FabricError::NotFound {
            object: object.into(),
        }
    }

    /// Creates an object in use error.
    pub fn object_in_use(object: impl Into<String>) -> Self {
        FabricError::ObjectInUse {
            object: object.into(),
        }
    }

    /// Creates an unreachable error.
    pub fn unreachable(message: impl Into<String>) -> Self {
        FabricError::Unreachable {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        FabricError::Internal {
            message: message.into(),
        }
    }

    /// Returns true if the controller would likely accept a resubmission.
    ///
    /// The mapping core does not retry on its own; callers that re-deliver
    /// hooks can use this to decide.
    pub fn is_transient(&self) -> bool {
        matches!(self, FabricError::Unreachable { .. })
    }
}

/// Result type for fabric operations.
pub type FabricResult<T> = Result<T, FabricError>;
