//! Verification helpers over the fabric call log
//!
//! Assertions return [`VerifyResult`] so tests can `expect` them with a
//! scenario-specific message.

use gbp_fabric::FabricOp;
use thiserror::Error;

/// Verification error types
#[derive(Error, Debug)]
pub enum VerificationError {
    #[error("Expected {expected} '{call}' calls, found {actual}")]
    CountMismatch {
        call: String,
        expected: usize,
        actual: usize,
    },

    #[error("Expected call {call} not found")]
    CallNotFound { call: String },

    #[error("Unexpected call {call}")]
    UnexpectedCall { call: String },

    #[error("Expected {first} before {second}")]
    OrderViolation { first: String, second: String },
}

/// Result type for verification operations
pub type VerifyResult<T> = Result<T, VerificationError>;

/// Fabric call-log verification helper
#[derive(Debug, Clone)]
pub struct CallVerifier {
    calls: Vec<FabricOp>,
}

impl CallVerifier {
    pub fn new(calls: Vec<FabricOp>) -> Self {
        Self { calls }
    }

    pub fn calls(&self) -> &[FabricOp] {
        &self.calls
    }

    /// Calls with the given name, in commit order.
    pub fn named(&self, call: &str) -> Vec<&FabricOp> {
        self.calls.iter().filter(|op| op.name() == call).collect()
    }

    /// Objects touched by calls with the given name, in commit order.
    pub fn objects(&self, call: &str) -> Vec<String> {
        self.named(call)
            .into_iter()
            .map(|op| op.object().to_string())
            .collect()
    }

    fn position(&self, op: &FabricOp) -> VerifyResult<usize> {
        self.calls
            .iter()
            .position(|c| c == op)
            .ok_or_else(|| VerificationError::CallNotFound {
                call: op.to_string(),
            })
    }

    pub fn assert_count(&self, call: &str, expected: usize) -> VerifyResult<()> {
        let actual = self.named(call).len();
        if actual != expected {
            return Err(VerificationError::CountMismatch {
                call: call.to_string(),
                expected,
                actual,
            });
        }
        Ok(())
    }

    pub fn assert_contains(&self, op: &FabricOp) -> VerifyResult<()> {
        self.position(op).map(|_| ())
    }

    pub fn assert_absent(&self, call: &str) -> VerifyResult<()> {
        match self.named(call).first() {
            Some(op) => Err(VerificationError::UnexpectedCall {
                call: op.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Verifies `first` was issued before `second`.
    pub fn assert_before(&self, first: &FabricOp, second: &FabricOp) -> VerifyResult<()> {
        if self.position(first)? > self.position(second)? {
            return Err(VerificationError::OrderViolation {
                first: first.to_string(),
                second: second.to_string(),
            });
        }
        Ok(())
    }

    /// Verifies the log only adds state to the fabric.
    pub fn assert_no_removals(&self) -> VerifyResult<()> {
        match self.calls.iter().find(|op| op.is_removal()) {
            Some(op) => Err(VerificationError::UnexpectedCall {
                call: op.to_string(),
            }),
            None => Ok(()),
        }
    }
}
