//! Ordered batches of fabric operations.

use crate::ops::FabricOp;
use serde::Serialize;

/// One lifecycle hook's worth of fabric operations, in issue order.
///
/// The controller applies a transaction all-or-nothing. Order matters:
/// dependents must be removed before the objects they hang off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Transaction {
    label: String,
    ops: Vec<FabricOp>,
}

impl Transaction {
    pub fn new(label: impl Into<String>) -> Self {
        Transaction {
            label: label.into(),
            ops: Vec::new(),
        }
    }

    /// Short description of the hook that produced this batch.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn push(&mut self, op: FabricOp) {
        self.ops.push(op);
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = FabricOp>) {
        self.ops.extend(ops);
    }

    pub fn ops(&self) -> &[FabricOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<FabricOp> {
        self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
