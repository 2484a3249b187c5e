//! Call-log fabric controller.
//!
//! [`RecordingFabric`] accepts every transaction and keeps it in memory, in
//! commit order. It backs dry-run replays and is the test double for the
//! mapping core. Failures can be injected to exercise abort paths.

use crate::controller::FabricController;
use crate::error::{FabricError, FabricResult};
use crate::ops::FabricOp;
use crate::transaction::Transaction;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum FailurePlan {
    NextCommit(FabricError),
    OnOperation(&'static str, FabricError),
}

/// Fabric controller that records committed transactions.
#[derive(Debug, Default)]
pub struct RecordingFabric {
    committed: Mutex<Vec<Transaction>>,
    failure: Mutex<Option<FailurePlan>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl RecordingFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects the next commit with `err`, then behaves normally.
    pub fn fail_next_commit(&self, err: FabricError) {
        *lock(&self.failure) = Some(FailurePlan::NextCommit(err));
    }

    /// Rejects every commit containing an operation named `op_name`.
    pub fn fail_on(&self, op_name: &'static str, err: FabricError) {
        *lock(&self.failure) = Some(FailurePlan::OnOperation(op_name, err));
    }

    /// Clears any injected failure.
    pub fn heal(&self) {
        *lock(&self.failure) = None;
    }

    /// All committed transactions, oldest first.
    pub fn transactions(&self) -> Vec<Transaction> {
        lock(&self.committed).clone()
    }

    /// All committed operations flattened in commit order.
    pub fn calls(&self) -> Vec<FabricOp> {
        lock(&self.committed)
            .iter()
            .flat_map(|txn| txn.ops().iter().cloned())
            .collect()
    }

    /// Committed operations with the given call name.
    pub fn calls_named(&self, name: &str) -> Vec<FabricOp> {
        self.calls()
            .into_iter()
            .filter(|op| op.name() == name)
            .collect()
    }

    /// Forgets everything recorded so far.
    pub fn clear(&self) {
        lock(&self.committed).clear();
    }
}

impl FabricController for RecordingFabric {
    fn commit(&self, txn: Transaction) -> FabricResult<()> {
        let mut failure = lock(&self.failure);
        match failure.take() {
            Some(FailurePlan::NextCommit(err)) => {
                warn!(label = txn.label(), "Injected fabric failure: {}", err);
                return Err(err);
            }
            Some(FailurePlan::OnOperation(name, err)) => {
                let hit = txn.ops().iter().any(|op| op.name() == name);
                *failure = Some(FailurePlan::OnOperation(name, err.clone()));
                if hit {
                    warn!(label = txn.label(), op = name, "Injected fabric failure: {}", err);
                    return Err(err);
                }
            }
            None => {}
        }
        drop(failure);

        for op in txn.ops() {
            debug!(label = txn.label(), "fabric call {}", op);
        }
        lock(&self.committed).push(txn);
        Ok(())
    }
}
