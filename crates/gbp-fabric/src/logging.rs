//! Tracing decorator for fabric controllers.

use crate::controller::FabricController;
use crate::error::FabricResult;
use crate::transaction::Transaction;
use std::time::Instant;
use tracing::{info, warn};

/// Logs every transaction before handing it to the wrapped controller.
#[derive(Debug, Default)]
pub struct LoggingFabric<C> {
    inner: C,
}

impl<C: FabricController> LoggingFabric<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }
}

impl<C: FabricController> FabricController for LoggingFabric<C> {
    fn commit(&self, txn: Transaction) -> FabricResult<()> {
        let label = txn.label().to_string();
        let op_count = txn.len();
        for op in txn.ops() {
            info!(label = %label, op = op.name(), owner = op.owner(), object = op.object());
        }

        let start = Instant::now();
        let result = self.inner.commit(txn);
        let elapsed_us = start.elapsed().as_micros() as u64;
        match &result {
            Ok(()) => info!(label = %label, op_count, elapsed_us, "Fabric transaction committed"),
            Err(e) => warn!(label = %label, op_count, elapsed_us, error = %e, "Fabric transaction rejected"),
        }
        result
    }
}
