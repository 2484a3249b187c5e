//! The fabric-controller port.

use crate::error::FabricResult;
use crate::transaction::Transaction;

/// Client side of the fabric controller.
///
/// Implementations apply every operation of a transaction or none of them.
/// Re-applying an already applied "ensure" operation must be a no-op.
pub trait FabricController: Send + Sync {
    /// Applies a transaction.
    fn commit(&self, txn: Transaction) -> FabricResult<()>;
}
