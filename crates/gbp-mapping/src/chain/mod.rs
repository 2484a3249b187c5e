//! Service chain instances.

mod store;

pub use store::{ChainChange, ChainClaim, ChainInstanceStore, MemoryChainStore};
