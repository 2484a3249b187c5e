//! HA address ownership tracking.

mod store;
mod tracker;

pub use store::{
    HaIpAssociation, HaIpStore, HaIpTransaction, MemoryHaIpStore, StoreError, StoreResult,
};
pub use tracker::{HaIpTracker, IpOwnerInfo};
