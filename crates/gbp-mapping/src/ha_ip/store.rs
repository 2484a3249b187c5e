//! Persistence seam for HA address ownership.
//!
//! The relation holds `(port_id, ha_ip_address)` rows, unique per pair, with
//! a foreign key to the port that cascades on port deletion. Writers work
//! inside an explicit [`HaIpTransaction`]; readers use the store directly.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HaIpAssociation {
    pub port_id: String,
    pub ha_ip_address: String,
}

impl HaIpAssociation {
    pub fn new(port_id: impl Into<String>, ha_ip_address: impl Into<String>) -> Self {
        Self {
            port_id: port_id.into(),
            ha_ip_address: ha_ip_address.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The (port, address) row already exists.
    #[error("duplicate ownership entry: {ha_ip_address} on port {port_id}")]
    DuplicateEntry {
        port_id: String,
        ha_ip_address: String,
    },

    /// The referenced port is gone.
    #[error("port {port_id} does not exist")]
    ReferenceMissing { port_id: String },

    #[error("ownership store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A write transaction on the ownership relation.
///
/// A failed `insert` or `delete` leaves the transaction usable; only the
/// failed statement is discarded.
pub trait HaIpTransaction {
    fn contains(&self, port_id: &str, ha_ip_address: &str) -> bool;
    /// Port holding the address on the given network.
    fn owner_of(&self, ha_ip_address: &str, network_id: &str) -> Option<String>;
    fn insert(&mut self, association: HaIpAssociation) -> StoreResult<()>;
    /// Returns the number of rows removed.
    fn delete(&mut self, port_id: &str, ha_ip_address: &str) -> StoreResult<usize>;
    fn commit(self: Box<Self>) -> StoreResult<()>;
}

pub trait HaIpStore: Send + Sync {
    fn begin(&self) -> StoreResult<Box<dyn HaIpTransaction + '_>>;
    fn owner_of(&self, ha_ip_address: &str, network_id: &str) -> StoreResult<Option<String>>;
    /// Addresses owned by a port, sorted.
    fn ips_of(&self, port_id: &str) -> StoreResult<Vec<String>>;
    fn associations(&self) -> StoreResult<Vec<HaIpAssociation>>;
    /// Records that a port exists on a network so it may own addresses.
    fn port_updated(&self, port_id: &str, network_id: &str) -> StoreResult<()>;
    /// Drops every row of a deleted port; returns how many went.
    fn port_deleted(&self, port_id: &str) -> StoreResult<usize>;
}

/// In-memory ownership relation.
///
/// Ports must be registered before they can own addresses; removing a port
/// cascades to its rows.
#[derive(Debug, Default)]
pub struct MemoryHaIpStore {
    rows: Mutex<BTreeSet<HaIpAssociation>>,
    /// port id -> network id
    ports: DashMap<String, String>,
}

impl MemoryHaIpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_port(&self, port_id: impl Into<String>, network_id: impl Into<String>) {
        self.ports.insert(port_id.into(), network_id.into());
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, BTreeSet<HaIpAssociation>>> {
        self.rows
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }
}

fn owner_in(
    rows: &BTreeSet<HaIpAssociation>,
    ports: &DashMap<String, String>,
    ha_ip_address: &str,
    network_id: &str,
) -> Option<String> {
    rows.iter()
        .filter(|row| row.ha_ip_address == ha_ip_address)
        .find(|row| {
            ports
                .get(&row.port_id)
                .is_some_and(|net| net.value() == network_id)
        })
        .map(|row| row.port_id.clone())
}

struct MemoryHaIpTransaction<'a> {
    guard: MutexGuard<'a, BTreeSet<HaIpAssociation>>,
    staged: BTreeSet<HaIpAssociation>,
    ports: &'a DashMap<String, String>,
}

impl HaIpTransaction for MemoryHaIpTransaction<'_> {
    fn contains(&self, port_id: &str, ha_ip_address: &str) -> bool {
        self.staged
            .contains(&HaIpAssociation::new(port_id, ha_ip_address))
    }

    fn owner_of(&self, ha_ip_address: &str, network_id: &str) -> Option<String> {
        owner_in(&self.staged, self.ports, ha_ip_address, network_id)
    }

    fn insert(&mut self, association: HaIpAssociation) -> StoreResult<()> {
        if !self.ports.contains_key(&association.port_id) {
            return Err(StoreError::ReferenceMissing {
                port_id: association.port_id,
            });
        }
        if self.staged.contains(&association) {
            return Err(StoreError::DuplicateEntry {
                port_id: association.port_id,
                ha_ip_address: association.ha_ip_address,
            });
        }
        self.staged.insert(association);
        Ok(())
    }

    fn delete(&mut self, port_id: &str, ha_ip_address: &str) -> StoreResult<usize> {
        let removed = self
            .staged
            .remove(&HaIpAssociation::new(port_id, ha_ip_address));
        Ok(usize::from(removed))
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        let staged = std::mem::take(&mut self.staged);
        *self.guard = staged;
        Ok(())
    }
}

impl HaIpStore for MemoryHaIpStore {
    fn begin(&self) -> StoreResult<Box<dyn HaIpTransaction + '_>> {
        let guard = self.lock()?;
        let staged = guard.clone();
        Ok(Box::new(MemoryHaIpTransaction {
            guard,
            staged,
            ports: &self.ports,
        }))
    }

    fn owner_of(&self, ha_ip_address: &str, network_id: &str) -> StoreResult<Option<String>> {
        let rows = self.lock()?;
        Ok(owner_in(&rows, &self.ports, ha_ip_address, network_id))
    }

    fn ips_of(&self, port_id: &str) -> StoreResult<Vec<String>> {
        let rows = self.lock()?;
        let mut ips: Vec<String> = rows
            .iter()
            .filter(|row| row.port_id == port_id)
            .map(|row| row.ha_ip_address.clone())
            .collect();
        ips.sort();
        Ok(ips)
    }

    fn associations(&self) -> StoreResult<Vec<HaIpAssociation>> {
        Ok(self.lock()?.iter().cloned().collect())
    }

    fn port_updated(&self, port_id: &str, network_id: &str) -> StoreResult<()> {
        self.register_port(port_id, network_id);
        Ok(())
    }

    fn port_deleted(&self, port_id: &str) -> StoreResult<usize> {
        self.ports.remove(port_id);
        let mut rows = self.lock()?;
        let before = rows.len();
        rows.retain(|row| row.port_id != port_id);
        Ok(before - rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_uncommitted_changes_are_discarded() {
        let store = MemoryHaIpStore::new();
        store.register_port("p1", "net1");
        {
            let mut txn = store.begin().unwrap();
            txn.insert(HaIpAssociation::new("p1", "10.0.0.5")).unwrap();
        }
        assert!(store.associations().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_and_dangling_inserts() {
        let store = MemoryHaIpStore::new();
        store.register_port("p1", "net1");
        let mut txn = store.begin().unwrap();
        txn.insert(HaIpAssociation::new("p1", "10.0.0.5")).unwrap();

        assert!(matches!(
            txn.insert(HaIpAssociation::new("p1", "10.0.0.5")),
            Err(StoreError::DuplicateEntry { .. })
        ));
        assert_eq!(
            txn.insert(HaIpAssociation::new("gone", "10.0.0.5")),
            Err(StoreError::ReferenceMissing {
                port_id: "gone".to_string()
            })
        );
        txn.commit().unwrap();
        assert_eq!(store.ips_of("p1").unwrap(), vec!["10.0.0.5"]);
    }

    #[test]
    fn test_owner_is_scoped_to_network() {
        let store = MemoryHaIpStore::new();
        store.register_port("p1", "net1");
        store.register_port("p2", "net2");
        let mut txn = store.begin().unwrap();
        txn.insert(HaIpAssociation::new("p1", "10.0.0.5")).unwrap();
        txn.insert(HaIpAssociation::new("p2", "10.0.0.5")).unwrap();
        txn.commit().unwrap();

        assert_eq!(store.owner_of("10.0.0.5", "net1").unwrap().as_deref(), Some("p1"));
        assert_eq!(store.owner_of("10.0.0.5", "net2").unwrap().as_deref(), Some("p2"));
        assert_eq!(store.owner_of("10.0.0.5", "net3").unwrap(), None);
    }

    #[test]
    fn test_port_removal_cascades() {
        let store = MemoryHaIpStore::new();
        store.register_port("p1", "net1");
        let mut txn = store.begin().unwrap();
        txn.insert(HaIpAssociation::new("p1", "10.0.0.5")).unwrap();
        txn.insert(HaIpAssociation::new("p1", "10.0.0.6")).unwrap();
        txn.commit().unwrap();

        assert_eq!(store.port_deleted("p1").unwrap(), 2);
        assert!(store.ips_of("p1").unwrap().is_empty());
    }
}
