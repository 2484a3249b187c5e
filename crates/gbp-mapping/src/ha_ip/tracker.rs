//! Floating address ownership.
//!
//! Agents report which port currently answers for a floating (VRRP/HA)
//! address. The tracker keeps exactly one owner per (address, network) and
//! tells the caller which ports need their placement pushed again.

use super::store::{HaIpAssociation, HaIpStore, StoreError, StoreResult};
use crate::policy::Port;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// An agent's ownership report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpOwnerInfo {
    pub port: String,
    #[serde(default)]
    pub ip_address_v4: Option<String>,
    #[serde(default)]
    pub ip_address_v6: Option<String>,
    /// Defaults to the reporting port's network.
    #[serde(default)]
    pub network_id: Option<String>,
}

impl IpOwnerInfo {
    fn addresses(&self) -> impl Iterator<Item = &str> {
        [self.ip_address_v4.as_deref(), self.ip_address_v6.as_deref()]
            .into_iter()
            .flatten()
            .filter(|ip| !ip.is_empty())
    }
}

pub struct HaIpTracker {
    store: Arc<dyn HaIpStore>,
}

impl std::fmt::Debug for HaIpTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HaIpTracker").finish_non_exhaustive()
    }
}

impl HaIpTracker {
    pub fn new(store: Arc<dyn HaIpStore>) -> Self {
        Self { store }
    }

    /// Records `port_id` as the owner of `ip` on `network_id`.
    ///
    /// Returns the ports whose placement changed: the claimant, plus the
    /// evicted previous owner if there was one. A repeated claim is a no-op;
    /// a claim by a port that has vanished is dropped.
    pub fn claim(&self, port_id: &str, ip: &str, network_id: &str) -> StoreResult<BTreeSet<String>> {
        let mut affected = BTreeSet::from([port_id.to_string()]);
        let mut txn = self.store.begin()?;
        let previous = txn.owner_of(ip, network_id);

        match txn.insert(HaIpAssociation::new(port_id, ip)) {
            Ok(()) => {}
            Err(StoreError::DuplicateEntry { .. }) => {
                debug!(port_id, ip, "Ownership already recorded");
            }
            Err(StoreError::ReferenceMissing { .. }) => {
                debug!(port_id, ip, "Ignoring claim for missing port");
                return Ok(affected);
            }
            Err(e) => return Err(e),
        }

        if let Some(old_owner) = previous.filter(|owner| owner != port_id) {
            txn.delete(&old_owner, ip)?;
            debug!(port_id, ip, old_owner = %old_owner, "Moved address ownership");
            affected.insert(old_owner);
        }
        txn.commit()?;
        Ok(affected)
    }

    /// Drops the (port, ip) row; missing rows are fine.
    pub fn release(&self, port_id: &str, ip: &str) -> StoreResult<()> {
        let mut txn = self.store.begin()?;
        if txn.delete(port_id, ip)? == 0 {
            debug!(port_id, ip, "No ownership to release");
        }
        txn.commit()
    }

    pub fn owner_of(&self, ip: &str, network_id: &str) -> StoreResult<Option<String>> {
        self.store.owner_of(ip, network_id)
    }

    /// Addresses owned by the port, sorted.
    pub fn ips_of(&self, port_id: &str) -> StoreResult<Vec<String>> {
        self.store.ips_of(port_id)
    }

    pub fn associations(&self) -> StoreResult<Vec<HaIpAssociation>> {
        self.store.associations()
    }

    /// Forgets every address a deleted port owned.
    pub fn port_deleted(&self, port_id: &str) -> StoreResult<usize> {
        let removed = self.store.port_deleted(port_id)?;
        if removed > 0 {
            debug!(port_id, removed, "Dropped ownership of deleted port");
        }
        Ok(removed)
    }

    /// Applies an agent report for an existing port.
    ///
    /// Both address families are claimed independently. A report without
    /// a port or an address changes nothing.
    pub fn update_ip_owner(&self, info: &IpOwnerInfo, port: &Port) -> StoreResult<BTreeSet<String>> {
        let mut affected = BTreeSet::new();
        if info.port.is_empty() || info.addresses().next().is_none() {
            return Ok(affected);
        }
        debug!(port_id = %info.port, "Got IP owner update");
        self.store.port_updated(&port.id, &port.network_id)?;
        let network_id = info.network_id.as_deref().unwrap_or(&port.network_id);
        affected.insert(info.port.clone());
        for ip in info.addresses() {
            affected.extend(self.claim(&info.port, ip, network_id)?);
        }
        Ok(affected)
    }
}
