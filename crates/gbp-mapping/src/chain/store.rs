//! Service chain instance bookkeeping.
//!
//! Instances are keyed by id with a provider index, so the hooks that start
//! from an endpoint group never scan the whole table.
//!
//! A (provider, rule set) pair holds at most one instance. Hooks planning a
//! new chain first [`reserve`](ChainInstanceStore::reserve) the pair; the
//! claim lasts until the instance is stored or the [`ChainClaim`] drops.

use crate::policy::ServiceChainInstance;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// A change the orchestrator applies after its fabric transaction commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainChange {
    Create(ServiceChainInstance),
    /// Replaces the stored instance with the same id.
    Update(ServiceChainInstance),
    Delete(String),
}

pub trait ChainInstanceStore: Send + Sync {
    /// All instances, ordered by id.
    fn instances(&self) -> Vec<ServiceChainInstance>;
    fn get(&self, id: &str) -> Option<ServiceChainInstance>;
    fn for_provider(&self, provider_epg_id: &str) -> Vec<ServiceChainInstance>;
    fn for_rule_set(&self, policy_rule_set_id: &str) -> Vec<ServiceChainInstance>;
    /// The instance bound to a (provider, rule set) pair.
    fn find(&self, provider_epg_id: &str, policy_rule_set_id: &str) -> Option<ServiceChainInstance>;
    /// Claims the instance's (provider, rule set) pair for its creation.
    ///
    /// Returns the id of the stored or claimed instance already holding the
    /// pair.
    fn reserve(&self, instance: &ServiceChainInstance) -> Result<(), String>;
    /// Drops the claim of an instance that will not be stored.
    fn release(&self, instance_id: &str);
    /// Creating an instance for a pair held by another one is a no-op.
    fn apply(&self, change: ChainChange);
}

/// A pending [`reserve`](ChainInstanceStore::reserve), released on drop.
pub struct ChainClaim {
    store: Arc<dyn ChainInstanceStore>,
    instance_id: String,
}

impl ChainClaim {
    pub fn acquire(
        store: &Arc<dyn ChainInstanceStore>,
        instance: &ServiceChainInstance,
    ) -> Result<Self, String> {
        store.reserve(instance)?;
        Ok(Self {
            store: store.clone(),
            instance_id: instance.id.clone(),
        })
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}

impl std::fmt::Debug for ChainClaim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClaim")
            .field("instance_id", &self.instance_id)
            .finish_non_exhaustive()
    }
}

impl Drop for ChainClaim {
    fn drop(&mut self) {
        self.store.release(&self.instance_id);
    }
}

#[derive(Debug, Default)]
pub struct MemoryChainStore {
    instances: DashMap<String, ServiceChainInstance>,
    /// provider epg id -> instance ids
    by_provider: DashMap<String, BTreeSet<String>>,
    /// (provider epg id, rule set id) -> claiming instance id
    claims: DashMap<(String, String), String>,
    /// Serialises writers so the maps move together.
    write_lock: Mutex<()>,
}

impl MemoryChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    fn write(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn pair(instance: &ServiceChainInstance) -> (String, String) {
        (
            instance.provider_epg_id.clone(),
            instance.policy_rule_set_id.clone(),
        )
    }

    fn insert(&self, instance: ServiceChainInstance) {
        self.unindex(&instance.id);
        self.by_provider
            .entry(instance.provider_epg_id.clone())
            .or_default()
            .insert(instance.id.clone());
        self.instances.insert(instance.id.clone(), instance);
    }

    fn unindex(&self, id: &str) {
        let provider = match self.instances.get(id) {
            Some(existing) => existing.provider_epg_id.clone(),
            None => return,
        };
        if let Some(mut ids) = self.by_provider.get_mut(&provider) {
            ids.remove(id);
        }
        self.by_provider.remove_if(&provider, |_, ids| ids.is_empty());
    }
}

impl ChainInstanceStore for MemoryChainStore {
    fn instances(&self) -> Vec<ServiceChainInstance> {
        let mut all: Vec<_> = self.instances.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    fn get(&self, id: &str) -> Option<ServiceChainInstance> {
        self.instances.get(id).map(|e| e.value().clone())
    }

    fn for_provider(&self, provider_epg_id: &str) -> Vec<ServiceChainInstance> {
        let ids: Vec<String> = match self.by_provider.get(provider_epg_id) {
            Some(ids) => ids.iter().cloned().collect(),
            None => return Vec::new(),
        };
        ids.iter().filter_map(|id| self.get(id)).collect()
    }

    fn for_rule_set(&self, policy_rule_set_id: &str) -> Vec<ServiceChainInstance> {
        self.instances()
            .into_iter()
            .filter(|sci| sci.policy_rule_set_id == policy_rule_set_id)
            .collect()
    }

    fn find(&self, provider_epg_id: &str, policy_rule_set_id: &str) -> Option<ServiceChainInstance> {
        self.for_provider(provider_epg_id)
            .into_iter()
            .find(|sci| sci.policy_rule_set_id == policy_rule_set_id)
    }

    fn reserve(&self, instance: &ServiceChainInstance) -> Result<(), String> {
        let _guard = self.write();
        if let Some(existing) = self
            .find(&instance.provider_epg_id, &instance.policy_rule_set_id)
            .filter(|existing| existing.id != instance.id)
        {
            return Err(existing.id);
        }
        let pair = Self::pair(instance);
        let holder = self.claims.get(&pair).map(|holder| holder.value().clone());
        match holder {
            Some(holder) if holder != instance.id => Err(holder),
            _ => {
                self.claims.insert(pair, instance.id.clone());
                Ok(())
            }
        }
    }

    fn release(&self, instance_id: &str) {
        let _guard = self.write();
        self.claims.retain(|_, holder| holder != instance_id);
    }

    fn apply(&self, change: ChainChange) {
        let _guard = self.write();
        match change {
            ChainChange::Create(instance) => {
                let pair = Self::pair(&instance);
                if let Some(existing) = self
                    .find(&pair.0, &pair.1)
                    .filter(|existing| existing.id != instance.id)
                {
                    warn!(
                        instance = %instance.id,
                        existing = %existing.id,
                        provider = %pair.0,
                        policy_rule_set = %pair.1,
                        "Pair already chained, dropping duplicate instance"
                    );
                    return;
                }
                self.claims.remove_if(&pair, |_, holder| *holder == instance.id);
                self.insert(instance);
            }
            ChainChange::Update(instance) => self.insert(instance),
            ChainChange::Delete(id) => {
                self.unindex(&id);
                self.instances.remove(&id);
            }
        }
    }
}
