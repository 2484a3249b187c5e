//! MappingOrch: the policy-to-fabric orchestrator.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gbp_fabric::{FabricController, Transaction};
use serde::Serialize;
use tracing::{debug, warn};

use crate::audit::{AuditCategory, AuditObject, AuditRecord};
use crate::audit_log;
use crate::chain::{ChainChange, ChainClaim, ChainInstanceStore, MemoryChainStore};
use crate::config::MappingConfig;
use crate::error::MappingResult;
use crate::ha_ip::{HaIpStore, HaIpTracker, MemoryHaIpStore};
use crate::naming::{IdentityNameMapper, NameMapper};
use crate::notifier::{NoOpNotifier, PortNotifier};
use crate::policy::{Port, Scoped};

/// Everything one hook wants to change, applied only if the fabric accepts
/// the transaction.
#[derive(Debug)]
pub(crate) struct HookPlan {
    pub txn: Transaction,
    pub chain_changes: Vec<ChainChange>,
    /// Pairs held for the instances this plan creates; dropped with the plan.
    pub claims: Vec<ChainClaim>,
    notify: Vec<Port>,
}

impl HookPlan {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            txn: Transaction::new(label),
            chain_changes: Vec::new(),
            claims: Vec::new(),
            notify: Vec::new(),
        }
    }

    /// Queues a port notification; each port is notified once.
    pub fn notify(&mut self, port: Port) {
        if !self.notify.iter().any(|p| p.id == port.id) {
            self.notify.push(port);
        }
    }

    fn is_noop(&self) -> bool {
        self.txn.is_empty() && self.chain_changes.is_empty() && self.notify.is_empty()
    }
}

/// Snapshot of orchestrator counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingOrchStats {
    pub hooks_processed: u64,
    pub transactions_committed: u64,
    pub fabric_ops_issued: u64,
    pub fabric_failures: u64,
    pub policy_rejections: u64,
    pub chains_created: u64,
    pub chains_updated: u64,
    pub chains_deleted: u64,
    pub details_served: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub hooks_processed: AtomicU64,
    pub transactions_committed: AtomicU64,
    pub fabric_ops_issued: AtomicU64,
    pub fabric_failures: AtomicU64,
    pub policy_rejections: AtomicU64,
    pub chains_created: AtomicU64,
    pub chains_updated: AtomicU64,
    pub chains_deleted: AtomicU64,
    pub details_served: AtomicU64,
}

impl Counters {
    pub fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MappingOrchStats {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MappingOrchStats {
            hooks_processed: get(&self.hooks_processed),
            transactions_committed: get(&self.transactions_committed),
            fabric_ops_issued: get(&self.fabric_ops_issued),
            fabric_failures: get(&self.fabric_failures),
            policy_rejections: get(&self.policy_rejections),
            chains_created: get(&self.chains_created),
            chains_updated: get(&self.chains_updated),
            chains_deleted: get(&self.chains_deleted),
            details_served: get(&self.details_served),
        }
    }
}

/// Projects group-policy lifecycle events onto the fabric.
///
/// Entry points take `&self`; the collaborators serialise their own writes.
pub struct MappingOrch {
    pub(crate) config: MappingConfig,
    pub(crate) fabric: Arc<dyn FabricController>,
    pub(crate) chains: Arc<dyn ChainInstanceStore>,
    pub(crate) notifier: Arc<dyn PortNotifier>,
    pub(crate) names: Arc<dyn NameMapper>,
    pub(crate) ha_ip: HaIpTracker,
    pub(crate) counters: Counters,
}

impl std::fmt::Debug for MappingOrch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappingOrch")
            .field("config", &self.config)
            .field("chain_instances", &self.chains.instances().len())
            .field("stats", &self.stats())
            .finish()
    }
}

impl MappingOrch {
    /// Creates an orchestrator with in-memory chain and ownership stores.
    pub fn new(config: MappingConfig, fabric: Arc<dyn FabricController>) -> Self {
        Self {
            config,
            fabric,
            chains: Arc::new(MemoryChainStore::new()),
            notifier: Arc::new(NoOpNotifier),
            names: Arc::new(IdentityNameMapper),
            ha_ip: HaIpTracker::new(Arc::new(MemoryHaIpStore::new())),
            counters: Counters::default(),
        }
    }

    pub fn with_chain_store(mut self, chains: Arc<dyn ChainInstanceStore>) -> Self {
        self.chains = chains;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn PortNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_name_mapper(mut self, names: Arc<dyn NameMapper>) -> Self {
        self.names = names;
        self
    }

    pub fn with_ha_ip_store(mut self, store: Arc<dyn HaIpStore>) -> Self {
        self.ha_ip = HaIpTracker::new(store);
        self
    }

    pub fn config(&self) -> &MappingConfig {
        &self.config
    }

    pub fn stats(&self) -> MappingOrchStats {
        self.counters.snapshot()
    }

    pub fn chain_store(&self) -> &Arc<dyn ChainInstanceStore> {
        &self.chains
    }

    pub fn ha_ip(&self) -> &HaIpTracker {
        &self.ha_ip
    }

    /// Fabric tenant owning the object derived from `obj`.
    pub fn owner_of<T: Scoped + ?Sized>(&self, obj: &T) -> String {
        if obj.shared() {
            self.config.common_tenant.clone()
        } else {
            self.names.tenant(obj.tenant_id())
        }
    }

    /// Fabric name of a policy object.
    pub(crate) fn name(&self, id: &str) -> String {
        self.names.object(id)
    }

    /// Commits the plan's transaction, then applies its chain changes and
    /// notifications. Nothing is applied if the fabric rejects the batch.
    pub(crate) fn commit(
        &self,
        plan: HookPlan,
        category: AuditCategory,
        object_type: &str,
        object_id: &str,
        tenant: &str,
    ) -> MappingResult<()> {
        if plan.is_noop() {
            debug!(object_type, object_id, "Nothing to change on the fabric");
            return Ok(());
        }

        let label = plan.txn.label().to_string();
        let op_count = plan.txn.len() as u64;
        let op_names: Vec<&'static str> = plan.txn.ops().iter().map(|op| op.name()).collect();

        if !plan.txn.is_empty() {
            if let Err(e) = self.fabric.commit(plan.txn) {
                Counters::bump(&self.counters.fabric_failures);
                warn!(label = %label, error = %e, "Fabric rejected transaction");
                audit_log!(AuditRecord::fabric_failed(
                    label.as_str(),
                    AuditObject::new(object_type, object_id, tenant),
                    &e
                ));
                return Err(e.into());
            }
            Counters::bump(&self.counters.transactions_committed);
            self.counters
                .fabric_ops_issued
                .fetch_add(op_count, Ordering::Relaxed);
        }

        let mut chain_ids = BTreeSet::new();
        for change in plan.chain_changes {
            match &change {
                ChainChange::Create(sci) => {
                    Counters::bump(&self.counters.chains_created);
                    chain_ids.insert(sci.id.clone());
                }
                ChainChange::Update(sci) => {
                    Counters::bump(&self.counters.chains_updated);
                    chain_ids.insert(sci.id.clone());
                }
                ChainChange::Delete(id) => {
                    Counters::bump(&self.counters.chains_deleted);
                    chain_ids.insert(id.clone());
                }
            }
            self.chains.apply(change);
        }

        for port in &plan.notify {
            debug!(port_id = %port.id, "Notifying port update");
            self.notifier.port_update(port);
        }

        audit_log!(AuditRecord::committed(
            category,
            label,
            AuditObject::new(object_type, object_id, tenant)
        )
        .with_details(serde_json::json!({
            "fabric_ops": op_names,
            "chain_instances": chain_ids,
            "notified_ports": plan.notify.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(),
        })));
        Ok(())
    }
}
