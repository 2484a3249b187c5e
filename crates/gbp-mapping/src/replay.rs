//! Event replay over the in-memory policy store.
//!
//! Plays the part of the policy framework: every object change runs the
//! pre hook, persists the (possibly normalised) object, then runs the post
//! hook. A failing post hook rolls the store back, as the framework would
//! abort its transaction.

use std::collections::BTreeSet;
use std::sync::Arc;

use gbp_fabric::FabricController;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::MappingConfig;
use crate::driver::{GbpDetails, HookContext, HookEvent, MappingOrch, Phase};
use crate::error::{MappingError, MappingResult};
use crate::ha_ip::{IpOwnerInfo, MemoryHaIpStore};
use crate::notifier::PortNotifier;
use crate::policy::{EntityKind, PolicyObject, PolicyStore, Port, Subnet};

const DEFAULT_TENANT: &str = "admin";

/// One entry of a replay file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    Create {
        #[serde(default)]
        tenant_id: Option<String>,
        object: PolicyObject,
    },
    Update {
        #[serde(default)]
        tenant_id: Option<String>,
        object: PolicyObject,
    },
    Delete {
        #[serde(default)]
        tenant_id: Option<String>,
        kind: EntityKind,
        id: String,
    },
    PortUpdate {
        port: Port,
    },
    PortDelete {
        port_id: String,
    },
    SubnetAdded {
        subnet: Subnet,
    },
    SubnetChanged {
        original: Subnet,
        subnet: Subnet,
    },
    IpOwner {
        info: IpOwnerInfo,
    },
    GbpDetails {
        device: String,
        #[serde(default)]
        host: String,
    },
}

impl ReplayEvent {
    /// Parses a JSON array of events.
    pub fn parse_all(content: &str) -> MappingResult<Vec<ReplayEvent>> {
        serde_json::from_str(content)
            .map_err(|e| MappingError::InvalidEvent(format!("failed to parse replay events: {}", e)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReplayEvent::Create { .. } => "create",
            ReplayEvent::Update { .. } => "update",
            ReplayEvent::Delete { .. } => "delete",
            ReplayEvent::PortUpdate { .. } => "port_update",
            ReplayEvent::PortDelete { .. } => "port_delete",
            ReplayEvent::SubnetAdded { .. } => "subnet_added",
            ReplayEvent::SubnetChanged { .. } => "subnet_changed",
            ReplayEvent::IpOwner { .. } => "ip_owner",
            ReplayEvent::GbpDetails { .. } => "gbp_details",
        }
    }
}

/// What an applied event produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReplayOutcome {
    Applied,
    Details(GbpDetails),
    Owners { ports: BTreeSet<String> },
}

/// Drives a [`MappingOrch`] the way the policy framework would.
pub struct Replayer {
    orch: MappingOrch,
    policy: PolicyStore,
    ha_ip: Arc<MemoryHaIpStore>,
}

impl std::fmt::Debug for Replayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replayer")
            .field("orch", &self.orch)
            .finish_non_exhaustive()
    }
}

impl Replayer {
    pub fn new(config: MappingConfig, fabric: Arc<dyn FabricController>) -> Self {
        let ha_ip = Arc::new(MemoryHaIpStore::new());
        let orch = MappingOrch::new(config, fabric).with_ha_ip_store(ha_ip.clone());
        Self {
            orch,
            policy: PolicyStore::new(),
            ha_ip,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn PortNotifier>) -> Self {
        self.orch = self.orch.with_notifier(notifier);
        self
    }

    pub fn orch(&self) -> &MappingOrch {
        &self.orch
    }

    pub fn policy(&self) -> &PolicyStore {
        &self.policy
    }

    fn hook(&self, tenant_id: &str, event: &HookEvent) -> MappingResult<Option<PolicyObject>> {
        let ctx = HookContext::new(tenant_id, &self.policy);
        self.orch.dispatch(&ctx, event)
    }

    pub fn apply(&mut self, event: ReplayEvent) -> MappingResult<ReplayOutcome> {
        debug!(event = event.name(), "Replaying event");
        match event {
            ReplayEvent::Create { tenant_id, object } => {
                let tenant = tenant_id.as_deref().unwrap_or(DEFAULT_TENANT).to_string();
                self.create(&tenant, object)?;
            }
            ReplayEvent::Update { tenant_id, object } => {
                let tenant = tenant_id.as_deref().unwrap_or(DEFAULT_TENANT).to_string();
                self.update(&tenant, object)?;
            }
            ReplayEvent::Delete {
                tenant_id,
                kind,
                id,
            } => {
                let tenant = tenant_id.as_deref().unwrap_or(DEFAULT_TENANT).to_string();
                self.delete(&tenant, kind, &id)?;
            }
            ReplayEvent::PortUpdate { port } => {
                self.ha_ip.register_port(port.id.clone(), port.network_id.clone());
                self.policy.upsert_port(port);
            }
            ReplayEvent::PortDelete { port_id } => {
                if let Some(port) = self.policy.remove_port(&port_id) {
                    self.orch.port_deleted(&port)?;
                }
            }
            ReplayEvent::SubnetAdded { subnet } => {
                let ctx = HookContext::new(DEFAULT_TENANT, &self.policy);
                self.orch.process_subnet_added(&ctx, &subnet)?;
            }
            ReplayEvent::SubnetChanged { original, subnet } => {
                let ctx = HookContext::new(DEFAULT_TENANT, &self.policy);
                self.orch.process_subnet_changed(&ctx, &original, &subnet)?;
            }
            ReplayEvent::IpOwner { info } => {
                let ctx = HookContext::new(DEFAULT_TENANT, &self.policy);
                let ports = self.orch.update_ip_owner(&ctx, &info)?;
                return Ok(ReplayOutcome::Owners { ports });
            }
            ReplayEvent::GbpDetails { device, host } => {
                let ctx = HookContext::new(DEFAULT_TENANT, &self.policy);
                let details = self.orch.get_gbp_details(&ctx, &device, &host)?;
                return Ok(ReplayOutcome::Details(details));
            }
        }
        Ok(ReplayOutcome::Applied)
    }

    fn create(&mut self, tenant: &str, object: PolicyObject) -> MappingResult<()> {
        let object = self
            .hook(tenant, &HookEvent::new(Phase::PreCreate, object.clone()))?
            .unwrap_or(object);
        self.policy.upsert(object.clone());
        if let Err(e) = self.hook(tenant, &HookEvent::new(Phase::PostCreate, object.clone())) {
            warn!(kind = %object.kind(), id = %object.id(), error = %e, "Create aborted");
            self.policy.remove(object.kind(), object.id());
            return Err(e);
        }
        info!(kind = %object.kind(), id = %object.id(), "Created");
        Ok(())
    }

    fn update(&mut self, tenant: &str, object: PolicyObject) -> MappingResult<()> {
        let original = self
            .policy
            .get(object.kind(), object.id())
            .ok_or_else(|| MappingError::not_found(object.kind().as_str(), object.id()))?;
        let pre = HookEvent::new(Phase::PreUpdate, object.clone()).with_original(original.clone());
        let object = self.hook(tenant, &pre)?.unwrap_or(object);

        self.policy.upsert(object.clone());
        let post = HookEvent::new(Phase::PostUpdate, object.clone()).with_original(original.clone());
        if let Err(e) = self.hook(tenant, &post) {
            warn!(kind = %object.kind(), id = %object.id(), error = %e, "Update aborted");
            self.policy.upsert(original);
            return Err(e);
        }
        info!(kind = %object.kind(), id = %object.id(), "Updated");
        Ok(())
    }

    fn delete(&mut self, tenant: &str, kind: EntityKind, id: &str) -> MappingResult<()> {
        let object = self
            .policy
            .get(kind, id)
            .ok_or_else(|| MappingError::not_found(kind.as_str(), id))?;
        self.hook(tenant, &HookEvent::new(Phase::PreDelete, object.clone()))?;
        self.policy.remove(kind, id);
        if let Err(e) = self.hook(tenant, &HookEvent::new(Phase::PostDelete, object.clone())) {
            warn!(%kind, id, error = %e, "Delete aborted");
            self.policy.upsert(object);
            return Err(e);
        }
        info!(%kind, id, "Deleted");
        Ok(())
    }
}
