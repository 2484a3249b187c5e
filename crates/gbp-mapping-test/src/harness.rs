//! Orchestrator harness over a recording fabric and notifier.

use std::collections::BTreeSet;
use std::sync::{Arc, Once};

use gbp_fabric::{FabricOp, RecordingFabric};
use gbp_mapping::ha_ip::IpOwnerInfo;
use gbp_mapping::notifier::RecordingNotifier;
use gbp_mapping::policy::{EntityKind, PolicyObject, PolicyStore, Port, ServiceChainInstance, Subnet};
use gbp_mapping::{
    GbpDetails, MappingConfig, MappingError, MappingOrch, MappingResult, ReplayEvent, ReplayOutcome,
    Replayer,
};

use crate::fixtures::TENANT;
use crate::verification::CallVerifier;

static LOGGING: Once = Once::new();

/// Routes mapping-core logs to the test writer; `RUST_LOG` selects the level.
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Drives lifecycle hooks the way the policy framework does and records
/// what reaches the fabric and the agents.
pub struct MappingHarness {
    pub fabric: Arc<RecordingFabric>,
    pub notifier: Arc<RecordingNotifier>,
    replayer: Replayer,
}

impl Default for MappingHarness {
    fn default() -> Self {
        Self::new(MappingConfig::default())
    }
}

impl MappingHarness {
    pub fn new(config: MappingConfig) -> Self {
        init_test_logging();
        let fabric = Arc::new(RecordingFabric::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let replayer = Replayer::new(config, fabric.clone()).with_notifier(notifier.clone());
        Self {
            fabric,
            notifier,
            replayer,
        }
    }

    fn apply(&mut self, event: ReplayEvent) -> MappingResult<ReplayOutcome> {
        self.replayer.apply(event)
    }

    pub fn create(&mut self, object: impl Into<PolicyObject>) -> MappingResult<()> {
        self.apply(ReplayEvent::Create {
            tenant_id: Some(TENANT.to_string()),
            object: object.into(),
        })
        .map(|_| ())
    }

    pub fn update(&mut self, object: impl Into<PolicyObject>) -> MappingResult<()> {
        self.apply(ReplayEvent::Update {
            tenant_id: Some(TENANT.to_string()),
            object: object.into(),
        })
        .map(|_| ())
    }

    pub fn delete(&mut self, kind: EntityKind, id: &str) -> MappingResult<()> {
        self.apply(ReplayEvent::Delete {
            tenant_id: Some(TENANT.to_string()),
            kind,
            id: id.to_string(),
        })
        .map(|_| ())
    }

    pub fn add_port(&mut self, port: Port) -> MappingResult<()> {
        self.apply(ReplayEvent::PortUpdate { port }).map(|_| ())
    }

    pub fn delete_port(&mut self, port_id: &str) -> MappingResult<()> {
        self.apply(ReplayEvent::PortDelete {
            port_id: port_id.to_string(),
        })
        .map(|_| ())
    }

    pub fn subnet_added(&mut self, subnet: Subnet) -> MappingResult<()> {
        self.apply(ReplayEvent::SubnetAdded { subnet }).map(|_| ())
    }

    pub fn subnet_changed(&mut self, original: Subnet, subnet: Subnet) -> MappingResult<()> {
        self.apply(ReplayEvent::SubnetChanged { original, subnet })
            .map(|_| ())
    }

    pub fn details(&mut self, device: &str) -> MappingResult<GbpDetails> {
        match self.apply(ReplayEvent::GbpDetails {
            device: device.to_string(),
            host: "h1".to_string(),
        })? {
            ReplayOutcome::Details(details) => Ok(details),
            other => Err(MappingError::InvalidEvent(format!("unexpected outcome {:?}", other))),
        }
    }

    pub fn ip_owner(&mut self, info: IpOwnerInfo) -> MappingResult<BTreeSet<String>> {
        match self.apply(ReplayEvent::IpOwner { info })? {
            ReplayOutcome::Owners { ports } => Ok(ports),
            other => Err(MappingError::InvalidEvent(format!("unexpected outcome {:?}", other))),
        }
    }

    pub fn orch(&self) -> &MappingOrch {
        self.replayer.orch()
    }

    pub fn policy(&self) -> &PolicyStore {
        self.replayer.policy()
    }

    pub fn chains(&self) -> Vec<ServiceChainInstance> {
        self.orch().chain_store().instances()
    }

    pub fn calls(&self) -> Vec<FabricOp> {
        self.fabric.calls()
    }

    pub fn verifier(&self) -> CallVerifier {
        CallVerifier::new(self.fabric.calls())
    }

    /// Forgets recorded calls and notifications, keeping all state.
    pub fn reset_recording(&self) {
        self.fabric.clear();
        self.notifier.clear();
    }
}
