//! Group-based policy to fabric mapping core.
//!
//! Translates group-policy objects (routing contexts, bridge domains,
//! endpoint groups, policy rule sets, external segments and service chains)
//! into operations on an application-centric fabric controller.
//!
//! # Architecture
//!
//! ```text
//! [policy framework] ── hook ──> [MappingOrch] ── Transaction ──> [FabricController]
//!        │                            │
//!        └── PolicyReader snapshot ───┤── ChainInstanceStore
//!                                     ├── HaIpStore
//!                                     └── PortNotifier ──> [agents]
//! ```
//!
//! # Modules
//!
//! - [`driver`]: lifecycle hooks, agent queries and the orchestrator
//! - [`policy`]: policy object model and the read-only snapshot trait
//! - [`resolver`]: redirect rule and service chain resolution
//! - [`shadow`]: shadow topology of transparent service chains
//! - [`chain`]: service chain instance persistence
//! - [`ha_ip`]: HA address ownership tracking
//! - [`replay`]: drives the orchestrator from a recorded event stream
//! - [`audit`]: audit records and logging setup

pub mod audit;
pub mod chain;
pub mod config;
pub mod driver;
pub mod error;
pub mod ha_ip;
pub mod naming;
pub mod notifier;
pub mod policy;
pub mod replay;
pub mod resolver;
pub mod shadow;

pub use audit::{init_logging, init_logging_pretty, AuditCategory, AuditObject, AuditOutcome, AuditRecord};
pub use config::{MappingConfig, SegmentCatalogEntry};
pub use driver::{GbpDetails, HookContext, HookEvent, MappingOrch, MappingOrchStats, Phase};
pub use error::{MappingError, MappingResult};
pub use replay::{ReplayEvent, ReplayOutcome, Replayer};
