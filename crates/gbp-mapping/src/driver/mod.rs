//! Lifecycle hook orchestration.
//!
//! [`MappingOrch`] receives one [`HookEvent`] per policy change, works out
//! which fabric objects must exist, and commits the difference as a single
//! transaction. Chain store changes and port notifications follow only a
//! successful commit.
//!
//! # Architecture
//!
//! ```text
//! policy framework ── HookEvent ──> MappingOrch::dispatch
//!                                        │
//!                     ┌──────────────────┼──────────────────┐
//!                     ▼                  ▼                  ▼
//!                  resolver        ShadowTopology      HaIpTracker
//!                     │                  │
//!                     └──── Transaction ─┴──> FabricController
//!                                        │
//!                          ChainInstanceStore, PortNotifier
//! ```

mod chains;
mod contracts;
mod details;
mod groups;
mod hooks;
mod orch;
mod routing;

pub use details::{GbpDetails, DEVICE_PREFIX};
pub use hooks::{HookContext, HookEvent, Phase};
pub use orch::{MappingOrch, MappingOrchStats};
