//! Integration test infrastructure for the group-policy mapping core
//!
//! Provides:
//! - A harness driving the orchestrator through full hook lifecycles
//! - Fixtures for policy objects and the external segment catalog
//! - Fabric call-log verification helpers

pub mod fixtures;
mod harness;
mod verification;

pub use fixtures::*;
pub use harness::{init_test_logging, MappingHarness};
pub use verification::*;
