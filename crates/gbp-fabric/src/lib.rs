//! Fabric-controller port for the group-policy mapping core.
//!
//! The mapping core never talks to the controller directly. It builds a
//! [`Transaction`] of typed [`FabricOp`]s per lifecycle hook and hands it to
//! a [`FabricController`] implementation.
//!
//! # Modules
//!
//! - [`ops`]: the idempotent ensure/delete calls
//! - [`transaction`]: ordered batches of calls
//! - [`controller`]: the controller trait
//! - [`recording`]: call-log controller for dry runs and tests
//! - [`logging`]: tracing decorator for any controller
//! - [`error`]: error types

pub mod controller;
pub mod error;
pub mod logging;
pub mod ops;
pub mod recording;
pub mod transaction;

pub use controller::FabricController;
pub use error::{FabricError, FabricResult};
pub use logging::LoggingFabric;
pub use ops::{FabricOp, FilterEntry, SubjectDirection};
pub use recording::RecordingFabric;
pub use transaction::Transaction;
