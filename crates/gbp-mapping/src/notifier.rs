//! Port-update notifications towards data-plane agents.

use crate::policy::Port;
use std::sync::{Mutex, PoisonError};

/// Tells the agent hosting a port to fetch its placement again.
pub trait PortNotifier: Send + Sync {
    fn port_update(&self, port: &Port);
}

/// Drops notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpNotifier;

impl PortNotifier for NoOpNotifier {
    fn port_update(&self, _port: &Port) {}
}

/// Keeps the ids of notified ports, in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    ports: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notified(&self) -> Vec<String> {
        self.ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl PortNotifier for RecordingNotifier {
    fn port_update(&self, port: &Port) {
        self.ports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(port.id.clone());
    }
}
