//! Audit trail and logging setup.
//!
//! Every hook that commits to the fabric, every hook rejected by a policy
//! constraint and every transaction the fabric refuses produces one
//! [`AuditRecord`] on the `audit` tracing target, carrying its JSON form so
//! a subscriber can split the trail from operational logs.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

const SOURCE: &str = "MappingOrch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    /// Fabric objects created for a new policy object
    Create,
    Modify,
    Delete,
    /// A policy constraint rejected the request
    Rejected,
    /// HA address ownership moved between ports
    Ownership,
    /// The fabric refused a transaction
    FabricFailure,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::Create => "create",
            AuditCategory::Modify => "modify",
            AuditCategory::Delete => "delete",
            AuditCategory::Rejected => "rejected",
            AuditCategory::Ownership => "ownership",
            AuditCategory::FabricFailure => "fabric_failure",
        }
    }
}

impl fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutcome {
    Success,
    Failure,
    Denied,
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditOutcome::Success => "success",
            AuditOutcome::Failure => "failure",
            AuditOutcome::Denied => "denied",
        })
    }
}

/// The policy object a hook ran for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditObject {
    pub kind: String,
    pub id: String,
    pub tenant: String,
}

impl AuditObject {
    pub fn new(kind: impl Into<String>, id: impl Into<String>, tenant: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            tenant: tenant.into(),
        }
    }
}

impl fmt::Display for AuditObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.kind, self.id, self.tenant)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    pub source: String,
    /// Transaction label or `<kind>:<phase>` for rejected hooks
    pub action: String,
    pub outcome: AuditOutcome,
    pub object: AuditObject,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditRecord {
    fn stamped(
        category: AuditCategory,
        action: impl Into<String>,
        outcome: AuditOutcome,
        object: AuditObject,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            category,
            source: SOURCE.to_string(),
            action: action.into(),
            outcome,
            object,
            details: None,
            error: None,
        }
    }

    /// A hook whose changes reached the fabric.
    pub fn committed(category: AuditCategory, action: impl Into<String>, object: AuditObject) -> Self {
        Self::stamped(category, action, AuditOutcome::Success, object)
    }

    /// A hook refused by a policy constraint before any fabric change.
    pub fn rejected(action: impl Into<String>, object: AuditObject, error_type: &str, error: impl fmt::Display) -> Self {
        let mut record = Self::stamped(AuditCategory::Rejected, action, AuditOutcome::Denied, object);
        record.details = Some(serde_json::json!({ "error_type": error_type }));
        record.error = Some(error.to_string());
        record
    }

    /// A transaction the fabric refused.
    pub fn fabric_failed(action: impl Into<String>, object: AuditObject, error: impl fmt::Display) -> Self {
        let mut record = Self::stamped(AuditCategory::FabricFailure, action, AuditOutcome::Failure, object);
        record.error = Some(error.to_string());
        record
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|e| format!(r#"{{"error":"serialization_failed","message":"{}"}}"#, e))
    }
}

/// Emits an [`AuditRecord`] on the `audit` target: info for successes,
/// warn otherwise.
#[macro_export]
macro_rules! audit_log {
    ($record:expr) => {{
        let record: $crate::audit::AuditRecord = $record;
        if record.outcome == $crate::audit::AuditOutcome::Success {
            tracing::info!(
                target: "audit",
                category = %record.category,
                object = %record.object,
                audit_json = %record.to_json(),
                "AUDIT {} {}",
                record.category,
                record.action
            );
        } else {
            tracing::warn!(
                target: "audit",
                category = %record.category,
                object = %record.object,
                error = record.error.as_deref().unwrap_or(""),
                audit_json = %record.to_json(),
                "AUDIT {} {} {}",
                record.category,
                record.action,
                record.outcome
            );
        }
    }};
}

fn env_filter(log_level: &str) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level))
}

/// Installs a JSON subscriber; `RUST_LOG` overrides `log_level`.
pub fn init_logging(log_level: &str) {
    use tracing_subscriber::{fmt, prelude::*};

    tracing_subscriber::registry()
        .with(env_filter(log_level))
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_target(true),
        )
        .init();
}

/// Human-readable output for interactive replays.
pub fn init_logging_pretty(log_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_level))
        .with_target(false)
        .with_line_number(true)
        .pretty()
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn object() -> AuditObject {
        AuditObject::new("endpoint_group", "ptg1", "t1")
    }

    #[test]
    fn test_committed_record() {
        let record = AuditRecord::committed(AuditCategory::Create, "endpoint_group_created", object());
        assert_eq!(record.outcome, AuditOutcome::Success);
        assert_eq!(record.source, "MappingOrch");
        assert_eq!(record.object.to_string(), "endpoint_group ptg1 (t1)");
    }

    #[test]
    fn test_rejected_record_json() {
        let record = AuditRecord::rejected(
            "external_segment:pre_create",
            AuditObject::new("external_segment", "es1", "t1"),
            "UnsupportedFeature",
            "port address translation is not supported",
        );

        let json = record.to_json();
        assert!(json.contains("\"category\":\"rejected\""));
        assert!(json.contains("\"outcome\":\"denied\""));
        assert!(json.contains("\"error_type\":\"UnsupportedFeature\""));
    }

    #[test]
    fn test_fabric_failure_has_no_details() {
        let record = AuditRecord::fabric_failed("rule_set_deleted", object(), "controller unreachable");
        assert_eq!(record.category, AuditCategory::FabricFailure);
        assert_eq!(record.outcome, AuditOutcome::Failure);
        assert!(!record.to_json().contains("details"));
    }
}
