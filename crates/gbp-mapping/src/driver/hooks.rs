//! Lifecycle hook dispatch.
//!
//! The policy framework calls [`MappingOrch::dispatch`] for every
//! (phase, object) pair. Pre-phases validate and may hand back a normalised
//! object; post-phases project the change onto the fabric.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::orch::{Counters, MappingOrch};
use crate::audit::{AuditObject, AuditRecord};
use crate::audit_log;
use crate::error::{MappingError, MappingResult};
use crate::policy::{PolicyObject, PolicyReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    PreCreate,
    PostCreate,
    PreUpdate,
    PostUpdate,
    PreDelete,
    PostDelete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PreCreate => "pre_create",
            Phase::PostCreate => "post_create",
            Phase::PreUpdate => "pre_update",
            Phase::PostUpdate => "post_update",
            Phase::PreDelete => "pre_delete",
            Phase::PostDelete => "post_delete",
        }
    }

    pub fn is_pre(&self) -> bool {
        matches!(self, Phase::PreCreate | Phase::PreUpdate | Phase::PreDelete)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hook invocation. Updates carry the previous value in `original`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookEvent {
    pub phase: Phase,
    pub current: PolicyObject,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<PolicyObject>,
}

impl HookEvent {
    pub fn new(phase: Phase, current: PolicyObject) -> Self {
        Self {
            phase,
            current,
            original: None,
        }
    }

    pub fn with_original(mut self, original: PolicyObject) -> Self {
        self.original = Some(original);
        self
    }
}

/// What a hook may look at besides the object itself.
#[derive(Clone, Copy)]
pub struct HookContext<'a> {
    /// Tenant of the request
    pub tenant_id: &'a str,
    pub policy: &'a dyn PolicyReader,
}

impl<'a> HookContext<'a> {
    pub fn new(tenant_id: &'a str, policy: &'a dyn PolicyReader) -> Self {
        Self { tenant_id, policy }
    }
}

impl fmt::Debug for HookContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookContext")
            .field("tenant_id", &self.tenant_id)
            .finish_non_exhaustive()
    }
}

macro_rules! original {
    ($event:expr, $variant:ident) => {
        match &$event.original {
            Some(PolicyObject::$variant(o)) => o,
            _ => {
                return Err(MappingError::InvalidEvent(format!(
                    "{} {} without previous {}",
                    $event.phase,
                    $event.current.id(),
                    $event.current.kind()
                )))
            }
        }
    };
}

impl MappingOrch {
    /// Runs the hook for `event`.
    ///
    /// Returns the normalised object for pre-phases that rewrite their input,
    /// `None` otherwise.
    #[instrument(
        skip_all,
        fields(phase = %event.phase, kind = %event.current.kind(), id = %event.current.id())
    )]
    pub fn dispatch(
        &self,
        ctx: &HookContext<'_>,
        event: &HookEvent,
    ) -> MappingResult<Option<PolicyObject>> {
        Counters::bump(&self.counters.hooks_processed);
        let result = self.route(ctx, event);
        if let Err(e) = &result {
            if e.is_user_visible() {
                Counters::bump(&self.counters.policy_rejections);
                audit_log!(AuditRecord::rejected(
                    format!("{}:{}", event.current.kind(), event.phase),
                    AuditObject::new(event.current.kind().as_str(), event.current.id(), ctx.tenant_id),
                    e.type_name(),
                    e
                ));
            }
        }
        result
    }

    fn route(
        &self,
        ctx: &HookContext<'_>,
        event: &HookEvent,
    ) -> MappingResult<Option<PolicyObject>> {
        use PolicyObject as O;

        match (event.phase, &event.current) {
            (Phase::PreCreate | Phase::PreUpdate, O::RoutingContext(rc)) => self
                .validate_routing_context(ctx, rc)
                .map(|rc| Some(O::RoutingContext(rc))),
            (Phase::PostCreate, O::RoutingContext(rc)) => {
                self.routing_context_created(ctx, rc).map(|()| None)
            }
            (Phase::PostUpdate, O::RoutingContext(rc)) => {
                let original = original!(event, RoutingContext);
                self.routing_context_updated(ctx, original, rc).map(|()| None)
            }
            (Phase::PostDelete, O::RoutingContext(rc)) => {
                self.routing_context_deleted(ctx, rc).map(|()| None)
            }

            (Phase::PreCreate | Phase::PreUpdate, O::ExternalSegment(es)) => {
                self.validate_external_segment(es).map(|()| None)
            }
            (Phase::PostUpdate, O::ExternalSegment(es)) => {
                let original = original!(event, ExternalSegment);
                self.external_segment_updated(ctx, original, es).map(|()| None)
            }
            (Phase::PostDelete, O::ExternalSegment(es)) => {
                self.external_segment_deleted(ctx, es).map(|()| None)
            }

            (Phase::PostCreate, O::ExternalPolicy(ep)) => {
                self.external_policy_created(ctx, ep).map(|()| None)
            }
            (Phase::PostUpdate, O::ExternalPolicy(ep)) => {
                let original = original!(event, ExternalPolicy);
                self.external_policy_updated(ctx, original, ep).map(|()| None)
            }
            (Phase::PostDelete, O::ExternalPolicy(ep)) => {
                self.external_policy_deleted(ctx, ep).map(|()| None)
            }

            (Phase::PostCreate, O::BridgeDomain(bd)) => {
                self.bridge_domain_created(ctx, bd).map(|()| None)
            }
            (Phase::PostUpdate, O::BridgeDomain(bd)) => {
                let original = original!(event, BridgeDomain);
                self.bridge_domain_updated(ctx, original, bd).map(|()| None)
            }
            (Phase::PostDelete, O::BridgeDomain(bd)) => {
                self.bridge_domain_deleted(ctx, bd).map(|()| None)
            }

            (Phase::PostCreate, O::EndpointGroup(epg)) => {
                self.endpoint_group_created(ctx, epg).map(|()| None)
            }
            (Phase::PostUpdate, O::EndpointGroup(epg)) => {
                let original = original!(event, EndpointGroup);
                self.endpoint_group_updated(ctx, original, epg).map(|()| None)
            }
            (Phase::PostDelete, O::EndpointGroup(epg)) => {
                self.endpoint_group_deleted(ctx, epg).map(|()| None)
            }

            (Phase::PostCreate, O::Endpoint(ep)) => self.endpoint_created(ctx, ep).map(|()| None),
            (Phase::PostUpdate, O::Endpoint(ep)) => {
                let original = original!(event, Endpoint);
                self.endpoint_updated(ctx, original, ep).map(|()| None)
            }
            (Phase::PostDelete, O::Endpoint(ep)) => self.endpoint_deleted(ctx, ep).map(|()| None),

            (Phase::PreCreate | Phase::PreUpdate, O::PolicyRule(rule)) => {
                self.validate_policy_rule(rule).map(|()| None)
            }
            (Phase::PostCreate, O::PolicyRule(rule)) => {
                self.policy_rule_created(ctx, rule).map(|()| None)
            }
            (Phase::PostUpdate, O::PolicyRule(rule)) => {
                let original = original!(event, PolicyRule);
                self.policy_rule_updated(ctx, original, rule).map(|()| None)
            }
            (Phase::PostDelete, O::PolicyRule(rule)) => {
                self.policy_rule_deleted(ctx, rule).map(|()| None)
            }

            (Phase::PostUpdate, O::PolicyClassifier(pc)) => {
                let original = original!(event, PolicyClassifier);
                self.classifier_updated(ctx, original, pc).map(|()| None)
            }
            (Phase::PostUpdate, O::PolicyAction(action)) => {
                let original = original!(event, PolicyAction);
                self.action_updated(ctx, original, action).map(|()| None)
            }

            (Phase::PostCreate, O::PolicyRuleSet(prs)) => {
                self.rule_set_created(ctx, prs).map(|()| None)
            }
            (Phase::PostUpdate, O::PolicyRuleSet(prs)) => {
                let original = original!(event, PolicyRuleSet);
                self.rule_set_updated(ctx, original, prs).map(|()| None)
            }
            (Phase::PostDelete, O::PolicyRuleSet(prs)) => {
                self.rule_set_deleted(ctx, prs).map(|()| None)
            }

            (Phase::PostUpdate, O::ServiceChainSpec(spec)) => {
                let original = original!(event, ServiceChainSpec);
                self.servicechain_spec_updated(ctx, original, spec).map(|()| None)
            }

            (phase, object) => {
                debug!(%phase, kind = %object.kind(), "No fabric mapping for hook");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MappingConfig;
    use crate::policy::{PolicyStore, RoutingContext};
    use gbp_fabric::RecordingFabric;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    fn rc(id: &str) -> RoutingContext {
        RoutingContext {
            id: id.to_string(),
            tenant_id: "t1".to_string(),
            shared: false,
            external_segments: BTreeMap::new(),
        }
    }

    #[test]
    fn test_update_without_original_is_rejected() {
        let fabric = Arc::new(RecordingFabric::new());
        let orch = MappingOrch::new(MappingConfig::default(), fabric.clone());
        let policy = PolicyStore::new();
        let ctx = HookContext::new("t1", &policy);

        let event = HookEvent::new(Phase::PostUpdate, PolicyObject::RoutingContext(rc("l3p1")));
        let err = orch.dispatch(&ctx, &event).unwrap_err();
        assert_eq!(err.type_name(), "InvalidEvent");
        assert!(fabric.calls().is_empty());
    }

    #[test]
    fn test_unmapped_hooks_are_noops() {
        let fabric = Arc::new(RecordingFabric::new());
        let orch = MappingOrch::new(MappingConfig::default(), fabric.clone());
        let policy = PolicyStore::new();
        let ctx = HookContext::new("t1", &policy);

        let event = HookEvent::new(Phase::PreDelete, PolicyObject::RoutingContext(rc("l3p1")));
        assert_eq!(orch.dispatch(&ctx, &event).unwrap(), None);
        assert!(fabric.calls().is_empty());
        assert_eq!(orch.stats().hooks_processed, 1);
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(Phase::PostCreate.to_string(), "post_create");
        assert!(Phase::PreUpdate.is_pre());
        assert!(!Phase::PostDelete.is_pre());
    }
}
