//! Dispatch: run one observed action through snapshot, attribution,
//! evaluation, remediation and notification.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::attribution::ActorResolver;
use crate::domain::event::SCHEMA_VERSION;
use crate::domain::{
    ActionEvent, ActorRecord, EventId, GuardNotice, GuardReport, GuardStatus, ProtectionPolicy,
    RemediationOutcome, TargetId,
};
use crate::evaluator::PolicyEvaluator;
use crate::observability::{MetricsRegistry, TimingGuard};
use crate::platform::NotificationSink;
use crate::remediation::{Escalation, RemediationEngine};
use crate::store::ConfigStore;

/// Front door of the engine: one call per observed action.
///
/// Every event is evaluated against a single policy snapshot taken at
/// entry, so a concurrent replace never splits one event across two
/// documents. Disabled guards return before any platform call is made.
pub struct GuardDispatcher {
    store: Arc<ConfigStore>,
    resolver: ActorResolver,
    evaluator: PolicyEvaluator,
    remediation: RemediationEngine,
    sink: Arc<dyn NotificationSink>,
    metrics: Arc<MetricsRegistry>,
    /// When false the engine observes and notifies but never escalates.
    enforce: bool,
}

impl GuardDispatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<ConfigStore>,
        resolver: ActorResolver,
        evaluator: PolicyEvaluator,
        remediation: RemediationEngine,
        sink: Arc<dyn NotificationSink>,
        metrics: Arc<MetricsRegistry>,
        enforce: bool,
    ) -> Self {
        GuardDispatcher {
            store,
            resolver,
            evaluator,
            remediation,
            sink,
            metrics,
            enforce,
        }
    }

    pub async fn dispatch(&self, event: ActionEvent) -> GuardReport {
        let _timing = TimingGuard::new(&self.metrics);

        let policy = self.store.current();
        let guard = event.kind.guard();

        if !policy.guard_enabled(guard) {
            debug!(
                event_id = %event.event_id.0,
                guild_id = %event.guild_id,
                guard = %guard,
                subtype = event.kind.subtype(),
                "guard disabled, ignoring action"
            );
            let report = GuardReport::disabled(&event, &policy.version);
            self.metrics.record_status(&report.status);
            return report;
        }

        let actor = self.resolver.resolve(&event).await;
        self.metrics.record_attribution(&actor.confidence);

        let eval = self.evaluator.evaluate(&policy, &event, &actor).await;

        if eval.exempt {
            debug!(
                event_id = %event.event_id.0,
                guild_id = %event.guild_id,
                guard = %guard,
                actor = actor.counter_actor(),
                reason = ?eval.exempt_reason,
                "exempt actor, action not counted"
            );
            let report = GuardReport {
                schema_version: SCHEMA_VERSION.to_string(),
                event_id: event.event_id.clone(),
                guild_id: event.guild_id.clone(),
                guard,
                subtype: event.kind.subtype().to_string(),
                status: GuardStatus::Exempt,
                actor,
                count: 0,
                threshold: eval.threshold,
                remediation: None,
                policy_version: policy.version.clone(),
                processed_at: Utc::now(),
            };
            self.metrics.record_status(&report.status);
            return report;
        }

        let status = if eval.breached {
            GuardStatus::Breached
        } else {
            GuardStatus::Counted
        };

        let mut remediation = None;
        let mut recreated = None;

        if eval.breached {
            (remediation, recreated) = self.handle_breach(&policy, &event, &actor).await;
        }

        let notice = GuardNotice {
            schema_version: SCHEMA_VERSION.to_string(),
            notice_id: EventId::new(),
            event_id: event.event_id.clone(),
            guild_id: event.guild_id.clone(),
            guard,
            subtype: event.kind.subtype().to_string(),
            subject_id: event.subject_id.clone(),
            status,
            actor: actor.clone(),
            count: eval.count,
            threshold: eval.threshold,
            remediation: remediation.clone(),
            recreated_target: recreated,
            sink_id: policy.log_sink_id.clone(),
            noted_at: Utc::now(),
        };

        match self.sink.send(&notice).await {
            Ok(()) => self.metrics.record_notice(true),
            Err(e) => {
                warn!(
                    event_id = %event.event_id.0,
                    guild_id = %event.guild_id,
                    error = %e,
                    "notice delivery failed"
                );
                self.metrics.record_notice(false);
            }
        }

        info!(
            event_id = %event.event_id.0,
            guild_id = %event.guild_id,
            guard = %guard,
            subtype = event.kind.subtype(),
            actor = actor.counter_actor(),
            status = %status,
            count = eval.count,
            threshold = eval.threshold,
            "action dispatched"
        );

        let report = GuardReport {
            schema_version: SCHEMA_VERSION.to_string(),
            event_id: event.event_id,
            guild_id: event.guild_id,
            guard,
            subtype: event.kind.subtype().to_string(),
            status,
            actor,
            count: eval.count,
            threshold: eval.threshold,
            remediation,
            policy_version: policy.version.clone(),
            processed_at: Utc::now(),
        };
        self.metrics.record_status(&report.status);
        report
    }

    /// Escalate against the actor and rebuild what was destroyed.
    ///
    /// Both halves are conditional on the master switch and on enforcement
    /// mode; both are best effort, and a breach by an actor nobody could
    /// identify is notified but never escalated.
    async fn handle_breach(
        &self,
        policy: &ProtectionPolicy,
        event: &ActionEvent,
        actor: &ActorRecord,
    ) -> (Option<RemediationOutcome>, Option<TargetId>) {
        let guard = event.kind.guard();

        if !policy.anti_nuke_enabled() {
            debug!(
                guild_id = %event.guild_id,
                guard = %guard,
                "breach without escalation: antiNuke disabled"
            );
            return (None, None);
        }

        if !self.enforce {
            info!(
                guild_id = %event.guild_id,
                guard = %guard,
                actor = actor.counter_actor(),
                "breach in observe mode, skipping enforcement"
            );
            return (None, None);
        }

        let remediation = match &actor.actor_id {
            Some(actor_id) => {
                let escalation = Escalation {
                    guild_id: event.guild_id.clone(),
                    actor_id: actor_id.clone(),
                    timeout_seconds: policy.timeout_seconds_for(guard),
                    reason: format!("{} spike", event.kind.subtype()),
                };
                let outcome = self.remediation.escalate(&escalation).await;
                self.metrics.record_remediation(&outcome);
                Some(outcome)
            }
            None => {
                warn!(
                    guild_id = %event.guild_id,
                    guard = %guard,
                    subtype = event.kind.subtype(),
                    "breach by unattributed actor, cannot escalate"
                );
                None
            }
        };

        let recreated = if event.kind.is_destructive_delete() && policy.recreate_on_delete(guard) {
            let replacement = self.remediation.recreate(&event.guild_id, &event.kind).await;
            self.metrics.record_recreate(replacement.is_some());
            replacement
        } else {
            None
        };

        (remediation, recreated)
    }
}
