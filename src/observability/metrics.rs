use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::domain::{Confidence, GuardStatus, RemediationOutcome};

/// Metrics registry for the application.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Total action events dispatched
    pub events_total: AtomicU64,

    /// Events by terminal status
    pub events_disabled: AtomicU64,
    pub events_exempt: AtomicU64,
    pub events_counted: AtomicU64,
    pub events_breached: AtomicU64,

    /// Dispatch latency buckets (microseconds)
    pub latency_under_1ms: AtomicU64,
    pub latency_1_5ms: AtomicU64,
    pub latency_5_10ms: AtomicU64,
    pub latency_10_50ms: AtomicU64,
    pub latency_50_100ms: AtomicU64,
    pub latency_over_100ms: AtomicU64,

    /// Attribution outcomes
    pub attributions_exact: AtomicU64,
    pub attributions_probable: AtomicU64,
    pub attributions_unknown: AtomicU64,

    /// Remediation chain runs
    pub remediations_total: AtomicU64,
    pub remediation_failures: AtomicU64,
    pub remediation_fallbacks: AtomicU64,

    /// Resource recreation attempts
    pub recreates_total: AtomicU64,
    pub recreate_failures: AtomicU64,

    /// Notice deliveries
    pub notices_total: AtomicU64,
    pub notice_failures: AtomicU64,

    /// Policy document replacements
    pub policy_replaces_total: AtomicU64,
    pub policy_replace_errors: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        MetricsRegistry::default()
    }

    /// Record a dispatched event by terminal status.
    pub fn record_status(&self, status: &GuardStatus) {
        self.events_total.fetch_add(1, Ordering::Relaxed);

        match status {
            GuardStatus::Disabled => {
                self.events_disabled.fetch_add(1, Ordering::Relaxed);
            }
            GuardStatus::Exempt => {
                self.events_exempt.fetch_add(1, Ordering::Relaxed);
            }
            GuardStatus::Counted => {
                self.events_counted.fetch_add(1, Ordering::Relaxed);
            }
            GuardStatus::Breached => {
                self.events_breached.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record dispatch latency.
    pub fn record_latency(&self, start: Instant) {
        let micros = start.elapsed().as_micros() as u64;

        if micros < 1000 {
            self.latency_under_1ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 5000 {
            self.latency_1_5ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 10000 {
            self.latency_5_10ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 50000 {
            self.latency_10_50ms.fetch_add(1, Ordering::Relaxed);
        } else if micros < 100000 {
            self.latency_50_100ms.fetch_add(1, Ordering::Relaxed);
        } else {
            self.latency_over_100ms.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record an attribution outcome.
    pub fn record_attribution(&self, confidence: &Confidence) {
        match confidence {
            Confidence::Exact => {
                self.attributions_exact.fetch_add(1, Ordering::Relaxed);
            }
            Confidence::Probable => {
                self.attributions_probable.fetch_add(1, Ordering::Relaxed);
            }
            Confidence::Unknown => {
                self.attributions_unknown.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Record one remediation chain run.
    pub fn record_remediation(&self, outcome: &RemediationOutcome) {
        self.remediations_total.fetch_add(1, Ordering::Relaxed);
        if !outcome.succeeded {
            self.remediation_failures.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.fallback_used {
            self.remediation_fallbacks.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a recreate attempt.
    pub fn record_recreate(&self, success: bool) {
        self.recreates_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.recreate_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a notice delivery.
    pub fn record_notice(&self, success: bool) {
        self.notices_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.notice_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a policy replacement.
    pub fn record_policy_replace(&self, success: bool) {
        self.policy_replaces_total.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.policy_replace_errors.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP guardr_events_total Total number of dispatched action events
# TYPE guardr_events_total counter
guardr_events_total {}

# HELP guardr_events Dispatched events by terminal status
# TYPE guardr_events counter
guardr_events{{status="disabled"}} {}
guardr_events{{status="exempt"}} {}
guardr_events{{status="counted"}} {}
guardr_events{{status="breached"}} {}

# HELP guardr_dispatch_latency_bucket Dispatch latency histogram
# TYPE guardr_dispatch_latency_bucket counter
guardr_dispatch_latency_bucket{{le="0.001"}} {}
guardr_dispatch_latency_bucket{{le="0.005"}} {}
guardr_dispatch_latency_bucket{{le="0.01"}} {}
guardr_dispatch_latency_bucket{{le="0.05"}} {}
guardr_dispatch_latency_bucket{{le="0.1"}} {}
guardr_dispatch_latency_bucket{{le="+Inf"}} {}

# HELP guardr_attributions Attribution outcomes by confidence
# TYPE guardr_attributions counter
guardr_attributions{{confidence="exact"}} {}
guardr_attributions{{confidence="probable"}} {}
guardr_attributions{{confidence="unknown"}} {}

# HELP guardr_remediations_total Remediation chain runs
# TYPE guardr_remediations_total counter
guardr_remediations_total {}

# HELP guardr_remediation_failures_total Remediation chains that fully failed
# TYPE guardr_remediation_failures_total counter
guardr_remediation_failures_total {}

# HELP guardr_remediation_fallbacks_total Remediation runs that needed a fallback step
# TYPE guardr_remediation_fallbacks_total counter
guardr_remediation_fallbacks_total {}

# HELP guardr_recreates_total Resource recreation attempts
# TYPE guardr_recreates_total counter
guardr_recreates_total {}

# HELP guardr_recreate_failures_total Failed resource recreations
# TYPE guardr_recreate_failures_total counter
guardr_recreate_failures_total {}

# HELP guardr_notices_total Notice deliveries
# TYPE guardr_notices_total counter
guardr_notices_total {}

# HELP guardr_notice_failures_total Failed notice deliveries
# TYPE guardr_notice_failures_total counter
guardr_notice_failures_total {}

# HELP guardr_policy_replaces_total Policy document replacements
# TYPE guardr_policy_replaces_total counter
guardr_policy_replaces_total {}

# HELP guardr_policy_replace_errors_total Rejected policy replacements
# TYPE guardr_policy_replace_errors_total counter
guardr_policy_replace_errors_total {}
"#,
            self.events_total.load(Ordering::Relaxed),
            self.events_disabled.load(Ordering::Relaxed),
            self.events_exempt.load(Ordering::Relaxed),
            self.events_counted.load(Ordering::Relaxed),
            self.events_breached.load(Ordering::Relaxed),
            self.latency_under_1ms.load(Ordering::Relaxed),
            self.latency_1_5ms.load(Ordering::Relaxed),
            self.latency_5_10ms.load(Ordering::Relaxed),
            self.latency_10_50ms.load(Ordering::Relaxed),
            self.latency_50_100ms.load(Ordering::Relaxed),
            self.latency_over_100ms.load(Ordering::Relaxed),
            self.attributions_exact.load(Ordering::Relaxed),
            self.attributions_probable.load(Ordering::Relaxed),
            self.attributions_unknown.load(Ordering::Relaxed),
            self.remediations_total.load(Ordering::Relaxed),
            self.remediation_failures.load(Ordering::Relaxed),
            self.remediation_fallbacks.load(Ordering::Relaxed),
            self.recreates_total.load(Ordering::Relaxed),
            self.recreate_failures.load(Ordering::Relaxed),
            self.notices_total.load(Ordering::Relaxed),
            self.notice_failures.load(Ordering::Relaxed),
            self.policy_replaces_total.load(Ordering::Relaxed),
            self.policy_replace_errors.load(Ordering::Relaxed),
        )
    }
}

/// Guard for timing operations.
pub struct TimingGuard<'a> {
    registry: &'a MetricsRegistry,
    start: Instant,
}

impl<'a> TimingGuard<'a> {
    pub fn new(registry: &'a MetricsRegistry) -> Self {
        TimingGuard {
            registry,
            start: Instant::now(),
        }
    }
}

impl<'a> Drop for TimingGuard<'a> {
    fn drop(&mut self) {
        self.registry.record_latency(self.start);
    }
}
