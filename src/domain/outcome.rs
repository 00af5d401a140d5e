use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::actor::ActorRecord;
use super::event::{ActionEvent, EventId, SCHEMA_VERSION};
use super::ids::GuildId;
use super::policy::GuardKind;

/// Why an actor was exempt from counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExemptReason {
    /// Actor is on the bypass list.
    Bypass,
    /// Actor holds a configured moderator role.
    ModeratorRole,
    /// Actor is the guild owner or carries the administrator permission.
    Privileged,
}

/// Result of running one action through the rate evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub exempt: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exempt_reason: Option<ExemptReason>,
    /// Window count after this action, 0 when exempt.
    pub count: u64,
    pub threshold: u32,
    pub breached: bool,
}

impl Evaluation {
    pub fn exempt(reason: ExemptReason, threshold: u32) -> Self {
        Evaluation {
            exempt: true,
            exempt_reason: Some(reason),
            count: 0,
            threshold,
            breached: false,
        }
    }

    /// Strictly-greater comparison: the threshold itself is still allowed.
    pub fn counted(count: u64, threshold: u32) -> Self {
        Evaluation {
            exempt: false,
            exempt_reason: None,
            count,
            threshold,
            breached: count > u64::from(threshold),
        }
    }
}

/// Remediation steps, in escalation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemediationKind {
    Timeout,
    Ban,
}

impl RemediationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RemediationKind::Timeout => "timeout",
            RemediationKind::Ban => "ban",
        }
    }
}

impl fmt::Display for RemediationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the remediation chain managed to do for one breach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationOutcome {
    /// The last step that was tried.
    pub attempted: RemediationKind,
    pub succeeded: bool,
    /// True when the first step failed and a later one ran.
    pub fallback_used: bool,
}

/// Terminal state of one action after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GuardStatus {
    /// Guard disabled or absent; nothing was done.
    Disabled,
    /// Actor exempt; counter untouched.
    Exempt,
    /// Counted, still at or under threshold.
    Counted,
    /// Counted and over threshold.
    Breached,
}

impl GuardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GuardStatus::Disabled => "disabled",
            GuardStatus::Exempt => "exempt",
            GuardStatus::Counted => "counted",
            GuardStatus::Breached => "breached",
        }
    }
}

impl fmt::Display for GuardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full record of one dispatched action, returned to the caller and
/// suitable for audit storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardReport {
    pub schema_version: String,
    pub event_id: EventId,
    pub guild_id: GuildId,
    pub guard: GuardKind,
    /// Action subtype, e.g. "roleDelete".
    pub subtype: String,
    pub status: GuardStatus,
    pub actor: ActorRecord,
    pub count: u64,
    pub threshold: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<RemediationOutcome>,
    /// Version of the policy snapshot the event was evaluated under.
    pub policy_version: String,
    pub processed_at: DateTime<Utc>,
}

impl GuardReport {
    /// Report for an event whose guard was disabled. Carries an
    /// unattributed actor because attribution never ran.
    pub fn disabled(event: &ActionEvent, policy_version: &str) -> Self {
        GuardReport {
            schema_version: SCHEMA_VERSION.to_string(),
            event_id: event.event_id.clone(),
            guild_id: event.guild_id.clone(),
            guard: event.kind.guard(),
            subtype: event.kind.subtype().to_string(),
            status: GuardStatus::Disabled,
            actor: ActorRecord::unknown(),
            count: 0,
            threshold: 0,
            remediation: None,
            policy_version: policy_version.to_string(),
            processed_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counted_breaches_only_above_threshold() {
        assert!(!Evaluation::counted(2, 2).breached);
        assert!(Evaluation::counted(3, 2).breached);
        assert!(!Evaluation::counted(1, 2).breached);
    }

    #[test]
    fn test_exempt_evaluation_never_breaches() {
        let eval = Evaluation::exempt(ExemptReason::Bypass, 3);
        assert!(eval.exempt);
        assert_eq!(eval.count, 0);
        assert!(!eval.breached);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&GuardStatus::Breached).unwrap();
        assert_eq!(json, "\"breached\"");
        let parsed: GuardStatus = serde_json::from_str("\"counted\"").unwrap();
        assert_eq!(parsed, GuardStatus::Counted);
    }

    #[test]
    fn test_remediation_kind_display() {
        assert_eq!(RemediationKind::Timeout.to_string(), "timeout");
        assert_eq!(RemediationKind::Ban.to_string(), "ban");
    }
}
