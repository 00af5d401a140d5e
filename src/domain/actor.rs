use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{TargetId, UserId};

/// Synthetic counter key for actions nobody could be blamed for.
pub const UNKNOWN_ACTOR: &str = "unknown";

/// How firmly an action is pinned on an actor.
///
/// Ordered by increasing certainty so callers can compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// No usable audit entry, or the entry was stale.
    Unknown,
    /// Fresh audit entry whose target does not match the affected resource.
    Probable,
    /// Fresh audit entry naming the affected resource.
    Exact,
}

/// One entry from the platform audit trail.
///
/// The trail is eventually consistent: entries lag the actions they
/// describe, so attribution tolerates a bounded gap between the action
/// and the entry timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    /// Who performed the action according to the platform.
    pub actor_id: UserId,
    /// Resource the entry claims was affected, when the platform records one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<TargetId>,
    pub created_at: DateTime<Utc>,
}

/// Outcome of attributing one action to an actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorRecord {
    /// Resolved perpetrator; `None` when attribution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor_id: Option<UserId>,
    pub confidence: Confidence,
    /// Audit entry the attribution is based on, when one was used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_entry_id: Option<String>,
}

impl ActorRecord {
    pub fn exact(actor_id: UserId, audit_entry_id: String) -> Self {
        ActorRecord {
            actor_id: Some(actor_id),
            confidence: Confidence::Exact,
            audit_entry_id: Some(audit_entry_id),
        }
    }

    pub fn probable(actor_id: UserId, audit_entry_id: String) -> Self {
        ActorRecord {
            actor_id: Some(actor_id),
            confidence: Confidence::Probable,
            audit_entry_id: Some(audit_entry_id),
        }
    }

    pub fn unknown() -> Self {
        ActorRecord {
            actor_id: None,
            confidence: Confidence::Unknown,
            audit_entry_id: None,
        }
    }

    pub fn is_attributed(&self) -> bool {
        self.actor_id.is_some()
    }

    /// Key segment used for rate counting. Unattributed actions share one
    /// synthetic bucket so a burst of them still trips thresholds.
    pub fn counter_actor(&self) -> &str {
        self.actor_id
            .as_ref()
            .map(|id| id.as_str())
            .unwrap_or(UNKNOWN_ACTOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_ordering() {
        assert!(Confidence::Exact > Confidence::Probable);
        assert!(Confidence::Probable > Confidence::Unknown);
    }

    #[test]
    fn test_unknown_record_counts_under_synthetic_actor() {
        let record = ActorRecord::unknown();
        assert!(!record.is_attributed());
        assert_eq!(record.counter_actor(), UNKNOWN_ACTOR);
        assert_eq!(record.audit_entry_id, None);
    }

    #[test]
    fn test_attributed_record_counts_under_actor_id() {
        let record = ActorRecord::exact(UserId::new("U9"), "E1".to_string());
        assert!(record.is_attributed());
        assert_eq!(record.counter_actor(), "U9");
        assert_eq!(record.confidence, Confidence::Exact);
    }
}
