//! Attribution: pin each observed action on an actor via the audit trail.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{ActionEvent, ActorRecord, AuditEntry, TargetId};
use crate::platform::AuditLog;

/// Default freshness gap between an action and its audit entry, in
/// milliseconds. Entries further away are treated as unrelated.
pub const DEFAULT_FRESHNESS_MS: u64 = 15_000;

/// Resolves the perpetrator of an action from the platform audit trail.
///
/// Resolution never fails: a missing entry, a stale entry or an audit
/// outage all degrade to an unattributed record, and the pipeline keeps
/// counting under the synthetic unknown actor.
pub struct ActorResolver {
    audit: Arc<dyn AuditLog>,
    freshness_ms: u64,
}

impl ActorResolver {
    pub fn new(audit: Arc<dyn AuditLog>, freshness_ms: u64) -> Self {
        ActorResolver { audit, freshness_ms }
    }

    pub async fn resolve(&self, event: &ActionEvent) -> ActorRecord {
        match self.audit.latest_entry(&event.guild_id, &event.kind).await {
            Ok(Some(entry)) => Self::classify(
                &entry,
                event.observed_at,
                &event.subject_id,
                self.freshness_ms,
            ),
            Ok(None) => {
                debug!(
                    guild_id = %event.guild_id,
                    subtype = event.kind.subtype(),
                    "no audit entry for action"
                );
                ActorRecord::unknown()
            }
            Err(e) => {
                warn!(
                    guild_id = %event.guild_id,
                    subtype = event.kind.subtype(),
                    error = %e,
                    "audit lookup failed, treating actor as unknown"
                );
                ActorRecord::unknown()
            }
        }
    }

    /// Grade one audit entry against the observed action.
    ///
    /// The trail lags in either direction, so the gap is an absolute
    /// difference; an entry exactly at the freshness bound still counts.
    fn classify(
        entry: &AuditEntry,
        observed_at: DateTime<Utc>,
        subject_id: &TargetId,
        freshness_ms: u64,
    ) -> ActorRecord {
        let gap_ms = (observed_at - entry.created_at).num_milliseconds().abs() as u64;
        if gap_ms > freshness_ms {
            return ActorRecord::unknown();
        }

        match &entry.target_id {
            Some(target) if target == subject_id => {
                ActorRecord::exact(entry.actor_id.clone(), entry.entry_id.clone())
            }
            _ => ActorRecord::probable(entry.actor_id.clone(), entry.entry_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionKind, ChannelType, Confidence, GuildId, UserId};
    use crate::platform::MockPlatform;
    use chrono::Duration;

    fn t0() -> DateTime<Utc> {
        "2025-08-01T10:00:00Z".parse().unwrap()
    }

    fn entry_at(created_at: DateTime<Utc>, target: Option<&str>) -> AuditEntry {
        AuditEntry {
            entry_id: "E1".to_string(),
            actor_id: UserId::new("U9"),
            target_id: target.map(TargetId::new),
            created_at,
        }
    }

    fn delete_event() -> ActionEvent {
        let mut event = ActionEvent::new(
            GuildId::new("G1"),
            TargetId::new("C42"),
            ActionKind::ChannelDelete {
                name: "general".into(),
                channel_type: ChannelType::Text,
                parent_id: None,
            },
        );
        event.observed_at = t0();
        event
    }

    #[test]
    fn test_fresh_entry_with_matching_target_is_exact() {
        let entry = entry_at(t0() - Duration::seconds(3), Some("C42"));
        let record = ActorResolver::classify(&entry, t0(), &TargetId::new("C42"), 15_000);

        assert_eq!(record.confidence, Confidence::Exact);
        assert_eq!(record.actor_id, Some(UserId::new("U9")));
        assert_eq!(record.audit_entry_id.as_deref(), Some("E1"));
    }

    #[test]
    fn test_fresh_entry_with_other_target_is_probable() {
        let entry = entry_at(t0() - Duration::seconds(3), Some("C_OTHER"));
        let record = ActorResolver::classify(&entry, t0(), &TargetId::new("C42"), 15_000);

        assert_eq!(record.confidence, Confidence::Probable);
        assert!(record.is_attributed());
    }

    #[test]
    fn test_fresh_entry_without_target_is_probable() {
        let entry = entry_at(t0() - Duration::seconds(1), None);
        let record = ActorResolver::classify(&entry, t0(), &TargetId::new("C42"), 15_000);

        assert_eq!(record.confidence, Confidence::Probable);
    }

    #[test]
    fn test_stale_entry_is_unknown() {
        let entry = entry_at(t0() - Duration::milliseconds(15_001), Some("C42"));
        let record = ActorResolver::classify(&entry, t0(), &TargetId::new("C42"), 15_000);

        assert_eq!(record.confidence, Confidence::Unknown);
        assert!(!record.is_attributed());
    }

    #[test]
    fn test_freshness_bound_is_inclusive() {
        let entry = entry_at(t0() - Duration::milliseconds(15_000), Some("C42"));
        let record = ActorResolver::classify(&entry, t0(), &TargetId::new("C42"), 15_000);

        assert_eq!(record.confidence, Confidence::Exact);
    }

    #[test]
    fn test_entry_lagging_behind_action_still_fresh() {
        // Audit entries can surface after the gateway event.
        let entry = entry_at(t0() + Duration::seconds(4), Some("C42"));
        let record = ActorResolver::classify(&entry, t0(), &TargetId::new("C42"), 15_000);

        assert_eq!(record.confidence, Confidence::Exact);
    }

    #[tokio::test]
    async fn test_resolve_with_entry() {
        let platform = Arc::new(MockPlatform::new());
        platform.set_audit_entry("channelDelete", entry_at(t0() - Duration::seconds(2), Some("C42")));

        let resolver = ActorResolver::new(platform, DEFAULT_FRESHNESS_MS);
        let record = resolver.resolve(&delete_event()).await;

        assert_eq!(record.confidence, Confidence::Exact);
        assert_eq!(record.counter_actor(), "U9");
    }

    #[tokio::test]
    async fn test_resolve_survives_audit_outage() {
        let platform = Arc::new(MockPlatform::new());
        platform.fail_audit();

        let resolver = ActorResolver::new(platform, DEFAULT_FRESHNESS_MS);
        let record = resolver.resolve(&delete_event()).await;

        assert_eq!(record.confidence, Confidence::Unknown);
        assert_eq!(record.counter_actor(), "unknown");
    }

    #[tokio::test]
    async fn test_resolve_without_entry_is_unknown() {
        let platform = Arc::new(MockPlatform::new());

        let resolver = ActorResolver::new(platform, DEFAULT_FRESHNESS_MS);
        let record = resolver.resolve(&delete_event()).await;

        assert!(!record.is_attributed());
    }
}
