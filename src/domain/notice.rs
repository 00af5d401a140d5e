use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::actor::{ActorRecord, Confidence};
use super::event::EventId;
use super::ids::{ChannelId, GuildId, TargetId};
use super::outcome::{GuardStatus, RemediationOutcome};
use super::policy::GuardKind;

/// Notice emitted for every counted or breached action.
///
/// Sent after remediation so the outcome it reports is final. Delivery is
/// best-effort; a failed send is logged, never retried inline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardNotice {
    pub schema_version: String,
    /// Fresh id for this notice, distinct from the event that caused it.
    pub notice_id: EventId,
    pub event_id: EventId,
    pub guild_id: GuildId,
    pub guard: GuardKind,
    pub subtype: String,
    /// Resource the action touched, as received from the gateway.
    pub subject_id: TargetId,
    pub status: GuardStatus,
    pub actor: ActorRecord,
    pub count: u64,
    pub threshold: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<RemediationOutcome>,
    /// Resource recreated after a destructive delete, when one was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recreated_target: Option<TargetId>,
    /// Channel the notice should be routed to, from the policy snapshot.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sink_id: Option<ChannelId>,
    pub noted_at: DateTime<Utc>,
}

impl GuardNotice {
    /// One-line human summary for the sink channel.
    pub fn summary(&self) -> String {
        let actor = match &self.actor.actor_id {
            Some(id) => id.as_str().to_string(),
            None => "unknown actor".to_string(),
        };
        let certainty = match self.actor.confidence {
            Confidence::Exact => "",
            Confidence::Probable => " (probable)",
            Confidence::Unknown => " (unattributed)",
        };

        match self.status {
            GuardStatus::Breached => format!(
                "{}: {} by {}{} breached {}/{} in window",
                self.guard, self.subtype, actor, certainty, self.count, self.threshold
            ),
            _ => format!(
                "{}: {} by {}{} at {}/{} in window",
                self.guard, self.subtype, actor, certainty, self.count, self.threshold
            ),
        }
    }
}
