use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ids::{ChannelId, GuildId, TargetId};
use super::policy::GuardKind;

/// Wire schema version stamped on every action event.
pub const SCHEMA_VERSION: &str = "v1";

/// Unique event identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub String);

impl EventId {
    pub fn new() -> Self {
        EventId(Uuid::new_v4().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        EventId(s.into())
    }
}

impl Default for EventId {
    fn default() -> Self {
        EventId::new()
    }
}

/// Channel flavor, carried so deleted channels can be recreated in kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    #[default]
    Text,
    Voice,
    Category,
    Forum,
}

/// One privileged action observed in a guild, tagged by subtype.
///
/// Variants carry only what the engine needs downstream: names and shapes
/// for best-effort recreation, channel ids for webhook scoping. The serde
/// tag doubles as the counter-key subtype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ActionKind {
    ChannelCreate {
        name: String,
        channel_type: ChannelType,
    },
    ChannelDelete {
        name: String,
        channel_type: ChannelType,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_id: Option<ChannelId>,
    },
    RoleCreate {
        name: String,
    },
    RoleDelete {
        name: String,
    },
    BanAdd,
    MemberKick,
    WebhookCreate {
        channel_id: ChannelId,
    },
    WebhookUpdate {
        channel_id: ChannelId,
    },
    WebhookDelete {
        channel_id: ChannelId,
    },
}

impl ActionKind {
    /// Every subtype name, matching the serde tags.
    pub const SUBTYPES: [&'static str; 9] = [
        "channelCreate",
        "channelDelete",
        "roleCreate",
        "roleDelete",
        "banAdd",
        "memberKick",
        "webhookCreate",
        "webhookUpdate",
        "webhookDelete",
    ];

    /// The guard responsible for this action.
    pub fn guard(&self) -> GuardKind {
        match self {
            ActionKind::ChannelCreate { .. } | ActionKind::ChannelDelete { .. } => {
                GuardKind::ChannelGuard
            }
            ActionKind::RoleCreate { .. } | ActionKind::RoleDelete { .. } => GuardKind::RoleGuard,
            ActionKind::BanAdd | ActionKind::MemberKick => GuardKind::MemberGuard,
            ActionKind::WebhookCreate { .. }
            | ActionKind::WebhookUpdate { .. }
            | ActionKind::WebhookDelete { .. } => GuardKind::WebhookGuard,
        }
    }

    /// Subtype name, identical to the serde tag. Used in counter keys,
    /// threshold overrides and remediation reasons.
    pub fn subtype(&self) -> &'static str {
        match self {
            ActionKind::ChannelCreate { .. } => "channelCreate",
            ActionKind::ChannelDelete { .. } => "channelDelete",
            ActionKind::RoleCreate { .. } => "roleCreate",
            ActionKind::RoleDelete { .. } => "roleDelete",
            ActionKind::BanAdd => "banAdd",
            ActionKind::MemberKick => "memberKick",
            ActionKind::WebhookCreate { .. } => "webhookCreate",
            ActionKind::WebhookUpdate { .. } => "webhookUpdate",
            ActionKind::WebhookDelete { .. } => "webhookDelete",
        }
    }

    /// Deletions that destroy a recreatable resource.
    pub fn is_destructive_delete(&self) -> bool {
        matches!(
            self,
            ActionKind::ChannelDelete { .. }
                | ActionKind::RoleDelete { .. }
                | ActionKind::WebhookDelete { .. }
        )
    }

    /// Built-in per-action threshold, used when neither the guard nor the
    /// document overrides it. Destructive deletes trip earliest, creations
    /// are given the most room.
    pub fn default_threshold(&self) -> u32 {
        match self {
            ActionKind::ChannelDelete { .. }
            | ActionKind::RoleDelete { .. }
            | ActionKind::WebhookDelete { .. } => 2,
            ActionKind::BanAdd
            | ActionKind::MemberKick
            | ActionKind::WebhookCreate { .. }
            | ActionKind::WebhookUpdate { .. } => 3,
            ActionKind::ChannelCreate { .. } | ActionKind::RoleCreate { .. } => 5,
        }
    }
}

/// One privileged action as received from the platform gateway.
///
/// `subject_id` is the id of the affected resource (the deleted channel,
/// the banned user), not the perpetrator; attribution resolves the
/// perpetrator separately from the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEvent {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub event_id: EventId,

    pub guild_id: GuildId,

    /// Id of the resource the action touched.
    pub subject_id: TargetId,

    #[serde(flatten)]
    pub kind: ActionKind,

    /// When the gateway observed the action.
    pub observed_at: DateTime<Utc>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl ActionEvent {
    pub fn new(guild_id: GuildId, subject_id: TargetId, kind: ActionKind) -> Self {
        ActionEvent {
            schema_version: SCHEMA_VERSION.to_string(),
            event_id: EventId::new(),
            guild_id,
            subject_id,
            kind,
            observed_at: Utc::now(),
        }
    }
}
