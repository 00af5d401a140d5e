use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::domain::{
    ActionKind, AuditEntry, ChannelId, ChannelType, GuardNotice, GuildId, RoleId, TargetId, UserId,
};

/// A guild member as the platform reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub user_id: UserId,
    /// Roles held; most members carry only a handful.
    #[serde(default)]
    pub role_ids: SmallVec<[RoleId; 8]>,
    /// Holds the administrator permission.
    #[serde(default)]
    pub is_admin: bool,
    /// Owns the guild.
    #[serde(default)]
    pub is_owner: bool,
}

impl Member {
    pub fn new(user_id: UserId) -> Self {
        Member {
            user_id,
            role_ids: SmallVec::new(),
            is_admin: false,
            is_owner: false,
        }
    }

    pub fn with_roles(user_id: UserId, role_ids: impl IntoIterator<Item = RoleId>) -> Self {
        Member {
            user_id,
            role_ids: role_ids.into_iter().collect(),
            is_admin: false,
            is_owner: false,
        }
    }
}

/// What to rebuild after a destructive delete.
///
/// Carries name and shape only; permission overwrites, topics and pinned
/// state are gone for good.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum RecreateSpec {
    Channel {
        name: String,
        channel_type: ChannelType,
        parent_id: Option<ChannelId>,
    },
    Role {
        name: String,
    },
    Webhook {
        channel_id: ChannelId,
    },
}

impl RecreateSpec {
    /// Spec for rebuilding the resource an action destroyed, if the action
    /// was a destructive delete.
    pub fn from_action(kind: &ActionKind) -> Option<Self> {
        match kind {
            ActionKind::ChannelDelete {
                name,
                channel_type,
                parent_id,
            } => Some(RecreateSpec::Channel {
                name: name.clone(),
                channel_type: *channel_type,
                parent_id: parent_id.clone(),
            }),
            ActionKind::RoleDelete { name } => Some(RecreateSpec::Role { name: name.clone() }),
            ActionKind::WebhookDelete { channel_id } => Some(RecreateSpec::Webhook {
                channel_id: channel_id.clone(),
            }),
            _ => None,
        }
    }
}

/// Read side of the platform audit trail.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Most recent audit entry matching the action's subtype, if any.
    async fn latest_entry(
        &self,
        guild_id: &GuildId,
        action: &ActionKind,
    ) -> anyhow::Result<Option<AuditEntry>>;
}

/// Membership lookups for exemption checks.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    async fn member(&self, guild_id: &GuildId, user_id: &UserId)
        -> anyhow::Result<Option<Member>>;
}

/// Privileged moderation calls against the platform.
#[async_trait]
pub trait Moderation: Send + Sync {
    async fn timeout(
        &self,
        guild_id: &GuildId,
        user_id: &UserId,
        seconds: u32,
        reason: &str,
    ) -> anyhow::Result<()>;

    async fn ban(&self, guild_id: &GuildId, user_id: &UserId, reason: &str) -> anyhow::Result<()>;

    /// Rebuild a deleted resource. Returns the id of the replacement.
    async fn recreate_resource(
        &self,
        guild_id: &GuildId,
        spec: &RecreateSpec,
    ) -> anyhow::Result<TargetId>;
}

/// Delivery of guard notices to the configured sink channel.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, notice: &GuardNotice) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recreate_spec_only_for_destructive_deletes() {
        let delete = ActionKind::ChannelDelete {
            name: "general".into(),
            channel_type: ChannelType::Voice,
            parent_id: Some(ChannelId::new("C_PARENT")),
        };
        assert_eq!(
            RecreateSpec::from_action(&delete),
            Some(RecreateSpec::Channel {
                name: "general".into(),
                channel_type: ChannelType::Voice,
                parent_id: Some(ChannelId::new("C_PARENT")),
            })
        );

        assert_eq!(RecreateSpec::from_action(&ActionKind::BanAdd), None);
        assert_eq!(
            RecreateSpec::from_action(&ActionKind::ChannelCreate {
                name: "x".into(),
                channel_type: ChannelType::Text,
            }),
            None
        );
    }

    #[test]
    fn test_member_with_roles() {
        let member = Member::with_roles(UserId::new("U1"), [RoleId::new("R1"), RoleId::new("R2")]);
        assert_eq!(member.role_ids.len(), 2);
        assert!(!member.is_admin);
    }
}
