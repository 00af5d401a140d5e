//! REST adapter for the platform gateway sidecar.
//!
//! Implements the platform traits against a small HTTP surface. Auth is a
//! bearer token; every call carries a bounded request timeout.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::domain::{ActionKind, AuditEntry, GuardNotice, GuildId, TargetId, UserId};

use super::traits::{AuditLog, Member, MemberDirectory, Moderation, NotificationSink, RecreateSpec};

const USER_AGENT: &str = concat!("guardr/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the platform gateway.
pub struct HttpPlatform {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct AuditPage {
    entries: Vec<AuditEntryDto>,
}

#[derive(Debug, Deserialize)]
struct AuditEntryDto {
    id: String,
    user_id: String,
    #[serde(default)]
    target_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl AuditEntryDto {
    fn into_entry(self) -> AuditEntry {
        AuditEntry {
            entry_id: self.id,
            actor_id: UserId::new(self.user_id),
            target_id: self.target_id.map(TargetId::new),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreatedResource {
    id: String,
}

#[derive(Debug, Serialize)]
struct TimeoutBody<'a> {
    seconds: u32,
    reason: &'a str,
}

#[derive(Debug, Serialize)]
struct BanBody<'a> {
    reason: &'a str,
}

#[derive(Debug, Serialize)]
struct NoticeBody<'a> {
    content: String,
    notice: &'a GuardNotice,
}

impl HttpPlatform {
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(HttpPlatform {
            client,
            base_url,
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn recreate_path(&self, guild_id: &GuildId, spec: &RecreateSpec) -> String {
        match spec {
            RecreateSpec::Channel { .. } => format!("/guilds/{}/channels", guild_id),
            RecreateSpec::Role { .. } => format!("/guilds/{}/roles", guild_id),
            RecreateSpec::Webhook { channel_id } => {
                format!("/channels/{}/webhooks", channel_id.as_str())
            }
        }
    }
}

#[async_trait]
impl AuditLog for HttpPlatform {
    async fn latest_entry(
        &self,
        guild_id: &GuildId,
        action: &ActionKind,
    ) -> anyhow::Result<Option<AuditEntry>> {
        let path = format!("/guilds/{}/audit-log", guild_id);
        let page: AuditPage = self
            .client
            .get(self.url(&path))
            .bearer_auth(&self.token)
            .query(&[("action_type", action.subtype()), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(page.entries.into_iter().next().map(AuditEntryDto::into_entry))
    }
}

#[async_trait]
impl MemberDirectory for HttpPlatform {
    async fn member(
        &self,
        guild_id: &GuildId,
        user_id: &UserId,
    ) -> anyhow::Result<Option<Member>> {
        let path = format!("/guilds/{}/members/{}", guild_id, user_id);
        let resp = self
            .client
            .get(self.url(&path))
            .bearer_auth(&self.token)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let member = resp.error_for_status()?.json::<Member>().await?;
        Ok(Some(member))
    }
}

#[async_trait]
impl Moderation for HttpPlatform {
    async fn timeout(
        &self,
        guild_id: &GuildId,
        user_id: &UserId,
        seconds: u32,
        reason: &str,
    ) -> anyhow::Result<()> {
        let path = format!("/guilds/{}/members/{}/timeout", guild_id, user_id);
        self.client
            .put(self.url(&path))
            .bearer_auth(&self.token)
            .json(&TimeoutBody { seconds, reason })
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn ban(&self, guild_id: &GuildId, user_id: &UserId, reason: &str) -> anyhow::Result<()> {
        let path = format!("/guilds/{}/bans/{}", guild_id, user_id);
        self.client
            .put(self.url(&path))
            .bearer_auth(&self.token)
            .json(&BanBody { reason })
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn recreate_resource(
        &self,
        guild_id: &GuildId,
        spec: &RecreateSpec,
    ) -> anyhow::Result<TargetId> {
        let path = self.recreate_path(guild_id, spec);
        let created: CreatedResource = self
            .client
            .post(self.url(&path))
            .bearer_auth(&self.token)
            .json(spec)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(TargetId::new(created.id))
    }
}

#[async_trait]
impl NotificationSink for HttpPlatform {
    async fn send(&self, notice: &GuardNotice) -> anyhow::Result<()> {
        let sink = match &notice.sink_id {
            Some(sink) => sink,
            None => {
                debug!(guild_id = %notice.guild_id, "no sink channel configured, dropping notice");
                return Ok(());
            }
        };

        let path = format!("/channels/{}/messages", sink.as_str());
        self.client
            .post(self.url(&path))
            .bearer_auth(&self.token)
            .json(&NoticeBody {
                content: notice.summary(),
                notice,
            })
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
