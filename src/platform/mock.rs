use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{ActionKind, AuditEntry, GuardNotice, GuildId, TargetId, UserId};

use super::traits::{AuditLog, Member, MemberDirectory, Moderation, NotificationSink, RecreateSpec};

/// Mock platform for testing.
///
/// Implements every platform trait against in-memory state and records all
/// privileged calls so tests can assert on exactly what the engine did, and
/// on what it never touched.
#[derive(Debug, Default)]
pub struct MockPlatform {
    audit_entries: Mutex<HashMap<String, AuditEntry>>,
    members: Mutex<HashMap<String, Member>>,

    audit_queries: Mutex<Vec<String>>,
    member_lookups: Mutex<Vec<String>>,
    timeouts: Mutex<Vec<(UserId, u32, String)>>,
    bans: Mutex<Vec<(UserId, String)>>,
    recreates: Mutex<Vec<RecreateSpec>>,
    notices: Mutex<Vec<GuardNotice>>,

    fail_audit: Mutex<bool>,
    fail_directory: Mutex<bool>,
    fail_timeout: Mutex<bool>,
    fail_ban: Mutex<bool>,
    fail_recreate: Mutex<bool>,
    fail_notify: Mutex<bool>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latest audit entry returned for a subtype (for testing).
    pub fn set_audit_entry(&self, subtype: &str, entry: AuditEntry) {
        self.audit_entries.lock().insert(subtype.to_string(), entry);
    }

    /// Register a guild member (for testing).
    pub fn add_member(&self, member: Member) {
        self.members
            .lock()
            .insert(member.user_id.as_str().to_string(), member);
    }

    pub fn fail_audit(&self) {
        *self.fail_audit.lock() = true;
    }

    pub fn fail_directory(&self) {
        *self.fail_directory.lock() = true;
    }

    pub fn fail_timeout(&self) {
        *self.fail_timeout.lock() = true;
    }

    pub fn fail_ban(&self) {
        *self.fail_ban.lock() = true;
    }

    pub fn fail_recreate(&self) {
        *self.fail_recreate.lock() = true;
    }

    pub fn fail_notify(&self) {
        *self.fail_notify.lock() = true;
    }

    /// Subtypes the engine queried the audit trail for (for assertions).
    pub fn recorded_audit_queries(&self) -> Vec<String> {
        self.audit_queries.lock().clone()
    }

    /// User ids the engine looked up in the directory (for assertions).
    pub fn recorded_member_lookups(&self) -> Vec<String> {
        self.member_lookups.lock().clone()
    }

    /// Timeouts that went through, as (user, seconds, reason).
    pub fn recorded_timeouts(&self) -> Vec<(UserId, u32, String)> {
        self.timeouts.lock().clone()
    }

    /// Bans that went through, as (user, reason).
    pub fn recorded_bans(&self) -> Vec<(UserId, String)> {
        self.bans.lock().clone()
    }

    pub fn recorded_recreates(&self) -> Vec<RecreateSpec> {
        self.recreates.lock().clone()
    }

    pub fn recorded_notices(&self) -> Vec<GuardNotice> {
        self.notices.lock().clone()
    }
}

#[async_trait]
impl AuditLog for MockPlatform {
    async fn latest_entry(
        &self,
        _guild_id: &GuildId,
        action: &ActionKind,
    ) -> anyhow::Result<Option<AuditEntry>> {
        self.audit_queries.lock().push(action.subtype().to_string());

        if *self.fail_audit.lock() {
            anyhow::bail!("audit log unavailable");
        }

        Ok(self.audit_entries.lock().get(action.subtype()).cloned())
    }
}

#[async_trait]
impl MemberDirectory for MockPlatform {
    async fn member(
        &self,
        _guild_id: &GuildId,
        user_id: &UserId,
    ) -> anyhow::Result<Option<Member>> {
        self.member_lookups.lock().push(user_id.as_str().to_string());

        if *self.fail_directory.lock() {
            anyhow::bail!("member directory unavailable");
        }

        Ok(self.members.lock().get(user_id.as_str()).cloned())
    }
}

#[async_trait]
impl Moderation for MockPlatform {
    async fn timeout(
        &self,
        _guild_id: &GuildId,
        user_id: &UserId,
        seconds: u32,
        reason: &str,
    ) -> anyhow::Result<()> {
        if *self.fail_timeout.lock() {
            anyhow::bail!("timeout rejected by platform");
        }

        self.timeouts
            .lock()
            .push((user_id.clone(), seconds, reason.to_string()));
        Ok(())
    }

    async fn ban(&self, _guild_id: &GuildId, user_id: &UserId, reason: &str) -> anyhow::Result<()> {
        if *self.fail_ban.lock() {
            anyhow::bail!("ban rejected by platform");
        }

        self.bans.lock().push((user_id.clone(), reason.to_string()));
        Ok(())
    }

    async fn recreate_resource(
        &self,
        _guild_id: &GuildId,
        spec: &RecreateSpec,
    ) -> anyhow::Result<TargetId> {
        if *self.fail_recreate.lock() {
            anyhow::bail!("recreate rejected by platform");
        }

        self.recreates.lock().push(spec.clone());
        Ok(TargetId::new(Uuid::new_v4().to_string()))
    }
}

#[async_trait]
impl NotificationSink for MockPlatform {
    async fn send(&self, notice: &GuardNotice) -> anyhow::Result<()> {
        if *self.fail_notify.lock() {
            anyhow::bail!("notice delivery failed");
        }

        self.notices.lock().push(notice.clone());
        Ok(())
    }
}
