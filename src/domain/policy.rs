use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use super::event::ActionKind;
use super::ids::{ChannelId, RoleId, UserId};

/// Guard kinds, one per class of privileged action plus the master
/// escalation switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GuardKind {
    /// Channel creation/deletion bursts
    ChannelGuard,
    /// Role creation/deletion bursts
    RoleGuard,
    /// Ban/kick bursts
    MemberGuard,
    /// Webhook create/update/delete bursts
    WebhookGuard,
    /// Master switch: remediation only runs while this guard is enabled
    AntiNuke,
}

impl GuardKind {
    /// Every guard kind, in document order.
    pub const ALL: [GuardKind; 5] = [
        GuardKind::ChannelGuard,
        GuardKind::RoleGuard,
        GuardKind::MemberGuard,
        GuardKind::WebhookGuard,
        GuardKind::AntiNuke,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GuardKind::ChannelGuard => "channelGuard",
            GuardKind::RoleGuard => "roleGuard",
            GuardKind::MemberGuard => "memberGuard",
            GuardKind::WebhookGuard => "webhookGuard",
            GuardKind::AntiNuke => "antiNuke",
        }
    }
}

impl fmt::Display for GuardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for a single guard.
///
/// A guard that is absent from the policy document behaves exactly like a
/// disabled one: no audit lookup, no counting, no remediation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardConfig {
    /// Disabled guards are inert, not merely non-escalating.
    #[serde(default)]
    pub enabled: bool,

    /// Per-action-subtype threshold overrides (actions per window).
    /// Keys are action subtype names, e.g. "channelDelete".
    #[serde(default)]
    pub thresholds: BTreeMap<String, u32>,

    /// Counting window in milliseconds; falls back to the global default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_ms: Option<u64>,

    /// Attempt a best-effort recreate of deleted resources on breach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recreate_on_delete: Option<bool>,

    /// Timeout duration handed to remediation; falls back to the global
    /// default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u32>,
}

impl GuardConfig {
    /// An enabled guard with no overrides (defaults apply).
    pub fn enabled() -> Self {
        GuardConfig {
            enabled: true,
            ..GuardConfig::default()
        }
    }
}

fn default_window_ms() -> u64 {
    10_000
}

fn default_timeout_seconds() -> u32 {
    600
}

/// Global fallbacks applied when a guard omits its own settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateDefaults {
    /// Counting window in milliseconds.
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,

    /// Document-wide threshold override; when absent each action falls
    /// back to its built-in default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,

    /// Timeout duration in seconds for remediation.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
}

impl Default for RateDefaults {
    fn default() -> Self {
        RateDefaults {
            window_ms: default_window_ms(),
            threshold: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

fn default_version() -> String {
    "0".to_string()
}

/// Root protection policy document.
///
/// Held behind an atomic reference in the config store; readers take a
/// whole-document snapshot per event and never observe partial writes.
/// Mutation is replace-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionPolicy {
    /// Document version; bumped by whoever edits the document.
    #[serde(default = "default_version")]
    pub version: String,

    /// Guard configuration by kind. Absent kinds are disabled.
    #[serde(default)]
    pub guards: HashMap<GuardKind, GuardConfig>,

    /// Roles whose holders are exempt from counting.
    #[serde(default)]
    pub moderator_role_ids: HashSet<RoleId>,

    /// Users exempt from counting regardless of roles.
    #[serde(default)]
    pub bypass_user_ids: HashSet<UserId>,

    /// Channel the notification sink should route notices to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_sink_id: Option<ChannelId>,

    /// Global rate-limit defaults.
    #[serde(default)]
    pub rate_limits: RateDefaults,
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        ProtectionPolicy::disarmed()
    }
}

impl ProtectionPolicy {
    /// The safe default document: every guard present and disabled.
    ///
    /// No guard is ever auto-enabled; arming anything requires an explicit
    /// replace.
    pub fn disarmed() -> Self {
        let guards = GuardKind::ALL
            .iter()
            .map(|kind| (*kind, GuardConfig::default()))
            .collect();

        ProtectionPolicy {
            version: default_version(),
            guards,
            moderator_role_ids: HashSet::new(),
            bypass_user_ids: HashSet::new(),
            log_sink_id: None,
            rate_limits: RateDefaults::default(),
        }
    }

    pub fn guard(&self, kind: GuardKind) -> Option<&GuardConfig> {
        self.guards.get(&kind)
    }

    /// Absent guards are disabled.
    pub fn guard_enabled(&self, kind: GuardKind) -> bool {
        self.guard(kind).map(|g| g.enabled).unwrap_or(false)
    }

    /// Whether escalation may run at all.
    pub fn anti_nuke_enabled(&self) -> bool {
        self.guard_enabled(GuardKind::AntiNuke)
    }

    /// Resolve the threshold for one action: explicit per-subtype override,
    /// then the document-wide override, then the action's built-in default.
    pub fn threshold_for(&self, kind: GuardKind, action: &ActionKind) -> u32 {
        if let Some(guard) = self.guard(kind) {
            if let Some(t) = guard.thresholds.get(action.subtype()) {
                return *t;
            }
        }
        self.rate_limits
            .threshold
            .unwrap_or_else(|| action.default_threshold())
    }

    pub fn window_ms_for(&self, kind: GuardKind) -> u64 {
        self.guard(kind)
            .and_then(|g| g.window_ms)
            .unwrap_or(self.rate_limits.window_ms)
    }

    pub fn timeout_seconds_for(&self, kind: GuardKind) -> u32 {
        self.guard(kind)
            .and_then(|g| g.timeout_seconds)
            .unwrap_or(self.rate_limits.timeout_seconds)
    }

    pub fn recreate_on_delete(&self, kind: GuardKind) -> bool {
        self.guard(kind)
            .and_then(|g| g.recreate_on_delete)
            .unwrap_or(false)
    }

    pub fn is_bypassed(&self, user: &UserId) -> bool {
        self.bypass_user_ids.contains(user)
    }

    pub fn is_moderator_role(&self, role: &RoleId) -> bool {
        self.moderator_role_ids.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::ChannelType;

    #[test]
    fn test_policy_deserialization() {
        let yaml = r#"
version: "2025-08-01.2"
guards:
  channelGuard:
    enabled: true
    thresholds:
      channelDelete: 2
      channelCreate: 6
    windowMs: 12000
    recreateOnDelete: true
  antiNuke:
    enabled: true
    timeoutSeconds: 900
moderatorRoleIds: ["R_MOD", "R_ADMIN"]
bypassUserIds: ["U_OWNER"]
logSinkId: "C_AUDIT"
rateLimits:
  windowMs: 10000
  timeoutSeconds: 600
"#;

        let policy: ProtectionPolicy = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(policy.version, "2025-08-01.2");
        assert!(policy.guard_enabled(GuardKind::ChannelGuard));
        assert!(policy.anti_nuke_enabled());
        assert!(!policy.guard_enabled(GuardKind::RoleGuard));
        assert!(policy.is_bypassed(&UserId::new("U_OWNER")));
        assert!(policy.is_moderator_role(&RoleId::new("R_MOD")));
        assert_eq!(policy.window_ms_for(GuardKind::ChannelGuard), 12_000);
        assert_eq!(policy.timeout_seconds_for(GuardKind::AntiNuke), 900);
        assert!(policy.recreate_on_delete(GuardKind::ChannelGuard));
    }

    #[test]
    fn test_disarmed_document_has_all_guards_disabled() {
        let policy = ProtectionPolicy::disarmed();

        assert_eq!(policy.guards.len(), GuardKind::ALL.len());
        for kind in GuardKind::ALL {
            assert!(!policy.guard_enabled(kind), "{kind} must start disabled");
        }
    }

    #[test]
    fn test_threshold_resolution_precedence() {
        let delete = ActionKind::ChannelDelete {
            name: "general".into(),
            channel_type: ChannelType::Text,
            parent_id: None,
        };

        // Built-in default when nothing is configured.
        let policy = ProtectionPolicy::disarmed();
        assert_eq!(
            policy.threshold_for(GuardKind::ChannelGuard, &delete),
            delete.default_threshold()
        );

        // Document-wide override beats the built-in.
        let mut policy = ProtectionPolicy::disarmed();
        policy.rate_limits.threshold = Some(7);
        assert_eq!(policy.threshold_for(GuardKind::ChannelGuard, &delete), 7);

        // Explicit per-subtype override wins over everything.
        let guard = policy.guards.get_mut(&GuardKind::ChannelGuard).unwrap();
        guard.thresholds.insert("channelDelete".to_string(), 1);
        assert_eq!(policy.threshold_for(GuardKind::ChannelGuard, &delete), 1);
    }

    #[test]
    fn test_absent_guard_is_disabled() {
        let policy = ProtectionPolicy {
            guards: HashMap::new(),
            ..ProtectionPolicy::disarmed()
        };

        assert!(!policy.guard_enabled(GuardKind::WebhookGuard));
        // Fallbacks still resolve for absent guards.
        assert_eq!(policy.window_ms_for(GuardKind::WebhookGuard), 10_000);
        assert!(!policy.recreate_on_delete(GuardKind::WebhookGuard));
    }

    #[test]
    fn test_policy_round_trip() {
        let mut policy = ProtectionPolicy::disarmed();
        policy.version = "9".to_string();
        policy
            .guards
            .insert(GuardKind::MemberGuard, GuardConfig::enabled());

        let yaml = serde_yaml::to_string(&policy).unwrap();
        let parsed: ProtectionPolicy = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed, policy);
    }
}
