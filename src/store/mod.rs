//! Policy store: validated, atomically replaceable protection documents.

pub mod persistence;
pub mod watcher;

use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::domain::{ActionKind, ProtectionPolicy};

pub use persistence::{FilePolicyStore, MemoryPersistence, PolicyPersistence};
pub use watcher::PolicyRefresher;

/// Errors from loading, validating or replacing the policy document.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Longest window a policy may configure, in milliseconds (366 days).
/// Larger values overflow the counter's window arithmetic.
pub const MAX_WINDOW_MS: u64 = 366 * 24 * 60 * 60 * 1000;

/// Validate a policy document before it can become live.
pub fn validate_policy(policy: &ProtectionPolicy) -> Result<(), ConfigError> {
    if policy.version.is_empty() {
        return Err(ConfigError::Validation(
            "policy version cannot be empty".to_string(),
        ));
    }

    if policy.rate_limits.window_ms == 0 {
        return Err(ConfigError::Validation(
            "rateLimits.windowMs must be positive".to_string(),
        ));
    }
    if policy.rate_limits.window_ms > MAX_WINDOW_MS {
        return Err(ConfigError::Validation(format!(
            "rateLimits.windowMs must be at most {MAX_WINDOW_MS}"
        )));
    }
    if policy.rate_limits.timeout_seconds == 0 {
        return Err(ConfigError::Validation(
            "rateLimits.timeoutSeconds must be positive".to_string(),
        ));
    }
    if policy.rate_limits.threshold == Some(0) {
        return Err(ConfigError::Validation(
            "rateLimits.threshold must be positive".to_string(),
        ));
    }

    for (kind, guard) in &policy.guards {
        if guard.window_ms == Some(0) {
            return Err(ConfigError::Validation(format!(
                "{kind}: windowMs must be positive"
            )));
        }
        if guard.window_ms.is_some_and(|w| w > MAX_WINDOW_MS) {
            return Err(ConfigError::Validation(format!(
                "{kind}: windowMs must be at most {MAX_WINDOW_MS}"
            )));
        }
        if guard.timeout_seconds == Some(0) {
            return Err(ConfigError::Validation(format!(
                "{kind}: timeoutSeconds must be positive"
            )));
        }

        for (subtype, threshold) in &guard.thresholds {
            if !ActionKind::SUBTYPES.contains(&subtype.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "{kind}: unknown action subtype in thresholds: {subtype}"
                )));
            }
            if *threshold == 0 {
                return Err(ConfigError::Validation(format!(
                    "{kind}: threshold for {subtype} must be positive"
                )));
            }
        }
    }

    Ok(())
}

/// Live policy document with replace-only mutation.
///
/// Readers snapshot the whole document with one `Arc` clone; a replace
/// validates, persists, then swaps, so a failed save never leaves memory
/// and disk disagreeing.
pub struct ConfigStore {
    current: RwLock<Arc<ProtectionPolicy>>,
    persistence: Arc<dyn PolicyPersistence>,
}

impl ConfigStore {
    /// Load the stored document, or fall back to the disarmed default when
    /// none exists or the stored one cannot be used. The engine starts
    /// disarmed and loud rather than refusing to start.
    pub async fn bootstrap(persistence: Arc<dyn PolicyPersistence>) -> Self {
        let policy = match persistence.load().await {
            Ok(Some(policy)) => match validate_policy(&policy) {
                Ok(()) => {
                    info!(version = %policy.version, "loaded protection policy");
                    policy
                }
                Err(e) => {
                    error!(error = %e, "stored protection policy invalid, starting disarmed");
                    ProtectionPolicy::disarmed()
                }
            },
            Ok(None) => {
                info!("no stored protection policy, starting disarmed");
                ProtectionPolicy::disarmed()
            }
            Err(e) => {
                error!(error = %e, "failed to load protection policy, starting disarmed");
                ProtectionPolicy::disarmed()
            }
        };

        ConfigStore {
            current: RwLock::new(Arc::new(policy)),
            persistence,
        }
    }

    /// Snapshot of the live document.
    pub fn current(&self) -> Arc<ProtectionPolicy> {
        self.current.read().clone()
    }

    /// Replace the whole document: validate, persist, then swap.
    pub async fn replace(
        &self,
        policy: ProtectionPolicy,
    ) -> Result<Arc<ProtectionPolicy>, ConfigError> {
        validate_policy(&policy)?;
        self.persistence.save(&policy).await?;

        let next = Arc::new(policy);
        let previous = {
            let mut guard = self.current.write();
            std::mem::replace(&mut *guard, next.clone())
        };

        info!(
            from = %previous.version,
            to = %next.version,
            "protection policy replaced"
        );

        Ok(next)
    }

    /// Re-read the stored document and swap it in if the version changed.
    /// Returns whether a swap happened.
    pub async fn reload(&self) -> Result<bool, ConfigError> {
        let policy = match self.persistence.load().await? {
            Some(policy) => policy,
            None => return Ok(false),
        };

        if policy.version == self.current().version {
            return Ok(false);
        }

        validate_policy(&policy)?;

        let next = Arc::new(policy);
        let previous = {
            let mut guard = self.current.write();
            std::mem::replace(&mut *guard, next.clone())
        };

        info!(
            from = %previous.version,
            to = %next.version,
            "protection policy reloaded from storage"
        );

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GuardConfig, GuardKind};

    fn armed_policy(version: &str) -> ProtectionPolicy {
        let mut policy = ProtectionPolicy::disarmed();
        policy.version = version.to_string();
        policy
            .guards
            .insert(GuardKind::RoleGuard, GuardConfig::enabled());
        policy
    }

    #[test]
    fn test_validation_rejects_zero_window() {
        let mut policy = ProtectionPolicy::disarmed();
        policy.rate_limits.window_ms = 0;

        let result = validate_policy(&policy);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("windowMs"));
    }

    #[test]
    fn test_validation_rejects_oversized_window() {
        let mut policy = ProtectionPolicy::disarmed();

        // Past chrono's datetime range once added to a timestamp.
        policy.rate_limits.window_ms = 9_000_000_000_000_000_000;
        let result = validate_policy(&policy);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("windowMs"));

        // Wraps negative when cast to i64 milliseconds.
        policy.rate_limits.window_ms = u64::MAX;
        assert!(validate_policy(&policy).is_err());

        policy.rate_limits.window_ms = MAX_WINDOW_MS;
        assert!(validate_policy(&policy).is_ok());
    }

    #[test]
    fn test_validation_rejects_oversized_guard_window() {
        let mut policy = ProtectionPolicy::disarmed();
        policy
            .guards
            .get_mut(&GuardKind::ChannelGuard)
            .unwrap()
            .window_ms = Some(MAX_WINDOW_MS + 1);

        let result = validate_policy(&policy);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("channelGuard"));
    }

    #[test]
    fn test_validation_rejects_unknown_subtype() {
        let mut policy = ProtectionPolicy::disarmed();
        policy
            .guards
            .get_mut(&GuardKind::ChannelGuard)
            .unwrap()
            .thresholds
            .insert("chanelDelete".to_string(), 2);

        let result = validate_policy(&policy);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("chanelDelete"));
    }

    #[test]
    fn test_validation_rejects_zero_threshold() {
        let mut policy = ProtectionPolicy::disarmed();
        policy
            .guards
            .get_mut(&GuardKind::MemberGuard)
            .unwrap()
            .thresholds
            .insert("banAdd".to_string(), 0);

        assert!(validate_policy(&policy).is_err());
    }

    #[tokio::test]
    async fn test_bootstrap_without_stored_policy_is_disarmed() {
        let store = ConfigStore::bootstrap(Arc::new(MemoryPersistence::new())).await;

        let policy = store.current();
        for kind in GuardKind::ALL {
            assert!(!policy.guard_enabled(kind));
        }
    }

    #[tokio::test]
    async fn test_bootstrap_uses_stored_policy() {
        let persistence = Arc::new(MemoryPersistence::with_policy(armed_policy("7")));
        let store = ConfigStore::bootstrap(persistence).await;

        assert_eq!(store.current().version, "7");
        assert!(store.current().guard_enabled(GuardKind::RoleGuard));
    }

    #[tokio::test]
    async fn test_bootstrap_with_invalid_stored_policy_starts_disarmed() {
        let mut bad = armed_policy("1");
        bad.rate_limits.window_ms = 0;

        let store = ConfigStore::bootstrap(Arc::new(MemoryPersistence::with_policy(bad))).await;

        assert_eq!(store.current().version, "0");
        assert!(!store.current().guard_enabled(GuardKind::RoleGuard));
    }

    #[tokio::test]
    async fn test_bootstrap_with_unreadable_store_starts_disarmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("protection.yaml");
        std::fs::write(&path, "guards: [not, a, map]").unwrap();

        let store = ConfigStore::bootstrap(Arc::new(FilePolicyStore::new(&path))).await;

        assert_eq!(store.current().version, "0");
    }

    #[tokio::test]
    async fn test_replace_persists_and_swaps() {
        let persistence = Arc::new(MemoryPersistence::new());
        let store = ConfigStore::bootstrap(persistence.clone()).await;

        store.replace(armed_policy("1")).await.unwrap();

        assert_eq!(store.current().version, "1");
        assert_eq!(persistence.load().await.unwrap().unwrap().version, "1");
    }

    #[tokio::test]
    async fn test_replace_rejects_invalid_document() {
        let store = ConfigStore::bootstrap(Arc::new(MemoryPersistence::new())).await;

        let mut bad = armed_policy("1");
        bad.version = String::new();

        assert!(store.replace(bad).await.is_err());
        // Live document untouched.
        assert_eq!(store.current().version, "0");
    }

    #[tokio::test]
    async fn test_reload_swaps_only_on_version_change() {
        let persistence = Arc::new(MemoryPersistence::with_policy(armed_policy("1")));
        let store = ConfigStore::bootstrap(persistence.clone()).await;

        // Same version: no swap.
        assert!(!store.reload().await.unwrap());

        // Storage moves ahead behind our back.
        persistence.save(&armed_policy("2")).await.unwrap();
        assert!(store.reload().await.unwrap());
        assert_eq!(store.current().version, "2");
    }

    #[tokio::test]
    async fn test_snapshot_is_immune_to_replace() {
        let store = ConfigStore::bootstrap(Arc::new(MemoryPersistence::new())).await;

        let snapshot = store.current();
        store.replace(armed_policy("5")).await.unwrap();

        // The old snapshot still reads consistently.
        assert_eq!(snapshot.version, "0");
        assert_eq!(store.current().version, "5");
    }
}
