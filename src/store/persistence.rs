use async_trait::async_trait;
use parking_lot::Mutex;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::domain::ProtectionPolicy;

use super::ConfigError;

/// Durable backing for the protection policy document.
#[async_trait]
pub trait PolicyPersistence: Send + Sync {
    /// Load the stored document. `None` when nothing was ever saved.
    async fn load(&self) -> Result<Option<ProtectionPolicy>, ConfigError>;

    async fn save(&self, policy: &ProtectionPolicy) -> Result<(), ConfigError>;
}

/// YAML file persistence.
///
/// Saves write a sibling temp file and rename it into place, so a crash
/// mid-save never leaves a truncated document behind.
pub struct FilePolicyStore {
    path: PathBuf,
}

impl FilePolicyStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        FilePolicyStore {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl PolicyPersistence for FilePolicyStore {
    async fn load(&self) -> Result<Option<ProtectionPolicy>, ConfigError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let policy: ProtectionPolicy = serde_yaml::from_str(&content)?;
        Ok(Some(policy))
    }

    async fn save(&self, policy: &ProtectionPolicy) -> Result<(), ConfigError> {
        let content = serde_yaml::to_string(policy)?;

        let tmp = self.tmp_path();
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;

        Ok(())
    }
}

/// In-memory persistence for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    slot: Mutex<Option<ProtectionPolicy>>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the stored document (for testing).
    pub fn with_policy(policy: ProtectionPolicy) -> Self {
        MemoryPersistence {
            slot: Mutex::new(Some(policy)),
        }
    }
}

#[async_trait]
impl PolicyPersistence for MemoryPersistence {
    async fn load(&self) -> Result<Option<ProtectionPolicy>, ConfigError> {
        Ok(self.slot.lock().clone())
    }

    async fn save(&self, policy: &ProtectionPolicy) -> Result<(), ConfigError> {
        *self.slot.lock() = Some(policy.clone());
        Ok(())
    }
}
