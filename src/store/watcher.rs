use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{info, warn};

use super::ConfigStore;

/// Periodically re-reads the stored policy document so out-of-band edits
/// (an operator editing the YAML file directly) go live without a restart.
///
/// Dispatch always snapshots from the store, so a refresher is the only
/// moving part; there is no per-reader cache to invalidate.
pub struct PolicyRefresher {
    store: Arc<ConfigStore>,
    check_interval: Duration,
}

impl PolicyRefresher {
    pub fn new(store: Arc<ConfigStore>, check_interval: Duration) -> Self {
        PolicyRefresher {
            store,
            check_interval,
        }
    }

    /// Start the refresh loop.
    pub fn start(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = interval(self.check_interval);

            loop {
                interval.tick().await;

                match self.store.reload().await {
                    Ok(true) => info!("policy refreshed from storage"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "policy refresh failed"),
                }
            }
        })
    }
}
