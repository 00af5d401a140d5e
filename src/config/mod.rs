use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Guild protection engine configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "guardr")]
#[command(about = "Guild protection engine for privileged-action bursts")]
pub struct Config {
    /// HTTP server listen address
    #[arg(long, default_value = "0.0.0.0:8080", env = "GUARDR_LISTEN_ADDR")]
    pub listen_addr: String,

    /// Path to the protection policy YAML file
    #[arg(long, default_value = "protection.yaml", env = "GUARDR_POLICY_PATH")]
    pub policy_path: PathBuf,

    /// Platform gateway base URL (in-memory mock platform when not set)
    #[arg(long, env = "GUARDR_PLATFORM_URL")]
    pub platform_url: Option<String>,

    /// Platform API token
    #[arg(long, default_value = "", env = "GUARDR_PLATFORM_TOKEN")]
    pub platform_token: String,

    /// Platform request timeout in seconds
    #[arg(long, default_value = "5", env = "GUARDR_PLATFORM_TIMEOUT_SECS")]
    pub platform_timeout_secs: u64,

    /// Audit entry freshness bound in milliseconds
    #[arg(long, default_value = "15000", env = "GUARDR_AUDIT_FRESHNESS_MS")]
    pub audit_freshness_ms: u64,

    /// Policy reload check interval in seconds
    #[arg(long, default_value = "30", env = "GUARDR_POLICY_RELOAD_SECS")]
    pub policy_reload_secs: u64,

    /// Expired counter sweep interval in seconds
    #[arg(long, default_value = "60", env = "GUARDR_SWEEP_SECS")]
    pub sweep_secs: u64,

    /// Apply remediation on breaches (observe-only mode when false)
    #[arg(long, default_value = "true", env = "GUARDR_ENFORCE")]
    pub enforce: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, default_value = "false", env = "GUARDR_LOG_JSON")]
    pub log_json: bool,

    /// Enable graceful shutdown
    #[arg(long, default_value = "true", env = "GUARDR_GRACEFUL_SHUTDOWN")]
    pub graceful_shutdown: bool,
}

impl Config {
    /// Get policy reload interval as Duration.
    pub fn policy_reload_interval(&self) -> Duration {
        Duration::from_secs(self.policy_reload_secs)
    }

    /// Get counter sweep interval as Duration.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_secs)
    }

    /// Get platform request timeout as Duration.
    pub fn platform_timeout(&self) -> Duration {
        Duration::from_secs(self.platform_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "0.0.0.0:8080".to_string(),
            policy_path: PathBuf::from("protection.yaml"),
            platform_url: None,
            platform_token: String::new(),
            platform_timeout_secs: 5,
            audit_freshness_ms: 15_000,
            policy_reload_secs: 30,
            sweep_secs: 60,
            enforce: true,
            log_level: "info".to_string(),
            log_json: false,
            graceful_shutdown: true,
        }
    }
}
