use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tokio::signal;
use tracing::{debug, info};

use guardr::api::routes::{create_router, AppState};
use guardr::attribution::ActorResolver;
use guardr::config::Config;
use guardr::counter::RateWindowCounter;
use guardr::dispatch::GuardDispatcher;
use guardr::evaluator::PolicyEvaluator;
use guardr::observability::{init_tracing, MetricsRegistry};
use guardr::platform::{
    AuditLog, HttpPlatform, MemberDirectory, MockPlatform, Moderation, NotificationSink,
};
use guardr::remediation::RemediationEngine;
use guardr::store::{ConfigStore, FilePolicyStore, PolicyRefresher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse();

    // Initialize tracing
    init_tracing(&config.log_level, config.log_json);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        enforce = config.enforce,
        "Starting guardr protection engine"
    );

    // Load initial policy and start the reload watcher
    let persistence = Arc::new(FilePolicyStore::new(&config.policy_path));
    let store = Arc::new(ConfigStore::bootstrap(persistence).await);

    let refresher = PolicyRefresher::new(store.clone(), config.policy_reload_interval());
    let policy_handle = refresher.start();

    // Platform gateway (in-memory when no URL is configured)
    let (audit, directory, moderation, sink): (
        Arc<dyn AuditLog>,
        Arc<dyn MemberDirectory>,
        Arc<dyn Moderation>,
        Arc<dyn NotificationSink>,
    ) = match config.platform_url {
        Some(ref url) => {
            info!(url = %url, "Platform gateway enabled");
            let platform = Arc::new(HttpPlatform::new(
                url.clone(),
                config.platform_token.clone(),
                config.platform_timeout(),
            )?);
            (
                platform.clone(),
                platform.clone(),
                platform.clone(),
                platform,
            )
        }
        None => {
            info!("No platform URL configured, using in-memory platform");
            let platform = Arc::new(MockPlatform::new());
            (
                platform.clone(),
                platform.clone(),
                platform.clone(),
                platform,
            )
        }
    };

    let counters = Arc::new(RateWindowCounter::new());
    let metrics = Arc::new(MetricsRegistry::new());

    let resolver = ActorResolver::new(audit, config.audit_freshness_ms);
    let evaluator = PolicyEvaluator::new(counters.clone(), directory);
    let remediation = RemediationEngine::new(moderation);

    let dispatcher = GuardDispatcher::new(
        store.clone(),
        resolver,
        evaluator,
        remediation,
        sink,
        metrics.clone(),
        config.enforce,
    );

    // Periodically drop expired counter windows
    let sweep_counters = counters.clone();
    let sweep_every = config.sweep_interval();
    let sweep_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            let reclaimed = sweep_counters.sweep();
            if reclaimed > 0 {
                debug!(reclaimed, "Swept expired counter windows");
            }
        }
    });

    // Create application state
    let state = Arc::new(AppState {
        dispatcher,
        store,
        counters,
        metrics,
        enforce: config.enforce,
        start_time: Instant::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    });

    // Create router
    let app = create_router(state);

    // Parse listen address
    let addr: SocketAddr = config.listen_addr.parse()?;

    info!(addr = %addr, "Starting HTTP server");

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Run server with graceful shutdown
    if config.graceful_shutdown {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    } else {
        axum::serve(listener, app).await?;
    }

    // Cleanup
    info!("Shutting down...");
    policy_handle.abort();
    sweep_handle.abort();

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Received shutdown signal");
}
