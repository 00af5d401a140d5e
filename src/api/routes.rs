use axum::{
    error_handling::HandleErrorLayer,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::{BoxError, ServiceBuilder};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::counter::RateWindowCounter;
use crate::dispatch::GuardDispatcher;
use crate::domain::ProtectionPolicy;
use crate::observability::MetricsRegistry;
use crate::store::{ConfigError, ConfigStore};

use super::request::ActionRequest;
use super::response::{ErrorResponse, HealthResponse, PolicyAck, ReadyResponse, ReloadAck};

/// Per-request deadline enforced by the middleware stack.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// In-flight request ceiling before load is shed.
const MAX_IN_FLIGHT: usize = 1024;

/// Shared application state.
pub struct AppState {
    /// Dispatch pipeline for action events
    pub dispatcher: GuardDispatcher,

    /// Live policy document
    pub store: Arc<ConfigStore>,

    /// Window counter table (exported as gauges)
    pub counters: Arc<RateWindowCounter>,

    /// Metrics registry
    pub metrics: Arc<MetricsRegistry>,

    /// Whether enforcement is active (observe mode when false)
    pub enforce: bool,

    /// Application start time
    pub start_time: Instant,

    /// Application version
    pub version: String,
}

fn guards_enabled(policy: &ProtectionPolicy) -> usize {
    policy.guards.values().filter(|g| g.enabled).count()
}

/// Create the application router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/guard/event", post(handle_event))
        .route("/v1/policy", get(handle_get_policy).put(handle_put_policy))
        .route("/v1/policy/reload", post(handle_reload_policy))
        .route("/health", get(handle_health))
        .route("/ready", get(handle_ready))
        .route("/metrics", get(handle_metrics))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .concurrency_limit(MAX_IN_FLIGHT)
                .timeout(REQUEST_TIMEOUT),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn handle_middleware_error(err: BoxError) -> (StatusCode, Json<ErrorResponse>) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (
            StatusCode::REQUEST_TIMEOUT,
            Json(ErrorResponse::new("request timed out", "TIMEOUT")),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(err.to_string(), "OVERLOADED")),
        )
    }
}

/// Handle one observed action.
async fn handle_event(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ActionRequest>,
) -> impl IntoResponse {
    let event = req.to_event();
    let report = state.dispatcher.dispatch(event).await;

    (StatusCode::OK, Json(report))
}

/// Return the live policy document.
async fn handle_get_policy(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.current().as_ref().clone())
}

/// Replace the whole policy document.
async fn handle_put_policy(
    State(state): State<Arc<AppState>>,
    Json(policy): Json<ProtectionPolicy>,
) -> axum::response::Response {
    match state.store.replace(policy).await {
        Ok(next) => {
            state.metrics.record_policy_replace(true);
            (
                StatusCode::OK,
                Json(PolicyAck {
                    version: next.version.clone(),
                    guards_enabled: guards_enabled(&next),
                }),
            )
                .into_response()
        }
        Err(e) => {
            state.metrics.record_policy_replace(false);
            match e {
                ConfigError::Validation(_) => (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse::bad_request(e.to_string())),
                )
                    .into_response(),
                _ => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse::internal_error(e.to_string())),
                )
                    .into_response(),
            }
        }
    }
}

/// Re-read the policy document from its backing store.
async fn handle_reload_policy(State(state): State<Arc<AppState>>) -> axum::response::Response {
    match state.store.reload().await {
        Ok(reloaded) => {
            let policy = state.store.current();
            (
                StatusCode::OK,
                Json(ReloadAck {
                    reloaded,
                    version: policy.version.clone(),
                }),
            )
                .into_response()
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::internal_error(e.to_string())),
        )
            .into_response(),
    }
}

/// Health check endpoint.
async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let policy = state.store.current();

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        policy_version: policy.version.clone(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

/// Readiness check endpoint.
async fn handle_ready(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let policy = state.store.current();

    Json(ReadyResponse {
        ready: true,
        policy_version: policy.version.clone(),
        guards_enabled: guards_enabled(&policy),
        enforce: state.enforce,
    })
}

/// Metrics endpoint (Prometheus format).
async fn handle_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let policy = state.store.current();

    let mut out = state.metrics.to_prometheus();
    out.push_str(&format!(
        r#"
# HELP guardr_uptime_seconds Application uptime in seconds
# TYPE guardr_uptime_seconds counter
guardr_uptime_seconds {}

# HELP guardr_counter_entries Live rate-limit window slots
# TYPE guardr_counter_entries gauge
guardr_counter_entries {}

# HELP guardr_guards_enabled Enabled guards in the live policy
# TYPE guardr_guards_enabled gauge
guardr_guards_enabled {}
"#,
        state.start_time.elapsed().as_secs(),
        state.counters.entry_count(),
        guards_enabled(&policy),
    ));

    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; charset=utf-8",
        )],
        out,
    )
}
