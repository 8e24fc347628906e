//! Status Routes
//!
//! Health checks and metrics.
//!
//! Routes:
//! - GET /health - Basic health check
//! - GET /health/ready - Readiness check (record store and storage root)
//! - GET /health/live - Liveness check (server responding)
//! - GET /metrics - Prometheus metrics endpoint

use std::sync::OnceLock;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::AppState;

static STARTUP_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize startup time. Call this once at server start.
pub fn init_startup_time() {
    let _ = STARTUP_TIME.get_or_init(Instant::now);
}

/// Get uptime in seconds since server start.
fn get_uptime_seconds() -> u64 {
    STARTUP_TIME
        .get()
        .map(|start| start.elapsed().as_secs())
        .unwrap_or(0)
}

/// Build status routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/health/live", get(liveness_check))
        .route("/metrics", get(prometheus_metrics))
}

// ============================================================================
// Response Types
// ============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub checks: Vec<DependencyCheck>,
}

#[derive(Debug, Serialize)]
pub struct DependencyCheck {
    pub name: String,
    pub status: HealthStatus,
    pub latency_ms: Option<u64>,
    pub message: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Basic health check.
///
/// GET /health
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        version: env!("CARGO_PKG_VERSION").into(),
        timestamp: Utc::now(),
    })
}

/// Readiness check.
///
/// GET /health/ready
///
/// Returns 503 unless the record store answers and the storage root is
/// writable.
#[axum::debug_handler]
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let checks = vec![check_records(&state).await, check_storage(&state).await];
    let ready = checks.iter().all(|c| c.status == HealthStatus::Healthy);

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(ReadinessResponse { ready, checks }))
}

/// Liveness check.
///
/// GET /health/live
async fn liveness_check() -> StatusCode {
    StatusCode::OK
}

/// Prometheus metrics.
///
/// GET /metrics
async fn prometheus_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.attachments.stats();

    let metrics = format!(
        r#"# HELP annex_uploads_total Attachments uploaded
# TYPE annex_uploads_total counter
annex_uploads_total {}

# HELP annex_fetches_total Attachments downloaded
# TYPE annex_fetches_total counter
annex_fetches_total {}

# HELP annex_deletions_total Single attachments deleted
# TYPE annex_deletions_total counter
annex_deletions_total {}

# HELP annex_clears_total Fields whose attachments were all deleted
# TYPE annex_clears_total counter
annex_clears_total {}

# HELP annex_link_sync_failures_total Storage changes whose link field update failed
# TYPE annex_link_sync_failures_total counter
annex_link_sync_failures_total {}

# HELP annex_uptime_seconds Seconds since server start
# TYPE annex_uptime_seconds gauge
annex_uptime_seconds {}

# HELP annex_up Whether the service is up
# TYPE annex_up gauge
annex_up 1
"#,
        stats.uploads,
        stats.fetches,
        stats.deletions,
        stats.clears,
        stats.link_sync_failures,
        get_uptime_seconds(),
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4; charset=utf-8")],
        metrics,
    )
}

// ============================================================================
// Helper Functions
// ============================================================================

async fn check_records(state: &AppState) -> DependencyCheck {
    let start = Instant::now();
    let result = state.attachments.records().ping().await;
    dependency("record_store", start, result.map_err(|e| e.to_string()))
}

async fn check_storage(state: &AppState) -> DependencyCheck {
    let start = Instant::now();
    let result = state.attachments.store().check_writable().await;
    dependency("storage", start, result.map_err(|e| e.to_string()))
}

fn dependency(
    name: &str,
    start: Instant,
    result: std::result::Result<(), String>,
) -> DependencyCheck {
    let latency_ms = Some(start.elapsed().as_millis() as u64);
    match result {
        Ok(()) => DependencyCheck {
            name: name.into(),
            status: HealthStatus::Healthy,
            latency_ms,
            message: None,
        },
        Err(message) => DependencyCheck {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            latency_ms,
            message: Some(message),
        },
    }
}
