//! Health check endpoint
//!
//! Reports uptime, the most recent failure, and which backends are usable.
//! A service with at least one disabled backend reports `degraded`.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Availability of one backend
#[derive(Debug, Serialize)]
pub struct BackendHealth {
    /// `lr`, `cnn` or `rnn`
    pub kind: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    pub module: String,
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Last error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub backends: Vec<BackendHealth>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();

    let backends: Vec<BackendHealth> = state
        .pipeline
        .invoker()
        .status()
        .into_iter()
        .map(|status| BackendHealth {
            kind: status.kind.as_str().to_string(),
            available: status.available,
            detail: status.detail,
        })
        .collect();

    let status = if backends.iter().all(|b| b.available) {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        module: "glyph-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        last_error,
        backends,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
