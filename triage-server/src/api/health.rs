//! Health check endpoints (no authentication)

use axum::{extract::State, Json};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok", or "degraded" after a store error
    pub status: String,
    pub module: String,
    pub version: String,
    pub uptime_seconds: u64,
    /// Backing store backend name
    pub store: String,
    pub ai_enabled: bool,
    /// Last store error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

async fn health(state: &AppState, module: &str) -> HealthResponse {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let last_error = state.last_error.read().await.clone();

    HealthResponse {
        status: if last_error.is_some() { "degraded" } else { "ok" }.to_string(),
        module: module.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        store: state.store.backend_name().to_string(),
        ai_enabled: state.enricher.is_some(),
        last_error,
    }
}

/// GET /health on the customer surface
pub async fn customer_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health(&state, "review-triage-customer").await)
}

/// GET /health on the admin surface
pub async fn admin_health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health(&state, "review-triage-admin").await)
}
