use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;
use crate::store::migrate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/database", get(database_health))
}

pub async fn health_check(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptimeSecs": state.uptime_secs(),
        "activeSessions": state.sessions().len().await,
    }))
}

pub async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Ready once migrations have brought the store to the latest schema.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match migrate::get_current_version(state.store()) {
        Ok(version) if version >= migrate::latest_version() => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub async fn database_health(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    let start = Instant::now();
    let healthy = state.store().get_settings().is_ok();
    let latency_us = start.elapsed().as_micros() as u64;

    Json(serde_json::json!({
        "healthy": healthy,
        "latencyUs": latency_us,
    }))
}
