//! Health check and ping endpoints

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status ("ok", or "degraded" when running on the in-memory store
    /// after a database failure)
    pub status: String,
    /// Module name ("pb-api")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Active storage backend
    pub storage: String,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let status = if state.degraded { "degraded" } else { "ok" };

    Json(HealthResponse {
        status: status.to_string(),
        module: "pb-api".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        storage: state.store.backend().to_string(),
    })
}

/// Ping response
#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub message: String,
}

/// GET /api/ping
pub async fn ping(State(state): State<AppState>) -> Json<PingResponse> {
    Json(PingResponse {
        message: state.ping_message.to_string(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/ping", get(ping))
}
