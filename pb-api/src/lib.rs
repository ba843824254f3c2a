//! pb-api library - analysis persistence and history server
//!
//! Records completed respiratory-sound analyses and serves a per-user,
//! newest-first history of them.

use axum::Router;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod pagination;
pub mod store;

pub use crate::error::{ApiError, ApiResult};
pub use crate::store::{AnalysisStore, MemoryStore, SqliteStore};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Analysis record store (SQLite or in-memory)
    pub store: Arc<dyn AnalysisStore>,
    /// Message returned by /api/ping
    pub ping_message: Arc<str>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Running on the in-memory store because the database could not be opened
    pub degraded: bool,
}

impl AppState {
    /// Create new application state
    pub fn new(store: Arc<dyn AnalysisStore>) -> Self {
        Self {
            store,
            ping_message: Arc::from("ping"),
            startup_time: Utc::now(),
            degraded: false,
        }
    }

    pub fn with_ping_message(mut self, message: impl Into<Arc<str>>) -> Self {
        self.ping_message = message.into();
        self
    }

    pub fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }
}

/// Build application router
///
/// CORS is permissive: the dashboard may be served from any origin.
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::analysis_routes())
        .merge(api::health_routes())
        .route("/api/buildinfo", get(api::get_build_info))
        .fallback(api::not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
