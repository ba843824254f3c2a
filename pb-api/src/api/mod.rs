//! HTTP API handlers for pb-api

pub mod analysis;
pub mod buildinfo;
pub mod health;

pub use analysis::{analysis_routes, get_history, save_analysis};
pub use buildinfo::get_build_info;
pub use health::{health_check, health_routes, ping};

use axum::http::Uri;

use crate::error::ApiError;

/// Fallback for unmatched paths
pub async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
