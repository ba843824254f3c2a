//! Analysis persistence and history endpoints
//!
//! - POST /api/analysis/save
//! - GET  /api/analysis/history/:user_id?limit=&skip=

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pb_common::config::StorageBackend;
use pb_common::models::{AnalysisSummary, HistoryResponse, SaveAnalysisRequest, SaveAnalysisResponse};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::pagination::HistoryWindow;
use crate::AppState;

/// Query parameters for history paging
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
    pub skip: Option<u32>,
}

/// POST /api/analysis/save
///
/// Validates the mandatory fields, assigns id and timestamps, and inserts
/// the record. Returns 201 with the new id.
pub async fn save_analysis(
    State(state): State<AppState>,
    payload: Result<Json<SaveAnalysisRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<SaveAnalysisResponse>)> {
    let Json(request) = payload?;

    let record = request.into_record(pb_common::time::now())?;
    let analysis_id = record.id.clone();
    let user_id = record.user_id.clone();
    let prediction = record.prediction;

    state.store.insert(record).await?;

    tracing::info!(
        analysis_id = %analysis_id,
        user_id = %user_id,
        prediction = %prediction,
        backend = %state.store.backend(),
        "Analysis saved"
    );

    let message = match state.store.backend() {
        StorageBackend::Sqlite => "Analysis saved successfully",
        StorageBackend::Memory => "Analysis saved successfully (in-memory)",
    };

    Ok((
        StatusCode::CREATED,
        Json(SaveAnalysisResponse {
            message: message.to_string(),
            analysis_id,
        }),
    ))
}

/// GET /api/analysis/history/:user_id
///
/// Newest first, paged by skip/limit, with total count and `hasMore`.
pub async fn get_history(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Json<HistoryResponse>> {
    if user_id.trim().is_empty() {
        return Err(missing_user_id());
    }
    let Query(query) = query?;
    let window = HistoryWindow::new(query.limit, query.skip);

    let slice = state.store.query_by_user(&user_id, window).await?;
    let has_more = window.has_more(slice.total, slice.records.len());

    tracing::debug!(
        user_id = %user_id,
        returned = slice.records.len(),
        total = slice.total,
        "History query"
    );

    Ok(Json(HistoryResponse {
        analyses: slice.records.into_iter().map(AnalysisSummary::from).collect(),
        total: slice.total,
        has_more,
    }))
}

/// GET /api/analysis/history without a user id
pub async fn history_without_user() -> ApiError {
    missing_user_id()
}

fn missing_user_id() -> ApiError {
    ApiError::BadRequest("User ID is required".to_string())
}

/// Build analysis routes
pub fn analysis_routes() -> Router<AppState> {
    Router::new()
        .route("/api/analysis/save", post(save_analysis))
        .route("/api/analysis/history", get(history_without_user))
        .route("/api/analysis/history/", get(history_without_user))
        .route("/api/analysis/history/:user_id", get(get_history))
}
