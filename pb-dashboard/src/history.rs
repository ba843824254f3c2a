//! History service: fetch, format and publish a user's recent analyses

use chrono::{DateTime, Utc};
use pb_common::models::AnalysisSummary;
use pb_common::time::display_date;
use pb_common::Prediction;
use std::sync::Arc;

use crate::api_client::AnalysisApiClient;
use crate::state::DashboardState;

/// Display-ready analysis summary
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    /// e.g. "Mar 4, 2026" (UTC)
    pub date: String,
    pub file_name: String,
    pub prediction: Prediction,
    /// Capitalized prediction ("Healthy", "Copd", "Pneumonia")
    pub status: String,
    pub confidence: f64,
    /// Bytes; converted to MB when rendered
    pub file_size: u64,
    pub duration: Option<f64>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<AnalysisSummary> for HistoryEntry {
    fn from(summary: AnalysisSummary) -> Self {
        Self {
            date: display_date(&summary.uploaded_at),
            status: summary.prediction.label().to_string(),
            id: summary.id,
            file_name: summary.file_name,
            prediction: summary.prediction,
            confidence: summary.confidence,
            file_size: summary.file_size,
            duration: summary.duration,
            uploaded_at: summary.uploaded_at,
        }
    }
}

/// What a refresh did to the view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// List replaced with this many entries
    Applied(usize),
    /// A newer refresh was issued meanwhile; response discarded
    Superseded,
    /// Fetch failed; previous list kept
    Failed,
    /// No user to fetch for
    Skipped,
}

#[derive(Clone)]
pub struct HistoryService {
    client: AnalysisApiClient,
    state: Arc<DashboardState>,
    limit: u32,
}

impl HistoryService {
    pub fn new(client: AnalysisApiClient, state: Arc<DashboardState>, limit: u32) -> Self {
        Self {
            client,
            state,
            limit: limit.max(1),
        }
    }

    /// Fetch the newest `limit` analyses for `user_id` and replace the view.
    ///
    /// Refreshes may overlap; only the response to the most recently issued
    /// refresh is applied.
    pub async fn refresh(&self, user_id: &str) -> RefreshOutcome {
        if user_id.trim().is_empty() {
            return RefreshOutcome::Skipped;
        }

        let ticket = self.state.begin_history_fetch();
        tracing::debug!(user_id = %user_id, ticket, "Fetching history");

        match self.client.history(user_id, self.limit, 0).await {
            Ok(response) => {
                let entries: Vec<HistoryEntry> =
                    response.analyses.into_iter().map(HistoryEntry::from).collect();
                let count = entries.len();
                if self.state.apply_history(ticket, entries) {
                    RefreshOutcome::Applied(count)
                } else {
                    tracing::debug!(ticket, "Discarding superseded history response");
                    RefreshOutcome::Superseded
                }
            }
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Failed to fetch test history");
                if self.state.history_fetch_failed(ticket) {
                    RefreshOutcome::Failed
                } else {
                    RefreshOutcome::Superseded
                }
            }
        }
    }
}
