//! Upload-and-result flow
//!
//! `select_file` (file picker) and `drop_file` (drag and drop) share one path:
//! validate, claim the session, run the prediction request under a progress
//! ticker, store the classified outcome, then hand persistence and the history
//! refresh to a background task.

use pb_common::config::DashboardConfig;
use pb_common::models::{PredictionResult, SaveAnalysisRequest};
use pb_common::validation::{validate_file, FileRejection};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api_client::{AnalysisApiClient, ClientError};
use crate::file::AudioFile;
use crate::history::{HistoryService, RefreshOutcome};
use crate::progress::ProgressTicker;
use crate::state::{AttemptGuard, DashboardState};
use crate::upload::{PredictionClient, UploadError};

/// How a candidate file reached the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPoint {
    Picker,
    Drop,
}

impl EntryPoint {
    fn as_str(&self) -> &'static str {
        match self {
            EntryPoint::Picker => "picker",
            EntryPoint::Drop => "drop",
        }
    }
}

/// Result of offering a file to the dashboard
#[derive(Debug)]
pub enum SelectionOutcome {
    /// An attempt was already in flight
    Ignored,
    /// Failed client-side validation; nothing was sent
    Rejected(FileRejection),
    Uploaded(AttemptReport),
}

/// Completed upload attempt
#[derive(Debug)]
pub struct AttemptReport {
    pub attempt: u64,
    pub outcome: Result<PredictionResult, UploadError>,
    /// False if the session moved on before the response arrived
    pub applied: bool,
    /// Persist-then-refresh task, spawned after a successful prediction when a
    /// user is known. Not awaited by the attempt itself.
    pub follow_up: Option<JoinHandle<()>>,
}

pub struct Dashboard {
    state: Arc<DashboardState>,
    predictor: PredictionClient,
    api: AnalysisApiClient,
    history: HistoryService,
    user_id: Option<String>,
    progress_interval: Duration,
}

impl Dashboard {
    pub fn new(config: &DashboardConfig, user_id: Option<String>) -> Result<Self, ClientError> {
        let timeout = Duration::from_secs(config.request_timeout_secs.max(1));
        let state = Arc::new(DashboardState::new());
        let api = AnalysisApiClient::new(&config.api_url, timeout)?;
        let history = HistoryService::new(api.clone(), state.clone(), config.history_limit);

        Ok(Self {
            predictor: PredictionClient::new(&config.analysis_api_url, timeout)?,
            api,
            history,
            state,
            user_id: user_id.filter(|id| !id.trim().is_empty()),
            progress_interval: Duration::from_millis(config.progress_interval_ms),
        })
    }

    pub fn state(&self) -> &Arc<DashboardState> {
        &self.state
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// File chosen with the picker
    pub async fn select_file(&self, file: AudioFile) -> SelectionOutcome {
        self.offer_file(file, EntryPoint::Picker).await
    }

    /// File dropped on the upload area
    pub async fn drop_file(&self, file: AudioFile) -> SelectionOutcome {
        self.offer_file(file, EntryPoint::Drop).await
    }

    /// Initial load of the history view once the user is known. A failed
    /// fetch leaves the view empty and is not fatal.
    pub async fn mount(&self) -> RefreshOutcome {
        let outcome = self.refresh_history().await;
        debug!(?outcome, "Dashboard mounted");
        outcome
    }

    /// Refresh the history view for the current user
    pub async fn refresh_history(&self) -> RefreshOutcome {
        match &self.user_id {
            Some(user_id) => self.history.refresh(user_id).await,
            None => RefreshOutcome::Skipped,
        }
    }

    /// Abandon any running attempt. Its late response will be ignored.
    pub fn reset(&self) {
        self.state.reset_session();
    }

    async fn offer_file(&self, file: AudioFile, entry: EntryPoint) -> SelectionOutcome {
        if self.state.is_in_flight() {
            debug!(file = %file.name, entry = entry.as_str(), "Upload in progress, ignoring file");
            return SelectionOutcome::Ignored;
        }

        if let Err(rejection) = validate_file(&file.mime_type, file.size) {
            info!(
                file = %file.name,
                mime = %file.mime_type,
                size = file.size,
                entry = entry.as_str(),
                reason = %rejection,
                "File rejected"
            );
            if !self.state.reject_file(&rejection.to_string()) {
                return SelectionOutcome::Ignored;
            }
            return SelectionOutcome::Rejected(rejection);
        }

        let Some(attempt) = self.state.begin_attempt(&file.name) else {
            return SelectionOutcome::Ignored;
        };
        info!(
            attempt,
            file = %file.name,
            size = file.size,
            entry = entry.as_str(),
            "Starting analysis"
        );

        SelectionOutcome::Uploaded(self.run_attempt(attempt, file).await)
    }

    async fn run_attempt(&self, attempt: u64, file: AudioFile) -> AttemptReport {
        // Dropped last: resets progress and in-flight on every path
        let _guard = AttemptGuard::new(self.state.clone(), attempt);
        let ticker = ProgressTicker::start(self.state.clone(), attempt, self.progress_interval);

        let outcome = match file.read().await {
            Ok(contents) => {
                self.predictor
                    .predict(&file, contents, self.user_id.as_deref())
                    .await
            }
            Err(e) => {
                warn!(attempt, file = %file.name, error = %e, "Failed to read file");
                Err(UploadError::Unreadable)
            }
        };

        ticker.stop().await;
        let applied = self.state.apply_outcome(attempt, &outcome);

        match &outcome {
            Ok(result) => info!(
                attempt,
                prediction = %result.prediction,
                confidence = result.confidence,
                "Analysis complete"
            ),
            Err(e) => warn!(attempt, error = %e, "Analysis failed"),
        }
        if !applied {
            debug!(attempt, "Attempt superseded, outcome discarded");
        }

        let follow_up = match (&outcome, &self.user_id) {
            (Ok(result), Some(user_id)) if applied => {
                let request = save_request(user_id, &file, result);
                Some(self.spawn_follow_up(attempt, user_id.clone(), request))
            }
            _ => None,
        };

        AttemptReport {
            attempt,
            outcome,
            applied,
            follow_up,
        }
    }

    /// Persist the analysis, then refresh history. A failed save is logged and
    /// flagged on the session; the displayed prediction is left alone.
    fn spawn_follow_up(&self, attempt: u64, user_id: String, request: SaveAnalysisRequest) -> JoinHandle<()> {
        let api = self.api.clone();
        let history = self.history.clone();
        let state = self.state.clone();

        tokio::spawn(async move {
            match api.save_analysis(&request).await {
                Ok(response) => {
                    info!(attempt, analysis_id = %response.analysis_id, "Analysis saved");
                }
                Err(e) => {
                    warn!(attempt, user_id = %user_id, error = %e, "Analysis save failed");
                    state.set_save_warning(attempt);
                }
            }
            history.refresh(&user_id).await;
        })
    }
}

fn save_request(user_id: &str, file: &AudioFile, result: &PredictionResult) -> SaveAnalysisRequest {
    SaveAnalysisRequest {
        user_id: Some(user_id.to_string()),
        file_name: Some(file.name.clone()),
        file_size: Some(file.size),
        duration: result.duration,
        mime_type: Some(file.mime_type.clone()),
        prediction: Some(result.prediction),
        confidence: Some(result.confidence),
        processing_time: result.processing_time,
        model_version: result.model_version.clone(),
    }
}
