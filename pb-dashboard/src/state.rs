//! Shared dashboard state
//!
//! Holds the upload session and the history view behind sync locks so the
//! attempt guard can reset the session from `Drop`. Every mutation made on
//! behalf of an upload attempt carries the attempt number and is dropped if a
//! newer attempt (or a reset) has replaced it. History responses carry a
//! ticket and are applied only when the ticket is the latest issued.

use pb_common::models::PredictionResult;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

use crate::history::HistoryEntry;
use crate::progress::next_progress;
use crate::upload::UploadError;

/// Warning shown when the analysis could not be recorded
pub const SAVE_WARNING: &str = "Result could not be saved to your history";

/// Transient per-attempt state of the upload panel
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadSession {
    /// Number of the current (or last) attempt, 0 before the first one
    pub attempt: u64,
    /// Name of the file being or last analyzed
    pub selected_file: Option<String>,
    /// Client-side validation message
    pub file_error: Option<String>,
    /// Synthetic progress, 0-100
    pub progress: u8,
    pub in_flight: bool,
    pub prediction: Option<PredictionResult>,
    pub upload_error: Option<UploadError>,
    /// Non-modal notice that the result was not persisted
    pub save_warning: Option<String>,
}

impl UploadSession {
    /// The message for the error panel, validation errors first
    pub fn error_message(&self) -> Option<String> {
        self.file_error
            .clone()
            .or_else(|| self.upload_error.as_ref().map(|e| e.to_string()))
    }
}

/// Most-recent-first analysis summaries, replaced wholesale on each refresh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryView {
    pub entries: Vec<HistoryEntry>,
    pub loading: bool,
    /// Latest refresh ticket issued
    pub latest_ticket: u64,
}

/// Dashboard events for front ends
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    FileRejected { message: String },
    AttemptStarted { attempt: u64, file_name: String },
    Progress { attempt: u64, percent: u8 },
    PredictionReady { attempt: u64 },
    UploadFailed { attempt: u64, message: String },
    AttemptFinished { attempt: u64 },
    SaveFailed { attempt: u64 },
    HistoryUpdated { entries: usize },
}

/// State shared between the dashboard, its background tasks and front ends
pub struct DashboardState {
    session: RwLock<UploadSession>,
    history: RwLock<HistoryView>,
    event_tx: broadcast::Sender<DashboardEvent>,
}

impl DashboardState {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(100);
        Self {
            session: RwLock::new(UploadSession::default()),
            history: RwLock::new(HistoryView::default()),
            event_tx,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.event_tx.subscribe()
    }

    fn broadcast_event(&self, event: DashboardEvent) {
        // No receivers is fine
        let _ = self.event_tx.send(event);
    }

    // A panicking writer leaves plain data behind; keep using it.
    fn read_session(&self) -> RwLockReadGuard<'_, UploadSession> {
        self.session.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_session(&self) -> RwLockWriteGuard<'_, UploadSession> {
        self.session.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_history(&self) -> RwLockReadGuard<'_, HistoryView> {
        self.history.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_history(&self) -> RwLockWriteGuard<'_, HistoryView> {
        self.history.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the upload session
    pub fn session(&self) -> UploadSession {
        self.read_session().clone()
    }

    /// Snapshot of the history view
    pub fn history(&self) -> HistoryView {
        self.read_history().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.read_session().in_flight
    }

    /// Record a validation failure. Ignored (returns false) while an attempt
    /// is in flight.
    pub fn reject_file(&self, message: &str) -> bool {
        {
            let mut session = self.write_session();
            if session.in_flight {
                return false;
            }
            session.file_error = Some(message.to_string());
            session.upload_error = None;
            session.selected_file = None;
        }
        self.broadcast_event(DashboardEvent::FileRejected {
            message: message.to_string(),
        });
        true
    }

    /// Start a new attempt unless one is already in flight.
    ///
    /// Checking and claiming the in-flight flag happen under one lock, so two
    /// concurrent selections cannot both start. Prior results are cleared.
    pub fn begin_attempt(&self, file_name: &str) -> Option<u64> {
        let attempt = {
            let mut session = self.write_session();
            if session.in_flight {
                return None;
            }
            let attempt = session.attempt + 1;
            *session = UploadSession {
                attempt,
                selected_file: Some(file_name.to_string()),
                in_flight: true,
                ..UploadSession::default()
            };
            attempt
        };
        self.broadcast_event(DashboardEvent::AttemptStarted {
            attempt,
            file_name: file_name.to_string(),
        });
        Some(attempt)
    }

    /// One synthetic progress step for `attempt`
    pub fn advance_progress(&self, attempt: u64) -> bool {
        let percent = {
            let mut session = self.write_session();
            if session.attempt != attempt || !session.in_flight {
                return false;
            }
            session.progress = next_progress(session.progress);
            session.progress
        };
        self.broadcast_event(DashboardEvent::Progress { attempt, percent });
        true
    }

    /// Store the classified outcome of `attempt` and set progress to 100.
    ///
    /// Returns false if the attempt is no longer current; the outcome is then
    /// discarded.
    pub fn apply_outcome(&self, attempt: u64, outcome: &Result<PredictionResult, UploadError>) -> bool {
        {
            let mut session = self.write_session();
            if session.attempt != attempt || !session.in_flight {
                return false;
            }
            session.progress = 100;
            match outcome {
                Ok(prediction) => {
                    session.prediction = Some(prediction.clone());
                    session.upload_error = None;
                    session.file_error = None;
                }
                Err(error) => {
                    session.prediction = None;
                    session.upload_error = Some(error.clone());
                }
            }
        }

        let event = match outcome {
            Ok(_) => DashboardEvent::PredictionReady { attempt },
            Err(error) => DashboardEvent::UploadFailed {
                attempt,
                message: error.to_string(),
            },
        };
        self.broadcast_event(event);
        true
    }

    /// Final reset of `attempt`: progress back to 0, in-flight cleared
    pub fn finish_attempt(&self, attempt: u64) -> bool {
        {
            let mut session = self.write_session();
            if session.attempt != attempt || !session.in_flight {
                return false;
            }
            session.progress = 0;
            session.in_flight = false;
        }
        self.broadcast_event(DashboardEvent::AttemptFinished { attempt });
        true
    }

    /// Flag that `attempt`'s result was not persisted
    pub fn set_save_warning(&self, attempt: u64) -> bool {
        {
            let mut session = self.write_session();
            if session.attempt != attempt {
                return false;
            }
            session.save_warning = Some(SAVE_WARNING.to_string());
        }
        self.broadcast_event(DashboardEvent::SaveFailed { attempt });
        true
    }

    /// Abandon whatever attempt is running and clear the session.
    ///
    /// The attempt counter keeps increasing so late results of the abandoned
    /// attempt are recognized as stale.
    pub fn reset_session(&self) {
        let mut session = self.write_session();
        let attempt = session.attempt + 1;
        *session = UploadSession {
            attempt,
            ..UploadSession::default()
        };
    }

    /// Issue a new refresh ticket and mark the view as loading
    pub fn begin_history_fetch(&self) -> u64 {
        let mut history = self.write_history();
        history.latest_ticket += 1;
        history.loading = true;
        history.latest_ticket
    }

    /// Replace the list with `entries` if `ticket` is still the latest
    pub fn apply_history(&self, ticket: u64, entries: Vec<HistoryEntry>) -> bool {
        let count = entries.len();
        {
            let mut history = self.write_history();
            if history.latest_ticket != ticket {
                return false;
            }
            history.entries = entries;
            history.loading = false;
        }
        self.broadcast_event(DashboardEvent::HistoryUpdated { entries: count });
        true
    }

    /// A fetch failed: stop loading, keep the current list
    pub fn history_fetch_failed(&self, ticket: u64) -> bool {
        let mut history = self.write_history();
        if history.latest_ticket != ticket {
            return false;
        }
        history.loading = false;
        true
    }
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new()
    }
}

/// Resets the session for one attempt when dropped.
///
/// Held for the whole attempt so the reset runs on every exit path, including
/// early returns and unwinding.
pub struct AttemptGuard {
    state: Arc<DashboardState>,
    attempt: u64,
}

impl AttemptGuard {
    pub fn new(state: Arc<DashboardState>, attempt: u64) -> Self {
        Self { state, attempt }
    }
}

impl Drop for AttemptGuard {
    fn drop(&mut self) {
        self.state.finish_attempt(self.attempt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pb_common::Prediction;

    fn prediction() -> PredictionResult {
        PredictionResult {
            prediction: Prediction::Copd,
            confidence: 0.87,
            duration: None,
            processing_time: None,
            model_version: None,
        }
    }

    fn entry(name: &str) -> HistoryEntry {
        HistoryEntry {
            id: name.to_string(),
            date: "Jan 1, 2026".to_string(),
            file_name: name.to_string(),
            prediction: Prediction::Healthy,
            status: "Healthy".to_string(),
            confidence: 0.9,
            file_size: 1024,
            duration: None,
            uploaded_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_begin_attempt_is_exclusive() {
        let state = DashboardState::new();
        assert_eq!(state.begin_attempt("a.wav"), Some(1));
        assert_eq!(state.begin_attempt("b.wav"), None);
        assert_eq!(state.session().selected_file.as_deref(), Some("a.wav"));

        state.finish_attempt(1);
        assert_eq!(state.begin_attempt("b.wav"), Some(2));
    }

    #[test]
    fn test_begin_attempt_clears_previous_result() {
        let state = DashboardState::new();
        let attempt = state.begin_attempt("a.wav").unwrap();
        state.apply_outcome(attempt, &Ok(prediction()));
        state.set_save_warning(attempt);
        state.finish_attempt(attempt);

        state.begin_attempt("b.wav").unwrap();
        let session = state.session();
        assert!(session.prediction.is_none());
        assert!(session.save_warning.is_none());
        assert!(session.in_flight);
        assert_eq!(session.progress, 0);
    }

    #[test]
    fn test_progress_steps_and_caps() {
        let state = DashboardState::new();
        let attempt = state.begin_attempt("a.wav").unwrap();
        for _ in 0..20 {
            state.advance_progress(attempt);
        }
        assert_eq!(state.session().progress, 90);

        state.apply_outcome(attempt, &Err(UploadError::Connection));
        assert_eq!(state.session().progress, 100);

        state.finish_attempt(attempt);
        let session = state.session();
        assert_eq!(session.progress, 0);
        assert!(!session.in_flight);
        assert_eq!(session.upload_error, Some(UploadError::Connection));
    }

    #[test]
    fn test_stale_attempt_is_ignored() {
        let state = DashboardState::new();
        let old = state.begin_attempt("a.wav").unwrap();
        state.reset_session();
        let new = state.begin_attempt("b.wav").unwrap();
        assert_ne!(old, new);

        assert!(!state.advance_progress(old));
        assert!(!state.apply_outcome(old, &Ok(prediction())));
        assert!(!state.finish_attempt(old));
        assert!(!state.set_save_warning(old));

        let session = state.session();
        assert!(session.in_flight);
        assert!(session.prediction.is_none());
        assert_eq!(session.selected_file.as_deref(), Some("b.wav"));
    }

    #[test]
    fn test_reject_file_while_in_flight_is_ignored() {
        let state = DashboardState::new();
        state.begin_attempt("a.wav").unwrap();
        assert!(!state.reject_file("File size exceeds 10MB limit"));
        assert!(state.session().file_error.is_none());
    }

    #[test]
    fn test_reject_file_clears_selection() {
        let state = DashboardState::new();
        let attempt = state.begin_attempt("a.wav").unwrap();
        state.apply_outcome(attempt, &Err(UploadError::Server(503)));
        state.finish_attempt(attempt);

        assert!(state.reject_file("Please upload a valid audio file (WAV or MP3)"));
        let session = state.session();
        assert!(session.selected_file.is_none());
        assert!(session.upload_error.is_none());
        assert_eq!(
            session.error_message().as_deref(),
            Some("Please upload a valid audio file (WAV or MP3)")
        );
    }

    #[test]
    fn test_attempt_guard_resets_on_drop() {
        let state = Arc::new(DashboardState::new());
        let attempt = state.begin_attempt("a.wav").unwrap();
        state.advance_progress(attempt);
        {
            let _guard = AttemptGuard::new(state.clone(), attempt);
        }
        let session = state.session();
        assert!(!session.in_flight);
        assert_eq!(session.progress, 0);
    }

    #[test]
    fn test_attempt_guard_resets_on_panic() {
        let state = Arc::new(DashboardState::new());
        let attempt = state.begin_attempt("a.wav").unwrap();

        let inner = state.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = AttemptGuard::new(inner, attempt);
            panic!("analysis blew up");
        }));
        assert!(result.is_err());
        assert!(!state.is_in_flight());
    }

    #[test]
    fn test_only_latest_history_ticket_applies() {
        let state = DashboardState::new();
        let first = state.begin_history_fetch();
        let second = state.begin_history_fetch();

        // Second response arrives first
        assert!(state.apply_history(second, vec![entry("new.wav")]));
        // The older response is discarded
        assert!(!state.apply_history(first, vec![entry("old.wav")]));

        let view = state.history();
        assert_eq!(view.entries.len(), 1);
        assert_eq!(view.entries[0].file_name, "new.wav");
        assert!(!view.loading);
    }

    #[test]
    fn test_history_failure_keeps_list() {
        let state = DashboardState::new();
        let ticket = state.begin_history_fetch();
        state.apply_history(ticket, vec![entry("a.wav")]);

        let ticket = state.begin_history_fetch();
        assert!(state.history().loading);
        assert!(state.history_fetch_failed(ticket));

        let view = state.history();
        assert!(!view.loading);
        assert_eq!(view.entries.len(), 1);
    }

    #[tokio::test]
    async fn test_events_are_broadcast() {
        let state = DashboardState::new();
        let mut events = state.subscribe_events();

        let attempt = state.begin_attempt("a.wav").unwrap();
        state.advance_progress(attempt);

        assert_eq!(
            events.recv().await.unwrap(),
            DashboardEvent::AttemptStarted {
                attempt,
                file_name: "a.wav".to_string()
            }
        );
        assert_eq!(
            events.recv().await.unwrap(),
            DashboardEvent::Progress { attempt, percent: 10 }
        );
    }
}
