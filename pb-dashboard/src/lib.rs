//! pb-dashboard library - upload client and history view
//!
//! Validates a respiratory recording, sends it to the prediction service,
//! shows the classified result, records it through pb-api and keeps a
//! most-recent-first history of the user's analyses.

pub mod api_client;
pub mod dashboard;
pub mod file;
pub mod history;
pub mod progress;
pub mod render;
pub mod state;
pub mod upload;

pub use crate::api_client::{AnalysisApiClient, ClientError};
pub use crate::dashboard::{AttemptReport, Dashboard, EntryPoint, SelectionOutcome};
pub use crate::file::AudioFile;
pub use crate::history::{HistoryEntry, HistoryService, RefreshOutcome};
pub use crate::state::{DashboardEvent, DashboardState, HistoryView, UploadSession};
pub use crate::upload::{PredictionClient, UploadError};
