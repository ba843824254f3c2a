//! End-to-end tests for the upload-and-result flow
//!
//! A mock prediction service and a real pb-api router are served on
//! 127.0.0.1 ephemeral ports; the dashboard talks to both over HTTP.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Router,
};
use pb_api::{build_router, AppState, MemoryStore};
use pb_common::config::DashboardConfig;
use pb_common::models::SaveAnalysisRequest;
use pb_common::Prediction;
use pb_dashboard::render::{render_history, render_session};
use pb_dashboard::{
    AnalysisApiClient, AudioFile, Dashboard, DashboardEvent, RefreshOutcome, SelectionOutcome,
    UploadError,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Test servers
// =============================================================================

#[derive(Debug, Clone)]
struct CapturedRequest {
    content_type: String,
    body: Vec<u8>,
}

impl CapturedRequest {
    fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Clone)]
struct MockPredictor {
    status: StatusCode,
    body: String,
    delay: Duration,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockPredictor {
    fn new(status: StatusCode, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn predict(State(mock): State<MockPredictor>, headers: HeaderMap, body: Bytes) -> (StatusCode, String) {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    mock.requests.lock().unwrap().push(CapturedRequest {
        content_type,
        body: body.to_vec(),
    });
    tokio::time::sleep(mock.delay).await;
    (mock.status, mock.body.clone())
}

/// Serve `router` on an ephemeral port, returning its base URL
async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn serve_predictor(mock: &MockPredictor) -> String {
    serve(Router::new().route("/predict", post(predict)).with_state(mock.clone())).await
}

async fn serve_api() -> String {
    serve(build_router(AppState::new(Arc::new(MemoryStore::new())))).await
}

/// A base URL with nothing listening behind it
async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

fn config(analysis_api_url: &str, api_url: &str) -> DashboardConfig {
    DashboardConfig {
        analysis_api_url: analysis_api_url.to_string(),
        api_url: api_url.to_string(),
        history_limit: 10,
        progress_interval_ms: 50,
        request_timeout_secs: 5,
    }
}

fn wav(name: &str) -> AudioFile {
    AudioFile::from_bytes(name, "audio/wav", b"RIFF\x24\x00\x00\x00WAVEfmt ".to_vec())
}

fn assert_settled(dashboard: &Dashboard) {
    let session = dashboard.state().session();
    assert!(!session.in_flight, "attempt left in flight");
    assert_eq!(session.progress, 0, "progress not reset");
}

fn uploaded(outcome: SelectionOutcome) -> pb_dashboard::AttemptReport {
    match outcome {
        SelectionOutcome::Uploaded(report) => report,
        other => panic!("expected upload, got {other:?}"),
    }
}

// =============================================================================
// Successful analyses
// =============================================================================

#[tokio::test]
async fn test_copd_result_is_shown_persisted_and_listed() {
    let mock = MockPredictor::new(StatusCode::OK, r#"{"prediction":"copd","confidence":0.87}"#);
    let analysis_url = serve_predictor(&mock).await;
    let api_url = serve_api().await;
    let dashboard = Dashboard::new(&config(&analysis_url, &api_url), Some("u1".to_string())).unwrap();

    let report = uploaded(dashboard.select_file(wav("cough.wav")).await);
    assert!(report.applied);
    assert_eq!(report.outcome.as_ref().unwrap().prediction, Prediction::Copd);
    assert_settled(&dashboard);

    let text = render_session(&dashboard.state().session());
    assert!(text.contains("File uploaded and analyzed successfully!"));
    assert!(text.contains("Disease Detected"));
    assert!(text.contains("Confidence: 87.0%"));
    assert!(text.contains("COPD - General Prevention & Management (5 Steps)"));

    // The request carried the file and the user id
    let requests = mock.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].content_type.starts_with("multipart/form-data"));
    let body = requests[0].body_text();
    assert!(body.contains(r#"name="file"; filename="cough.wav""#));
    assert!(body.contains("audio/wav"));
    assert!(body.contains(r#"name="userId""#));
    assert!(body.contains("u1"));

    // Persist then refresh
    report.follow_up.expect("follow-up task").await.unwrap();
    let history = dashboard.state().history();
    assert_eq!(history.entries.len(), 1);
    let entry = &history.entries[0];
    assert_eq!(entry.file_name, "cough.wav");
    assert_eq!(entry.prediction, Prediction::Copd);
    assert_eq!(entry.status, "Copd");
    assert_eq!(entry.confidence, 0.87);
    assert!(dashboard.state().session().save_warning.is_none());
}

#[tokio::test]
async fn test_healthy_result_without_user() {
    let mock = MockPredictor::new(StatusCode::OK, r#"{"prediction":"healthy","confidence":0.95}"#);
    let analysis_url = serve_predictor(&mock).await;
    let api_url = serve_api().await;
    let dashboard = Dashboard::new(&config(&analysis_url, &api_url), None).unwrap();

    let report = uploaded(dashboard.drop_file(wav("breath.wav")).await);
    assert!(report.outcome.is_ok());
    // Nothing to persist without a user
    assert!(report.follow_up.is_none());
    assert_settled(&dashboard);

    let text = render_session(&dashboard.state().session());
    assert!(text.contains("Healthy Patient"));
    assert!(text.contains("Healthy Individuals - General Prevention (5 Steps)"));
    assert!(!text.contains("Available Specialists"));

    assert!(!mock.requests()[0].body_text().contains(r#"name="userId""#));
}

#[tokio::test]
async fn test_zero_confidence_is_persisted() {
    let mock = MockPredictor::new(StatusCode::OK, r#"{"prediction":"pneumonia","confidence":0}"#);
    let analysis_url = serve_predictor(&mock).await;
    let api_url = serve_api().await;
    let dashboard = Dashboard::new(&config(&analysis_url, &api_url), Some("u1".to_string())).unwrap();

    let report = uploaded(dashboard.select_file(wav("a.wav")).await);
    report.follow_up.unwrap().await.unwrap();

    assert!(dashboard.state().session().save_warning.is_none());
    let history = dashboard.state().history();
    assert_eq!(history.entries.len(), 1);
    assert_eq!(history.entries[0].confidence, 0.0);
}

// =============================================================================
// Classified failures
// =============================================================================

async fn failed_upload(status: StatusCode, body: &str) -> (UploadError, Dashboard, String) {
    let mock = MockPredictor::new(status, body);
    let analysis_url = serve_predictor(&mock).await;
    let api_url = serve_api().await;
    let dashboard = Dashboard::new(&config(&analysis_url, &api_url), Some("u1".to_string())).unwrap();

    let report = uploaded(dashboard.select_file(wav("a.wav")).await);
    assert!(report.follow_up.is_none(), "failed attempt must not persist");
    assert_settled(&dashboard);
    (report.outcome.unwrap_err(), dashboard, api_url)
}

#[tokio::test]
async fn test_bad_request_is_format_error() {
    let (error, dashboard, api_url) = failed_upload(StatusCode::BAD_REQUEST, "bad audio").await;
    assert_eq!(error, UploadError::InvalidAudio);

    let text = render_session(&dashboard.state().session());
    assert!(text.contains("Upload/Analysis Error"));
    assert!(text.contains("Invalid file format or corrupted audio"));

    // No record was persisted
    let client = AnalysisApiClient::new(&api_url, Duration::from_secs(5)).unwrap();
    assert_eq!(client.history("u1", 10, 0).await.unwrap().total, 0);
}

#[tokio::test]
async fn test_server_error() {
    let (error, dashboard, _) = failed_upload(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
    assert_eq!(error, UploadError::Server(500));
    assert_eq!(
        dashboard.state().session().error_message().as_deref(),
        Some("Server error - please try again later")
    );
}

#[tokio::test]
async fn test_other_status_is_connection_error() {
    let (error, _, _) = failed_upload(StatusCode::NOT_FOUND, "").await;
    assert_eq!(error, UploadError::Connection);
}

#[tokio::test]
async fn test_malformed_success_body() {
    let (error, dashboard, _) =
        failed_upload(StatusCode::OK, r#"{"prediction":"asthma","confidence":0.5}"#).await;
    assert_eq!(error, UploadError::MalformedResponse);
    assert!(dashboard.state().session().prediction.is_none());
}

#[tokio::test]
async fn test_unreachable_prediction_service() {
    let api_url = serve_api().await;
    let dashboard = Dashboard::new(&config(&closed_url().await, &api_url), None).unwrap();

    let report = uploaded(dashboard.select_file(wav("a.wav")).await);
    assert_eq!(report.outcome.unwrap_err(), UploadError::Connection);
    assert_eq!(
        dashboard.state().session().error_message().as_deref(),
        Some("Upload failed - please check your connection")
    );
    assert_settled(&dashboard);
}

#[tokio::test]
async fn test_unreadable_file() {
    let mock = MockPredictor::new(StatusCode::OK, r#"{"prediction":"healthy","confidence":0.9}"#);
    let analysis_url = serve_predictor(&mock).await;
    let dashboard = Dashboard::new(&config(&analysis_url, &closed_url().await), None).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gone.wav");
    std::fs::write(&path, b"RIFF\x24\x00\x00\x00WAVEfmt ").unwrap();
    let file = AudioFile::from_path(&path, None).await.unwrap();
    std::fs::remove_file(&path).unwrap();

    let report = uploaded(dashboard.select_file(file).await);
    assert_eq!(report.outcome.unwrap_err(), UploadError::Unreadable);
    assert!(mock.requests().is_empty());
    assert_settled(&dashboard);
}

#[tokio::test]
async fn test_rejected_file_never_reaches_network() {
    let mock = MockPredictor::new(StatusCode::OK, r#"{"prediction":"healthy","confidence":0.9}"#);
    let analysis_url = serve_predictor(&mock).await;
    let dashboard = Dashboard::new(&config(&analysis_url, &closed_url().await), None).unwrap();

    let flac = AudioFile::from_bytes("a.flac", "audio/flac", vec![0; 32]);
    assert!(matches!(
        dashboard.select_file(flac).await,
        SelectionOutcome::Rejected(_)
    ));
    let huge = AudioFile::from_bytes("a.wav", "audio/wav", vec![0; 10 * 1024 * 1024 + 1]);
    assert!(matches!(
        dashboard.drop_file(huge).await,
        SelectionOutcome::Rejected(_)
    ));

    assert!(mock.requests().is_empty());
    assert_eq!(
        dashboard.state().session().error_message().as_deref(),
        Some("File size exceeds 10MB limit")
    );
}

// =============================================================================
// Persistence and history
// =============================================================================

#[tokio::test]
async fn test_failed_save_sets_warning_but_keeps_prediction() {
    let mock = MockPredictor::new(StatusCode::OK, r#"{"prediction":"copd","confidence":0.6}"#);
    let analysis_url = serve_predictor(&mock).await;
    let dashboard =
        Dashboard::new(&config(&analysis_url, &closed_url().await), Some("u1".to_string())).unwrap();

    let report = uploaded(dashboard.select_file(wav("a.wav")).await);
    report.follow_up.unwrap().await.unwrap();

    let session = dashboard.state().session();
    assert_eq!(session.prediction.unwrap().prediction, Prediction::Copd);
    assert_eq!(
        session.save_warning.as_deref(),
        Some("Result could not be saved to your history")
    );
    // The refresh also failed; the list stays as it was
    let history = dashboard.state().history();
    assert!(history.entries.is_empty());
    assert!(!history.loading);
}

#[tokio::test]
async fn test_history_limit_and_order() {
    let api_url = serve_api().await;
    let client = AnalysisApiClient::new(&api_url, Duration::from_secs(5)).unwrap();
    for i in 0..12 {
        let request = SaveAnalysisRequest {
            user_id: Some("u1".to_string()),
            file_name: Some(format!("rec{i}.wav")),
            file_size: Some(1024),
            mime_type: Some("audio/wav".to_string()),
            prediction: Some(Prediction::Healthy),
            confidence: Some(0.9),
            ..Default::default()
        };
        client.save_analysis(&request).await.unwrap();
    }

    let dashboard =
        Dashboard::new(&config(&closed_url().await, &api_url), Some("u1".to_string())).unwrap();
    assert_eq!(dashboard.refresh_history().await, RefreshOutcome::Applied(10));

    let names: Vec<String> = dashboard
        .state()
        .history()
        .entries
        .into_iter()
        .map(|e| e.file_name)
        .collect();
    assert_eq!(names.first().map(String::as_str), Some("rec11.wav"));
    assert_eq!(names.last().map(String::as_str), Some("rec2.wav"));
}

#[tokio::test]
async fn test_history_fetch_failure_is_not_fatal() {
    let dashboard =
        Dashboard::new(&config(&closed_url().await, &closed_url().await), Some("u1".to_string()))
            .unwrap();
    assert_eq!(dashboard.refresh_history().await, RefreshOutcome::Failed);
    assert!(!dashboard.state().history().loading);
}

#[tokio::test]
async fn test_mount_loads_history_before_failed_upload() {
    let api_url = serve_api().await;
    let client = AnalysisApiClient::new(&api_url, Duration::from_secs(5)).unwrap();
    let request = SaveAnalysisRequest {
        user_id: Some("u1".to_string()),
        file_name: Some("earlier.wav".to_string()),
        file_size: Some(2048),
        mime_type: Some("audio/wav".to_string()),
        prediction: Some(Prediction::Pneumonia),
        confidence: Some(0.7),
        ..Default::default()
    };
    client.save_analysis(&request).await.unwrap();

    let mock = MockPredictor::new(StatusCode::INTERNAL_SERVER_ERROR, "boom");
    let analysis_url = serve_predictor(&mock).await;
    let dashboard = Dashboard::new(&config(&analysis_url, &api_url), Some("u1".to_string())).unwrap();

    assert_eq!(dashboard.mount().await, RefreshOutcome::Applied(1));

    let report = uploaded(dashboard.select_file(wav("a.wav")).await);
    assert_eq!(report.outcome.unwrap_err(), UploadError::Server(500));
    assert!(report.follow_up.is_none());

    let history = dashboard.state().history();
    assert_eq!(history.entries.len(), 1);
    assert_eq!(history.entries[0].file_name, "earlier.wav");
    let text = render_history(&history);
    assert!(text.contains("earlier.wav"));
    assert!(!text.contains("No test history available"));
}

#[tokio::test]
async fn test_mount_without_user_skips_fetch() {
    let dashboard = Dashboard::new(&config(&closed_url().await, &closed_url().await), None).unwrap();
    assert_eq!(dashboard.mount().await, RefreshOutcome::Skipped);
    assert_eq!(dashboard.state().history().latest_ticket, 0);
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test]
async fn test_progress_is_simulated_while_waiting() {
    let mock = MockPredictor::new(StatusCode::OK, r#"{"prediction":"healthy","confidence":0.9}"#)
        .with_delay(Duration::from_millis(400));
    let analysis_url = serve_predictor(&mock).await;
    let dashboard = Dashboard::new(&config(&analysis_url, &closed_url().await), None).unwrap();
    let mut events = dashboard.state().subscribe_events();

    uploaded(dashboard.select_file(wav("a.wav")).await);

    let mut percents = Vec::new();
    let mut finished = false;
    while let Ok(event) = events.try_recv() {
        match event {
            DashboardEvent::Progress { percent, .. } => {
                assert!(!finished, "progress after final reset");
                percents.push(percent);
            }
            DashboardEvent::AttemptFinished { .. } => finished = true,
            _ => {}
        }
    }

    assert!(finished);
    assert!(!percents.is_empty());
    assert_eq!(percents[0], 10);
    assert!(percents.windows(2).all(|w| w[1] >= w[0]));
    assert!(percents.iter().all(|p| *p <= 90));
    assert_settled(&dashboard);
}

#[tokio::test]
async fn test_selection_ignored_while_uploading() {
    let mock = MockPredictor::new(StatusCode::OK, r#"{"prediction":"healthy","confidence":0.9}"#)
        .with_delay(Duration::from_millis(300));
    let analysis_url = serve_predictor(&mock).await;
    let dashboard = Arc::new(
        Dashboard::new(&config(&analysis_url, &closed_url().await), None).unwrap(),
    );

    let first = {
        let dashboard = dashboard.clone();
        tokio::spawn(async move { dashboard.select_file(wav("first.wav")).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(dashboard.state().is_in_flight());

    assert!(matches!(
        dashboard.select_file(wav("second.wav")).await,
        SelectionOutcome::Ignored
    ));
    assert!(matches!(
        dashboard.drop_file(wav("third.wav")).await,
        SelectionOutcome::Ignored
    ));

    uploaded(first.await.unwrap());
    assert_eq!(mock.requests().len(), 1);
    assert_eq!(
        dashboard.state().session().selected_file.as_deref(),
        Some("first.wav")
    );
}

#[tokio::test]
async fn test_late_response_after_reset_is_discarded() {
    let mock = MockPredictor::new(StatusCode::OK, r#"{"prediction":"copd","confidence":0.8}"#)
        .with_delay(Duration::from_millis(300));
    let analysis_url = serve_predictor(&mock).await;
    let api_url = serve_api().await;
    let dashboard = Arc::new(
        Dashboard::new(&config(&analysis_url, &api_url), Some("u1".to_string())).unwrap(),
    );

    let attempt = {
        let dashboard = dashboard.clone();
        tokio::spawn(async move { dashboard.select_file(wav("orphan.wav")).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    dashboard.reset();

    let report = uploaded(attempt.await.unwrap());
    assert!(report.outcome.is_ok());
    assert!(!report.applied);
    assert!(report.follow_up.is_none());

    let session = dashboard.state().session();
    assert!(session.prediction.is_none());
    assert!(session.selected_file.is_none());
    assert_settled(&dashboard);
}
