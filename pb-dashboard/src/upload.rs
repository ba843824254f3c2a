//! Prediction service client and outcome classification

use pb_common::models::{is_valid_confidence, PredictionResult};
use reqwest::multipart::{Form, Part};
use reqwest::{StatusCode, Url};
use std::time::Duration;
use thiserror::Error;

use crate::api_client::{build_http_client, endpoint, parse_base_url, ClientError};
use crate::file::AudioFile;

/// Classified failure of one upload attempt.
///
/// Display is the fixed message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// 400 from the prediction service
    #[error("Invalid file format or corrupted audio")]
    InvalidAudio,

    /// 5xx; the user may retry
    #[error("Server error - please try again later")]
    Server(u16),

    /// Any other non-2xx status, network failure or timeout
    #[error("Upload failed - please check your connection")]
    Connection,

    /// 2xx whose body is not a usable prediction
    #[error("Unexpected response from analysis service")]
    MalformedResponse,

    /// The selected file could not be read locally
    #[error("Could not read the selected file")]
    Unreadable,
}

/// Map a non-success status to its error class; `None` for 2xx
pub fn classify_status(status: StatusCode) -> Option<UploadError> {
    if status.is_success() {
        None
    } else if status == StatusCode::BAD_REQUEST {
        Some(UploadError::InvalidAudio)
    } else if status.is_server_error() {
        Some(UploadError::Server(status.as_u16()))
    } else {
        Some(UploadError::Connection)
    }
}

/// Parse and sanity-check a 2xx body
pub fn parse_prediction(body: &[u8]) -> Result<PredictionResult, UploadError> {
    let result: PredictionResult =
        serde_json::from_slice(body).map_err(|_| UploadError::MalformedResponse)?;
    if !is_valid_confidence(result.confidence) {
        return Err(UploadError::MalformedResponse);
    }
    Ok(result)
}

/// Client for the external prediction service (`POST {base}/predict`)
#[derive(Debug, Clone)]
pub struct PredictionClient {
    http: reqwest::Client,
    predict_url: Url,
}

impl PredictionClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let base = parse_base_url(base_url)?;
        Ok(Self {
            http: build_http_client(timeout)?,
            predict_url: endpoint(&base, &["predict"])?,
        })
    }

    /// Send one file for analysis.
    ///
    /// Multipart body: `file` (with name and MIME type) and `userId` when
    /// known. Exactly one request is made; nothing is retried.
    pub async fn predict(
        &self,
        file: &AudioFile,
        contents: Vec<u8>,
        user_id: Option<&str>,
    ) -> Result<PredictionResult, UploadError> {
        let part = Part::bytes(contents)
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| {
                tracing::warn!(mime = %file.mime_type, error = %e, "Unusable MIME type");
                UploadError::Unreadable
            })?;

        let mut form = Form::new().part("file", part);
        if let Some(user_id) = user_id {
            form = form.text("userId", user_id.to_string());
        }

        let response = self
            .http
            .post(self.predict_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Prediction request failed");
                UploadError::Connection
            })?;

        let status = response.status();
        if let Some(error) = classify_status(status) {
            tracing::warn!(status = status.as_u16(), "Prediction service rejected upload");
            return Err(error);
        }

        let body = response.bytes().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read prediction response");
            UploadError::Connection
        })?;

        parse_prediction(&body).map_err(|e| {
            tracing::warn!(body_len = body.len(), "Prediction response could not be parsed");
            e
        })
    }
}
