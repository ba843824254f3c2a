//! Analysis record model and wire types
//!
//! Types shared by the persistence server (pb-api) and the dashboard client
//! (pb-dashboard). JSON field names are camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Model version recorded when the caller does not supply one
pub const DEFAULT_MODEL_VERSION: &str = "1.0.0";

/// Respiratory condition reported by the prediction service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Healthy,
    Copd,
    Pneumonia,
}

impl Prediction {
    /// Wire / storage representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Healthy => "healthy",
            Prediction::Copd => "copd",
            Prediction::Pneumonia => "pneumonia",
        }
    }

    /// Capitalized status label shown in history and reports
    pub fn label(&self) -> &'static str {
        match self {
            Prediction::Healthy => "Healthy",
            Prediction::Copd => "Copd",
            Prediction::Pneumonia => "Pneumonia",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, Prediction::Healthy)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Prediction {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "healthy" => Ok(Prediction::Healthy),
            "copd" => Ok(Prediction::Copd),
            "pneumonia" => Ok(Prediction::Pneumonia),
            other => Err(RecordError::UnknownPrediction(other.to_string())),
        }
    }
}

/// Check a confidence score lies within [0, 1]
pub fn is_valid_confidence(confidence: f64) -> bool {
    confidence.is_finite() && (0.0..=1.0).contains(&confidence)
}

/// Largest `fileSize` a record may carry
pub const MAX_RECORD_FILE_SIZE: u64 = i64::MAX as u64;

/// Reasons an analysis record is rejected before persistence
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Confidence out of range: {0} (expected 0.0 to 1.0)")]
    ConfidenceOutOfRange(f64),

    #[error("File size out of range: {0} bytes")]
    FileSizeOutOfRange(u64),

    #[error("Unknown prediction: {0}")]
    UnknownPrediction(String),
}

/// Durable analysis record (server-owned, never updated after creation)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: String,
    pub user_id: String,
    pub file_name: String,
    /// Bytes
    pub file_size: u64,
    pub mime_type: String,
    /// Seconds
    pub duration: Option<f64>,
    pub prediction: Prediction,
    pub confidence: f64,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    /// Milliseconds
    pub processing_time: Option<i64>,
    pub model_version: String,
}

/// POST /api/analysis/save request body
///
/// Every field is optional at the wire level so that a missing field is
/// reported as a validation failure rather than a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnalysisRequest {
    pub user_id: Option<String>,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    pub mime_type: Option<String>,
    pub prediction: Option<Prediction>,
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

fn present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl SaveAnalysisRequest {
    /// Names of mandatory fields that are absent or blank.
    ///
    /// `confidence` is only checked for presence: 0.0 is a legitimate score.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !present(&self.user_id) {
            missing.push("userId");
        }
        if !present(&self.file_name) {
            missing.push("fileName");
        }
        if self.file_size.unwrap_or(0) == 0 {
            missing.push("fileSize");
        }
        if !present(&self.mime_type) {
            missing.push("mimeType");
        }
        if self.prediction.is_none() {
            missing.push("prediction");
        }
        if self.confidence.is_none() {
            missing.push("confidence");
        }
        missing
    }

    /// Validate and convert into a new record with server-assigned id and timestamps
    pub fn into_record(self, now: DateTime<Utc>) -> Result<AnalysisRecord, RecordError> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(RecordError::MissingFields(missing));
        }

        let (
            Some(user_id),
            Some(file_name),
            Some(file_size),
            Some(mime_type),
            Some(prediction),
            Some(confidence),
        ) = (
            self.user_id,
            self.file_name,
            self.file_size,
            self.mime_type,
            self.prediction,
            self.confidence,
        )
        else {
            // missing_fields() already covered every mandatory field
            return Err(RecordError::MissingFields(Vec::new()));
        };

        if !is_valid_confidence(confidence) {
            return Err(RecordError::ConfidenceOutOfRange(confidence));
        }
        // Stored as a signed 64-bit integer
        if file_size > MAX_RECORD_FILE_SIZE {
            return Err(RecordError::FileSizeOutOfRange(file_size));
        }

        Ok(AnalysisRecord {
            id: Uuid::new_v4().to_string(),
            user_id,
            file_name,
            file_size,
            mime_type,
            duration: self.duration,
            prediction,
            confidence,
            uploaded_at: now,
            processed_at: now,
            processing_time: self.processing_time,
            model_version: self
                .model_version
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL_VERSION.to_string()),
        })
    }
}

/// POST /api/analysis/save response body (201)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnalysisResponse {
    pub message: String,
    pub analysis_id: String,
}

/// One entry of the history response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSummary {
    pub id: String,
    pub file_name: String,
    pub file_size: u64,
    pub duration: Option<f64>,
    pub prediction: Prediction,
    pub confidence: f64,
    pub uploaded_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub processing_time: Option<i64>,
}

impl From<AnalysisRecord> for AnalysisSummary {
    fn from(record: AnalysisRecord) -> Self {
        Self {
            id: record.id,
            file_name: record.file_name,
            file_size: record.file_size,
            duration: record.duration,
            prediction: record.prediction,
            confidence: record.confidence,
            uploaded_at: record.uploaded_at,
            processed_at: record.processed_at,
            processing_time: record.processing_time,
        }
    }
}

/// GET /api/analysis/history/{userId} response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub analyses: Vec<AnalysisSummary>,
    pub total: u64,
    pub has_more: bool,
}

/// Success body of the external prediction service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub prediction: Prediction,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}
