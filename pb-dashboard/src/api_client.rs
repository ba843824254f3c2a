//! pb-api HTTP client (persistence write and history read)

use pb_common::models::{HistoryResponse, SaveAnalysisRequest, SaveAnalysisResponse};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = concat!("pb-dashboard/", env!("CARGO_PKG_VERSION"));

/// HTTP client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid base URL {0}")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Parse a base URL, rejecting ones that cannot carry path segments
pub(crate) fn parse_base_url(base: &str) -> Result<Url, ClientError> {
    let url = Url::parse(base).map_err(|_| ClientError::InvalidUrl(base.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidUrl(base.to_string()));
    }
    Ok(url)
}

/// `base` with `segments` appended, each percent-encoded
pub(crate) fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, ClientError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| ClientError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

pub(crate) fn build_http_client(timeout: Duration) -> Result<reqwest::Client, ClientError> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()?)
}

/// Client for pb-api
#[derive(Debug, Clone)]
pub struct AnalysisApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AnalysisApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            base_url: parse_base_url(base_url)?,
        })
    }

    /// POST /api/analysis/save
    pub async fn save_analysis(
        &self,
        request: &SaveAnalysisRequest,
    ) -> Result<SaveAnalysisResponse, ClientError> {
        let url = endpoint(&self.base_url, &["api", "analysis", "save"])?;
        let response = self.http.post(url).json(request).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// GET /api/analysis/history/:user_id
    pub async fn history(
        &self,
        user_id: &str,
        limit: u32,
        skip: u32,
    ) -> Result<HistoryResponse, ClientError> {
        let url = endpoint(&self.base_url, &["api", "analysis", "history", user_id])?;
        let response = self
            .http
            .get(url)
            .query(&[("limit", limit), ("skip", skip)])
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

/// Turn a non-2xx response into `ClientError::Rejected`, using the API's
/// error message when the body carries one
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.error.message)
        .unwrap_or(text);

    Err(ClientError::Rejected {
        status: status.as_u16(),
        message,
    })
}
