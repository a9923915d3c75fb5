//! Analysis service client
//!
//! Provides an `AnalysisService` trait over the remote processing service and
//! the reqwest-backed `HttpAnalysisClient`:
//! - idempotent GETs retry with jittered exponential backoff on transient failures
//! - upload and delete are attempted exactly once
//! - the bearer credential is attached to every request when a session exists

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use uuid::Uuid;

use crate::config::ApiConfig;
use crate::envelope::decode_collection;
use crate::models::{AnalysisJob, Chart, Insight};
use crate::session::Credential;

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API error ({code}){}", status_suffix(.message))]
    Status { code: u16, message: Option<String> },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Transport failures, 429 and 5xx are worth another attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) => true,
            ApiError::Status { code, .. } => *code == 429 || *code >= 500,
            ApiError::Malformed(_) | ApiError::Io(_) => false,
        }
    }

    /// Server-provided `error` message, if the failure carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

fn status_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {}", m))
        .unwrap_or_default()
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

// ============================================================================
// Upload payload
// ============================================================================

/// A dataset file ready for submission.
#[derive(Debug, Clone)]
pub struct DatasetFile {
    pub file_name: String,
    pub contents: Bytes,
}

impl DatasetFile {
    pub fn new(file_name: impl Into<String>, contents: impl Into<Bytes>) -> Self {
        Self {
            file_name: file_name.into(),
            contents: contents.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.contents.len() as u64
    }

    /// Dataset name sent alongside the file: the file's own name.
    pub fn dataset_name(&self) -> &str {
        &self.file_name
    }

    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

// ============================================================================
// AnalysisService trait
// ============================================================================

/// Abstraction over the remote processing service.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn list_jobs(&self, credential: Option<&Credential>) -> Result<Vec<AnalysisJob>, ApiError>;

    async fn upload(
        &self,
        file: &DatasetFile,
        credential: Option<&Credential>,
    ) -> Result<AnalysisJob, ApiError>;

    async fn job(&self, id: Uuid, credential: Option<&Credential>) -> Result<AnalysisJob, ApiError>;

    async fn insights(&self, id: Uuid, credential: Option<&Credential>) -> Result<Vec<Insight>, ApiError>;

    async fn charts(&self, id: Uuid, credential: Option<&Credential>) -> Result<Vec<Chart>, ApiError>;

    async fn delete_job(&self, id: Uuid, credential: Option<&Credential>) -> Result<(), ApiError>;

    async fn download_results(&self, id: Uuid, credential: Option<&Credential>) -> Result<Bytes, ApiError>;

    /// Absolute URL for a server-relative path (report documents, chart images).
    fn resolve_url(&self, path: &str) -> String;
}

// ============================================================================
// HttpAnalysisClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    client: Client,
    config: ApiConfig,
    base_url: String,
}

impl HttpAnalysisClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        let base_url = config.base_url.trim_end_matches('/').to_string();

        Ok(Self {
            client,
            config,
            base_url,
        })
    }

    /// Create a client with a custom base URL (for testing / integration)
    pub fn with_base_url(config: ApiConfig, base_url: String) -> Result<Self, ApiError> {
        Self::new(ApiConfig { base_url, ..config })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str, credential: Option<&Credential>) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(path));
        match credential {
            Some(c) => builder.bearer_auth(c.token()),
            None => builder,
        }
    }

    /// GET with bounded retry on transient failures.
    async fn get_with_retry(&self, path: &str, credential: Option<&Credential>) -> Result<Bytes, ApiError> {
        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms.max(1))
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = RetryIf::spawn(
            retry_strategy,
            || self.get_once(path, credential),
            |e: &ApiError| {
                let retry = e.is_transient();
                if retry {
                    tracing::debug!(path = %path, error = %e, "Transient failure, retrying");
                }
                retry
            },
        )
        .await;

        if let Err(e) = &result {
            tracing::warn!(path = %path, error = %e, "GET failed");
        }
        result
    }

    async fn get_once(&self, path: &str, credential: Option<&Credential>) -> Result<Bytes, ApiError> {
        let response = self.request(Method::GET, path, credential).send().await?;
        Ok(check_status(response).await?.bytes().await?)
    }

    async fn get_collection<T: DeserializeOwned>(
        &self,
        path: &str,
        credential: Option<&Credential>,
    ) -> Result<Vec<T>, ApiError> {
        let body = self.get_with_retry(path, credential).await?;
        decode_collection(&body).map_err(ApiError::Malformed)
    }
}

/// Turn a non-2xx response into `ApiError::Status`, lifting the body's
/// `error` field when there is one.
async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&error_body)
        .ok()
        .and_then(|b| b.error);

    tracing::debug!(code = status.as_u16(), message = ?message, "Analysis service returned an error status");

    Err(ApiError::Status {
        code: status.as_u16(),
        message,
    })
}

fn decode_record<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::Malformed(e.to_string()))
}

#[async_trait]
impl AnalysisService for HttpAnalysisClient {
    async fn list_jobs(&self, credential: Option<&Credential>) -> Result<Vec<AnalysisJob>, ApiError> {
        self.get_collection("/analyses/", credential).await
    }

    async fn upload(
        &self,
        file: &DatasetFile,
        credential: Option<&Credential>,
    ) -> Result<AnalysisJob, ApiError> {
        let part = reqwest::multipart::Part::bytes(file.contents.to_vec())
            .file_name(file.file_name.clone());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("dataset_name", file.dataset_name().to_string());

        let response = self
            .request(Method::POST, "/upload/", credential)
            .multipart(form)
            .send()
            .await?;
        let body = check_status(response).await?.bytes().await?;
        decode_record(&body)
    }

    async fn job(&self, id: Uuid, credential: Option<&Credential>) -> Result<AnalysisJob, ApiError> {
        let body = self
            .get_with_retry(&format!("/analyses/{}/", id), credential)
            .await?;
        decode_record(&body)
    }

    async fn insights(&self, id: Uuid, credential: Option<&Credential>) -> Result<Vec<Insight>, ApiError> {
        self.get_collection(&format!("/analyses/{}/insights/", id), credential)
            .await
    }

    async fn charts(&self, id: Uuid, credential: Option<&Credential>) -> Result<Vec<Chart>, ApiError> {
        self.get_collection(&format!("/analyses/{}/graphs/", id), credential)
            .await
    }

    async fn delete_job(&self, id: Uuid, credential: Option<&Credential>) -> Result<(), ApiError> {
        let response = self
            .request(Method::DELETE, &format!("/analyses/{}/delete/", id), credential)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn download_results(&self, id: Uuid, credential: Option<&Credential>) -> Result<Bytes, ApiError> {
        self.get_with_retry(&format!("/analyses/{}/download/results/", id), credential)
            .await
    }

    fn resolve_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        if path.starts_with('/') {
            self.endpoint(path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
