//! Upload Coordinator
//!
//! Validates a dataset file locally, submits it as one multipart request and
//! places the created job at the head of the registry. At most one upload is
//! in flight per coordinator.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dataviz_core::config::UploadConfig;
use dataviz_core::{AnalysisJob, AnalysisService, DashboardError, DatasetFile, SessionService};

use super::registry::AnalysisRegistry;
use crate::status::{StatusBoard, StatusMessage};

pub const UPLOAD_SUCCESS_MESSAGE: &str = "Upload successful! Analysis started...";
pub const UPLOAD_FAILED_MESSAGE: &str = "Upload failed";

pub struct UploadCoordinator {
    service: Arc<dyn AnalysisService>,
    session: SessionService,
    registry: Arc<AnalysisRegistry>,
    status: StatusBoard,
    config: UploadConfig,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag however the upload ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl UploadCoordinator {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        session: SessionService,
        registry: Arc<AnalysisRegistry>,
        status: StatusBoard,
        config: UploadConfig,
    ) -> Self {
        Self {
            service,
            session,
            registry,
            status,
            config,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_uploading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Read a file from disk and submit it. Oversized files are rejected from
    /// their metadata before any bytes are read.
    pub async fn submit_path(&self, path: &Path) -> Result<AnalysisJob, DashboardError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| DashboardError::Validation(format!("{} is not a file", path.display())))?;
        if self.is_uploading() {
            return Err(DashboardError::UploadInFlight);
        }

        let size = tokio::fs::metadata(path).await?.len();
        self.validate(&file_name, size)?;

        let contents = tokio::fs::read(path).await?;
        self.submit(DatasetFile::new(file_name, contents)).await
    }

    pub async fn submit(&self, file: DatasetFile) -> Result<AnalysisJob, DashboardError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!(file = %file.file_name, "Upload already in progress, ignoring submit");
            return Err(DashboardError::UploadInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);
        self.validate(&file.file_name, file.size())?;

        self.status.dismiss();
        let credential = self.session.credential().await;

        tracing::info!(file = %file.file_name, bytes = file.size(), "Uploading dataset");

        match self.service.upload(&file, credential.as_ref()).await {
            Ok(job) => {
                tracing::info!(job_id = %job.id, "Upload accepted");
                self.registry.insert(job.clone());
                self.status.post(StatusMessage::success(UPLOAD_SUCCESS_MESSAGE));
                Ok(job)
            }
            Err(e) => {
                tracing::error!(file = %file.file_name, error = %e, "Upload failed");
                let message = e.server_message().unwrap_or(UPLOAD_FAILED_MESSAGE).to_string();
                self.status.post(StatusMessage::error(message));
                Err(e.into())
            }
        }
    }

    fn validate(&self, file_name: &str, size: u64) -> Result<(), DashboardError> {
        if size > self.config.max_file_bytes {
            return Err(self.reject(format!(
                "File size exceeds {} limit",
                human_size(self.config.max_file_bytes)
            )));
        }

        let extension = Path::new(file_name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());
        let allowed = extension.as_deref().is_some_and(|ext| {
            self.config
                .allowed_extensions
                .iter()
                .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext))
        });
        if !allowed {
            let list = self
                .config
                .allowed_extensions
                .iter()
                .map(|e| format!(".{}", e.trim_start_matches('.')))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(self.reject(format!("Unsupported file type. Allowed: {}", list)));
        }

        Ok(())
    }

    fn reject(&self, message: String) -> DashboardError {
        tracing::debug!(reason = %message, "Upload rejected locally");
        self.status.post(StatusMessage::error(message.clone()));
        DashboardError::Validation(message)
    }
}

fn human_size(bytes: u64) -> String {
    const MB: u64 = 1024 * 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else {
        format!("{} bytes", bytes)
    }
}
