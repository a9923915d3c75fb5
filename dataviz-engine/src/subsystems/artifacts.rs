//! Result archive downloads and HTML report links.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dataviz_core::{AnalysisJob, AnalysisService, DashboardError, SessionService};
use uuid::Uuid;

use crate::status::{StatusBoard, StatusMessage};

pub const DOWNLOAD_FAILED_MESSAGE: &str = "Download failed";

/// Name under which a job's result archive is saved.
pub fn results_file_name(id: Uuid) -> String {
    format!("analysis_{}_results.zip", id)
}

pub struct ArtifactService {
    service: Arc<dyn AnalysisService>,
    session: SessionService,
    status: StatusBoard,
    output_dir: PathBuf,
}

impl ArtifactService {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        session: SessionService,
        status: StatusBoard,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            service,
            session,
            status,
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Fetch the job's result archive and save it in the output directory.
    pub async fn download_results(&self, id: Uuid) -> Result<PathBuf, DashboardError> {
        self.download_results_to(id, &self.output_dir).await
    }

    pub async fn download_results_to(&self, id: Uuid, dir: &Path) -> Result<PathBuf, DashboardError> {
        let result = self.fetch_and_save(id, dir).await;
        match &result {
            Ok(path) => tracing::info!(job_id = %id, path = %path.display(), "Results downloaded"),
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Error downloading results");
                self.status.post(StatusMessage::error(DOWNLOAD_FAILED_MESSAGE));
            }
        }
        result
    }

    async fn fetch_and_save(&self, id: Uuid, dir: &Path) -> Result<PathBuf, DashboardError> {
        let credential = self.session.credential().await;
        let archive = self.service.download_results(id, credential.as_ref()).await?;

        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(results_file_name(id));
        tokio::fs::write(&path, &archive).await?;
        Ok(path)
    }

    /// Absolute URL for a server-relative path such as a chart image.
    pub fn resolve_url(&self, path: &str) -> String {
        self.service.resolve_url(path)
    }

    /// Fetch the job record alone and return its report URL.
    pub async fn report_url_for(&self, id: Uuid) -> Result<String, DashboardError> {
        let credential = self.session.credential().await;
        let job = self.service.job(id, credential.as_ref()).await.map_err(|e| {
            tracing::error!(job_id = %id, error = %e, "Error fetching analysis for report");
            DashboardError::from(e)
        })?;
        self.report_url(&job)
    }

    /// Absolute URL of the job's HTML report.
    pub fn report_url(&self, job: &AnalysisJob) -> Result<String, DashboardError> {
        match job.report_path.as_deref() {
            Some(path) if job.has_report() => Ok(self.service.resolve_url(path)),
            _ => {
                let err = DashboardError::ReportUnavailable;
                self.status.post(StatusMessage::error(err.to_string()));
                Err(err)
            }
        }
    }
}
