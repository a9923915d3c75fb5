//! Detail Fetch Orchestrator
//!
//! `open(id)` issues the job record, insights and charts requests
//! concurrently. The job record is required: if it fails the previous view
//! stays as it was. Insights and charts are best-effort and degrade to empty.
//! Every `open` takes a fresh generation from the view; results from an
//! `open` that has since been superseded are dropped instead of committed.

use std::sync::Arc;

use dataviz_core::{AnalysisService, ApiError, DashboardError, SessionService};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::status::{StatusBoard, StatusMessage};
use crate::view::DetailView;

pub const LOAD_FAILED_MESSAGE: &str = "Failed to load analysis details";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    /// The job is now the open view.
    Opened,
    /// A later `open` or `close` won; nothing was committed.
    Superseded,
}

pub struct DetailOrchestrator {
    service: Arc<dyn AnalysisService>,
    session: SessionService,
    view: DetailView,
    status: StatusBoard,
    shutdown: CancellationToken,
}

impl DetailOrchestrator {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        session: SessionService,
        view: DetailView,
        status: StatusBoard,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            service,
            session,
            view,
            status,
            shutdown,
        }
    }

    pub fn view(&self) -> &DetailView {
        &self.view
    }

    pub async fn open(&self, id: Uuid) -> Result<OpenOutcome, DashboardError> {
        let generation = self.view.begin_load(id);
        let credential = self.session.credential().await;
        let credential = credential.as_ref();

        tracing::debug!(job_id = %id, generation, "Opening analysis");

        let fetch = futures::future::join3(
            self.service.job(id, credential),
            self.service.insights(id, credential),
            self.service.charts(id, credential),
        );

        let (job, insights, charts) = tokio::select! {
            results = fetch => results,
            _ = self.shutdown.cancelled() => {
                self.view.finish_load(generation);
                return Err(DashboardError::Cancelled);
            }
        };

        let job = match job {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Failed to fetch analysis record");
                if self.view.is_current(generation) {
                    self.status.post(StatusMessage::error(LOAD_FAILED_MESSAGE));
                }
                self.view.finish_load(generation);
                return Err(e.into());
            }
        };

        let insights = best_effort("insights", id, insights);
        let charts = best_effort("charts", id, charts);

        if self.view.commit(generation, job, insights, charts) {
            tracing::info!(job_id = %id, "Analysis opened");
            Ok(OpenOutcome::Opened)
        } else {
            tracing::debug!(job_id = %id, generation, "Discarding superseded detail load");
            Ok(OpenOutcome::Superseded)
        }
    }

    pub fn close(&self) {
        self.view.close();
    }
}

fn best_effort<T>(what: &str, id: Uuid, result: Result<Vec<T>, ApiError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        tracing::warn!(job_id = %id, error = %e, "Failed to fetch {}, showing none", what);
        Vec::new()
    })
}
