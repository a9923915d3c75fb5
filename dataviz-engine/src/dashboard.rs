//! Dashboard facade
//!
//! Wires the session, registry, upload, detail, deletion and artifact
//! components over one shared `AnalysisService`, status board and detail
//! view. `mount` starts registry polling; `teardown` stops it and cancels
//! any in-flight detail load. Teardown is terminal.

use std::sync::Arc;
use std::time::Duration;

use dataviz_core::{
    AnalysisService, CredentialStore, DashboardConfig, DashboardError, FileCredentialStore,
    HttpAnalysisClient, SessionService,
};
use tokio_util::sync::CancellationToken;

use crate::status::StatusBoard;
use crate::subsystems::artifacts::ArtifactService;
use crate::subsystems::deletion::DeletionWorkflow;
use crate::subsystems::detail::DetailOrchestrator;
use crate::subsystems::registry::{AnalysisRegistry, PollingTask};
use crate::subsystems::upload::UploadCoordinator;
use crate::view::DetailView;

pub struct Dashboard {
    config: DashboardConfig,
    session: SessionService,
    registry: Arc<AnalysisRegistry>,
    uploads: UploadCoordinator,
    detail: DetailOrchestrator,
    deletion: DeletionWorkflow,
    artifacts: ArtifactService,
    status: StatusBoard,
    shutdown: CancellationToken,
    polling: Option<PollingTask>,
}

impl Dashboard {
    pub fn new(
        config: DashboardConfig,
        service: Arc<dyn AnalysisService>,
        store: Arc<dyn CredentialStore>,
    ) -> Self {
        let session = SessionService::new(store, config.session.token_key.clone());
        let status = StatusBoard::new();
        let view = DetailView::new();
        let shutdown = CancellationToken::new();

        let registry = Arc::new(AnalysisRegistry::new(service.clone(), session.clone()));
        let uploads = UploadCoordinator::new(
            service.clone(),
            session.clone(),
            registry.clone(),
            status.clone(),
            config.upload.clone(),
        );
        let detail = DetailOrchestrator::new(
            service.clone(),
            session.clone(),
            view.clone(),
            status.clone(),
            shutdown.clone(),
        );
        let deletion = DeletionWorkflow::new(
            service.clone(),
            session.clone(),
            registry.clone(),
            view,
            status.clone(),
        );
        let artifacts = ArtifactService::new(
            service,
            session.clone(),
            status.clone(),
            config.downloads.output_dir.clone(),
        );

        Self {
            config,
            session,
            registry,
            uploads,
            detail,
            deletion,
            artifacts,
            status,
            shutdown,
            polling: None,
        }
    }

    /// HTTP client plus file-backed credential store, both from config.
    pub fn from_config(config: DashboardConfig) -> Result<Self, DashboardError> {
        let service = HttpAnalysisClient::new(config.api.clone())?;
        let store = FileCredentialStore::new(config.session.resolved_store_path());
        tracing::debug!(
            api = %service.base_url(),
            store = %store.path().display(),
            "Dashboard configured"
        );
        Ok(Self::new(config, Arc::new(service), Arc::new(store)))
    }

    /// Start polling the registry. Idempotent while mounted.
    pub fn mount(&mut self) {
        if self.polling.as_ref().is_some_and(PollingTask::is_running) {
            return;
        }
        let period = Duration::from_millis(self.config.registry.poll_interval_ms.max(1));
        self.polling = Some(self.registry.start_polling(period, &self.shutdown));
    }

    pub fn is_mounted(&self) -> bool {
        self.polling.as_ref().is_some_and(PollingTask::is_running)
    }

    /// Stop polling and cancel outstanding detail loads.
    pub async fn teardown(&mut self) {
        self.shutdown.cancel();
        if let Some(polling) = self.polling.take() {
            polling.cancel().await;
        }
        tracing::info!("Dashboard torn down");
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    pub fn session(&self) -> &SessionService {
        &self.session
    }

    pub fn registry(&self) -> &Arc<AnalysisRegistry> {
        &self.registry
    }

    pub fn uploads(&self) -> &UploadCoordinator {
        &self.uploads
    }

    pub fn detail(&self) -> &DetailOrchestrator {
        &self.detail
    }

    pub fn view(&self) -> &DetailView {
        self.detail.view()
    }

    pub fn deletion(&self) -> &DeletionWorkflow {
        &self.deletion
    }

    pub fn artifacts(&self) -> &ArtifactService {
        &self.artifacts
    }

    pub fn status(&self) -> &StatusBoard {
        &self.status
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
