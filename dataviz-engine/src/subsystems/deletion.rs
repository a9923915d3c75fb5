//! Deletion Workflow
//!
//! Two-step delete: `prompt_delete` arms a confirmation for one job,
//! `confirm_delete` issues the request. State moves
//! `Idle -> ConfirmPending -> Deleting -> Idle` and always returns to `Idle`,
//! whether the request succeeds, fails or the caller's future is dropped.

use std::sync::Arc;

use dataviz_core::{AnalysisService, DashboardError, SessionService};
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

use super::registry::AnalysisRegistry;
use crate::status::{StatusBoard, StatusMessage};
use crate::view::DetailView;

pub const DELETE_SUCCESS_MESSAGE: &str = "Analysis deleted successfully";
pub const DELETE_FAILED_MESSAGE: &str = "Failed to delete analysis";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeletionState {
    #[default]
    Idle,
    ConfirmPending { target: Uuid },
    Deleting { target: Uuid },
}

impl DeletionState {
    pub fn target(&self) -> Option<Uuid> {
        match self {
            DeletionState::Idle => None,
            DeletionState::ConfirmPending { target } | DeletionState::Deleting { target } => Some(*target),
        }
    }
}

pub struct DeletionWorkflow {
    service: Arc<dyn AnalysisService>,
    session: SessionService,
    registry: Arc<AnalysisRegistry>,
    view: DetailView,
    status: StatusBoard,
    state: watch::Sender<DeletionState>,
}

/// Returns the workflow to `Idle` when the delete request ends.
struct ResetToIdle<'a>(&'a watch::Sender<DeletionState>);

impl Drop for ResetToIdle<'_> {
    fn drop(&mut self) {
        self.0.send_replace(DeletionState::Idle);
    }
}

impl DeletionWorkflow {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        session: SessionService,
        registry: Arc<AnalysisRegistry>,
        view: DetailView,
        status: StatusBoard,
    ) -> Self {
        let (state, _rx) = watch::channel(DeletionState::Idle);
        Self {
            service,
            session,
            registry,
            view,
            status,
            state,
        }
    }

    pub fn state(&self) -> DeletionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<DeletionState> {
        self.state.subscribe()
    }

    /// Arm confirmation for `id`, replacing any earlier pending target.
    pub fn prompt_delete(&self, id: Uuid) -> Result<(), DashboardError> {
        let mut busy = false;
        self.state.send_if_modified(|state| match state {
            DeletionState::Deleting { .. } => {
                busy = true;
                false
            }
            _ => {
                *state = DeletionState::ConfirmPending { target: id };
                true
            }
        });

        if busy {
            return Err(DashboardError::DeletionInProgress);
        }
        Ok(())
    }

    /// Back out of a pending confirmation. Returns whether one was pending.
    pub fn cancel_delete(&self) -> bool {
        self.state.send_if_modified(|state| match state {
            DeletionState::ConfirmPending { .. } => {
                *state = DeletionState::Idle;
                true
            }
            _ => false,
        })
    }

    /// Delete the pending target. On success the job leaves the registry and,
    /// if it is the open job, the detail view is cleared. On failure nothing
    /// changes besides the status message.
    pub async fn confirm_delete(&self) -> Result<Uuid, DashboardError> {
        let mut claimed = None;
        let mut busy = false;
        self.state.send_if_modified(|state| match *state {
            DeletionState::ConfirmPending { target } => {
                claimed = Some(target);
                *state = DeletionState::Deleting { target };
                true
            }
            DeletionState::Deleting { .. } => {
                busy = true;
                false
            }
            DeletionState::Idle => false,
        });

        let id = match claimed {
            Some(id) => id,
            None if busy => return Err(DashboardError::DeletionInProgress),
            None => return Err(DashboardError::NoPendingDeletion),
        };
        let _reset = ResetToIdle(&self.state);

        let credential = self.session.credential().await;
        match self.service.delete_job(id, credential.as_ref()).await {
            Ok(()) => {
                self.registry.remove(id);
                if self.view.clear_if_open(id) {
                    tracing::debug!(job_id = %id, "Cleared detail view for deleted analysis");
                }
                self.status.post(StatusMessage::success(DELETE_SUCCESS_MESSAGE));
                tracing::info!(job_id = %id, "Analysis deleted");
                Ok(id)
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Error deleting analysis");
                self.status.post(StatusMessage::error(DELETE_FAILED_MESSAGE));
                Err(e.into())
            }
        }
    }

    /// Prompt and confirm in one step.
    pub async fn delete(&self, id: Uuid) -> Result<Uuid, DashboardError> {
        self.prompt_delete(id)?;
        self.confirm_delete().await
    }
}
