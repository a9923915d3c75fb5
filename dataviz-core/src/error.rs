use thiserror::Error;

use crate::api::ApiError;

#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("An upload is already in progress")]
    UploadInFlight,

    #[error("A deletion is already in progress")]
    DeletionInProgress,

    #[error("No deletion is awaiting confirmation")]
    NoPendingDeletion,

    #[error("HTML report not available")]
    ReportUnavailable,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse failure classes used when deciding how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationFailure,
    TransportFailure,
    MalformedResponse,
    Rejected,
    Local,
}

impl DashboardError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DashboardError::Validation(_) => ErrorKind::ValidationFailure,
            DashboardError::Api(ApiError::Malformed(_)) => ErrorKind::MalformedResponse,
            DashboardError::Api(_) => ErrorKind::TransportFailure,
            DashboardError::UploadInFlight
            | DashboardError::DeletionInProgress
            | DashboardError::NoPendingDeletion
            | DashboardError::ReportUnavailable
            | DashboardError::Cancelled => ErrorKind::Rejected,
            DashboardError::Config(_) | DashboardError::Io(_) => ErrorKind::Local,
        }
    }
}
