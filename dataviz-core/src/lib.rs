pub mod api;
pub mod config;
pub mod envelope;
pub mod error;
pub mod filter;
pub mod models;
pub mod session;

pub use api::{AnalysisService, ApiError, DatasetFile, HttpAnalysisClient};
pub use config::DashboardConfig;
pub use error::{DashboardError, ErrorKind};
pub use filter::{ColumnOption, FilterState, ALL_COLUMNS};
pub use models::{AnalysisJob, Chart, Insight, JobStatus, MetricValue, UserId};
pub use session::{
    Credential, CredentialStore, FileCredentialStore, MemoryCredentialStore, Session, SessionService,
};
