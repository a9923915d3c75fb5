pub mod dashboard;
pub mod status;
pub mod subsystems;
pub mod view;

pub use dashboard::Dashboard;
pub use status::{StatusBoard, StatusKind, StatusMessage};
pub use subsystems::artifacts::ArtifactService;
pub use subsystems::deletion::{DeletionState, DeletionWorkflow};
pub use subsystems::detail::{DetailOrchestrator, OpenOutcome};
pub use subsystems::registry::{AnalysisRegistry, PollingTask};
pub use subsystems::upload::UploadCoordinator;
pub use view::{DetailView, ViewState, ViewTab};
