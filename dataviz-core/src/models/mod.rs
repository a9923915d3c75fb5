pub mod chart;
pub mod insight;
pub mod job;
pub mod user;

pub use chart::Chart;
pub use insight::{Insight, MetricValue};
pub use job::{AnalysisJob, JobStatus};
pub use user::UserId;
