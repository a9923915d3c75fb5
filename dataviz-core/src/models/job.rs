use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UserId;

/// Server-driven lifecycle of an analysis. Transitions only move toward
/// `Completed` or `Failed`; the client never writes this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[serde(alias = "pending")]
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Uploaded => "uploaded",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: Uuid,
    #[serde(default)]
    pub dataset_name: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "user", alias = "user_id")]
    pub owner: Option<UserId>,
    /// Server-relative path of the HTML report, present once one exists.
    #[serde(default, alias = "report_html")]
    pub report_path: Option<String>,
    #[serde(default)]
    pub rows_count: Option<i64>,
    #[serde(default)]
    pub columns_count: Option<i64>,
    #[serde(default)]
    pub missing_values_count: Option<i64>,
    #[serde(default)]
    pub duplicates_count: Option<i64>,
    #[serde(default)]
    pub outliers_count: Option<i64>,
    /// Seconds spent processing, set by the backend on completion.
    #[serde(default)]
    pub processing_time: Option<f64>,
}

impl AnalysisJob {
    pub fn display_name(&self) -> &str {
        self.dataset_name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or("Unnamed Dataset")
    }

    pub fn has_report(&self) -> bool {
        self.report_path.as_deref().is_some_and(|p| !p.is_empty())
    }
}
