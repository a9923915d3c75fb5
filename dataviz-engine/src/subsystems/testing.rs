//! In-process `AnalysisService` fake for subsystem tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bytes::Bytes;
use dataviz_core::{
    AnalysisJob, AnalysisService, ApiError, Chart, Credential, CredentialStore, DatasetFile,
    Insight, JobStatus, MemoryCredentialStore, SessionService, UserId,
};
use tokio::sync::Notify;
use uuid::Uuid;

pub fn job(n: u128) -> AnalysisJob {
    AnalysisJob {
        id: Uuid::from_u128(n),
        dataset_name: Some(format!("dataset-{}.csv", n)),
        status: JobStatus::Completed,
        created_at: chrono::Utc::now(),
        updated_at: None,
        owner: None,
        report_path: None,
        rows_count: Some(100),
        columns_count: Some(4),
        missing_values_count: None,
        duplicates_count: None,
        outliers_count: None,
        processing_time: None,
    }
}

pub fn owned_job(n: u128, owner: i64) -> AnalysisJob {
    AnalysisJob {
        owner: Some(UserId::from(owner)),
        ..job(n)
    }
}

pub fn chart(graph_type: &str, columns: &[&str]) -> Chart {
    Chart {
        graph_type: graph_type.to_string(),
        columns: columns.iter().map(|c| c.to_string()).collect(),
        image_url: None,
        title: None,
        description: None,
    }
}

pub fn insight(column: &str) -> Insight {
    Insight {
        column_name: Some(column.to_string()),
        description: Some(format!("{} looks skewed", column)),
        metrics: None,
        insight_type: None,
        importance_score: None,
    }
}

/// Session signed in as `user_id`, or anonymous for `None`.
pub async fn session_for(user_id: Option<i64>) -> SessionService {
    let store = Arc::new(MemoryCredentialStore::new());
    if let Some(user_id) = user_id {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"user_id":{}}}"#, user_id));
        store
            .set("token", &format!("{}.{}.sig", header, payload))
            .await
            .unwrap();
    }
    SessionService::new(store, "token")
}

#[derive(Default)]
pub struct FakeService {
    jobs: Mutex<Vec<AnalysisJob>>,
    details: Mutex<HashMap<Uuid, (Vec<Insight>, Vec<Chart>)>>,
    job_gates: Mutex<HashMap<Uuid, Arc<Notify>>>,
    delete_gate: Mutex<Option<Arc<Notify>>>,
    upload_gate: Mutex<Option<Arc<Notify>>>,
    pub upload_error: Mutex<Option<String>>,
    pub list_calls: AtomicUsize,
    pub upload_calls: AtomicUsize,
    pub job_calls: AtomicUsize,
    pub insight_calls: AtomicUsize,
    pub chart_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
    pub credentials_seen: AtomicUsize,
    pub fail_list: AtomicBool,
    pub fail_upload: AtomicBool,
    pub fail_job: AtomicBool,
    pub fail_insights: AtomicBool,
    pub fail_charts: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_download: AtomicBool,
}

impl FakeService {
    pub fn set_jobs(&self, jobs: Vec<AnalysisJob>) {
        *self.jobs.lock().unwrap() = jobs;
    }

    pub fn set_details(&self, id: u128, insights: Vec<Insight>, charts: Vec<Chart>) {
        self.details
            .lock()
            .unwrap()
            .insert(Uuid::from_u128(id), (insights, charts));
    }

    /// Hold `job(id)` until the returned gate is notified.
    pub fn gate_job(&self, id: u128) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.job_gates
            .lock()
            .unwrap()
            .insert(Uuid::from_u128(id), gate.clone());
        gate
    }

    pub fn gate_delete(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.delete_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn gate_upload(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.upload_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn note_credential(&self, credential: Option<&Credential>) {
        if credential.is_some() {
            self.credentials_seen.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn unavailable() -> ApiError {
        ApiError::Status {
            code: 503,
            message: None,
        }
    }
}

#[async_trait]
impl AnalysisService for FakeService {
    async fn list_jobs(&self, credential: Option<&Credential>) -> Result<Vec<AnalysisJob>, ApiError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.note_credential(credential);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn upload(
        &self,
        file: &DatasetFile,
        credential: Option<&Credential>,
    ) -> Result<AnalysisJob, ApiError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.note_credential(credential);
        let gate = self.upload_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                code: 400,
                message: self.upload_error.lock().unwrap().clone(),
            });
        }
        Ok(AnalysisJob {
            dataset_name: Some(file.dataset_name().to_string()),
            status: JobStatus::Uploaded,
            ..job(0xABC)
        })
    }

    async fn job(&self, id: Uuid, credential: Option<&Credential>) -> Result<AnalysisJob, ApiError> {
        self.job_calls.fetch_add(1, Ordering::SeqCst);
        self.note_credential(credential);
        let gate = self.job_gates.lock().unwrap().get(&id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_job.load(Ordering::SeqCst) {
            return Err(ApiError::Status {
                code: 404,
                message: Some("Not found".to_string()),
            });
        }
        Ok(job(id.as_u128()))
    }

    async fn insights(&self, id: Uuid, credential: Option<&Credential>) -> Result<Vec<Insight>, ApiError> {
        self.insight_calls.fetch_add(1, Ordering::SeqCst);
        self.note_credential(credential);
        if self.fail_insights.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(self
            .details
            .lock()
            .unwrap()
            .get(&id)
            .map(|(insights, _)| insights.clone())
            .unwrap_or_default())
    }

    async fn charts(&self, id: Uuid, credential: Option<&Credential>) -> Result<Vec<Chart>, ApiError> {
        self.chart_calls.fetch_add(1, Ordering::SeqCst);
        self.note_credential(credential);
        if self.fail_charts.load(Ordering::SeqCst) {
            return Err(ApiError::Malformed("expected a list".to_string()));
        }
        Ok(self
            .details
            .lock()
            .unwrap()
            .get(&id)
            .map(|(_, charts)| charts.clone())
            .unwrap_or_default())
    }

    async fn delete_job(&self, _id: Uuid, credential: Option<&Credential>) -> Result<(), ApiError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.note_credential(credential);
        let gate = self.delete_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(())
    }

    async fn download_results(&self, _id: Uuid, credential: Option<&Credential>) -> Result<Bytes, ApiError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.note_credential(credential);
        if self.fail_download.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        Ok(Bytes::from_static(b"PK\x03\x04fake-zip"))
    }

    fn resolve_url(&self, path: &str) -> String {
        format!("http://analysis.test/api/{}", path.trim_start_matches('/'))
    }
}
