//! Analysis Registry: the session's list of known analysis jobs
//!
//! `refresh()` replaces the list wholesale with the server's view; it never
//! merges. Optimistic `insert`/`remove` calls are therefore only as durable
//! as the next poll: if the server lags, an inserted job can vanish or a
//! removed one can reappear until the server catches up. This
//! eventual-consistency window is accepted.
//!
//! Polling runs as a `PollingTask` owned by whoever mounted the registry;
//! cancelling or dropping the task stops the timer.

use std::sync::Arc;
use std::time::Duration;

use dataviz_core::{AnalysisJob, AnalysisService, SessionService, UserId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ============================================================================
// PUBLIC API
// ============================================================================

pub struct AnalysisRegistry {
    service: Arc<dyn AnalysisService>,
    session: SessionService,
    jobs: watch::Sender<Vec<AnalysisJob>>,
}

impl AnalysisRegistry {
    pub fn new(service: Arc<dyn AnalysisService>, session: SessionService) -> Self {
        let (jobs, _rx) = watch::channel(Vec::new());
        Self {
            service,
            session,
            jobs,
        }
    }

    /// Fetch the session's jobs and replace the local list with them.
    ///
    /// Never fails: an anonymous session yields the empty list, and a
    /// transport or decode failure resets the list to empty and is logged.
    pub async fn refresh(&self) -> Vec<AnalysisJob> {
        let session = self.session.session().await;
        let Some(user_id) = session.user_id else {
            self.jobs.send_replace(Vec::new());
            return Vec::new();
        };

        let jobs = match self.service.list_jobs(session.credential.as_ref()).await {
            Ok(jobs) => scope_to_owner(jobs, &user_id),
            Err(e) => {
                tracing::warn!(error = %e, "Error fetching analyses, clearing list");
                Vec::new()
            }
        };

        tracing::debug!(count = jobs.len(), "Registry refreshed");
        self.jobs.send_replace(jobs.clone());
        jobs
    }

    /// Optimistically place a freshly created job at the head of the list.
    pub fn insert(&self, job: AnalysisJob) {
        self.jobs.send_modify(|jobs| {
            jobs.retain(|j| j.id != job.id);
            jobs.insert(0, job);
        });
    }

    /// Drop a job by id. Returns whether it was present.
    pub fn remove(&self, id: Uuid) -> bool {
        self.jobs.send_if_modified(|jobs| {
            let before = jobs.len();
            jobs.retain(|j| j.id != id);
            jobs.len() != before
        })
    }

    pub fn jobs(&self) -> Vec<AnalysisJob> {
        self.jobs.borrow().clone()
    }

    pub fn get(&self, id: Uuid) -> Option<AnalysisJob> {
        self.jobs.borrow().iter().find(|j| j.id == id).cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<AnalysisJob>> {
        self.jobs.subscribe()
    }

    /// Refresh immediately, then every `period`, until the returned task is
    /// cancelled, dropped, or `parent` is cancelled.
    pub fn start_polling(self: &Arc<Self>, period: Duration, parent: &CancellationToken) -> PollingTask {
        let cancel = parent.child_token();
        let registry = Arc::clone(self);
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            registry.run_polling_loop(period, token).await;
        });

        PollingTask {
            cancel,
            handle: Some(handle),
        }
    }

    async fn run_polling_loop(&self, period: Duration, cancel: CancellationToken) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(interval_ms = period.as_millis() as u64, "Registry polling started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    tokio::select! {
                        _ = self.refresh() => {}
                        _ = cancel.cancelled() => break,
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        tracing::info!("Registry polling stopped");
    }
}

/// Handle to the registry's recurring refresh. Dropping it cancels polling.
pub struct PollingTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollingTask {
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel polling and wait for the loop to exit.
    pub async fn cancel(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Registry polling task ended abnormally");
            }
        }
    }
}

impl Drop for PollingTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// INTERNAL HELPERS
// ============================================================================

/// Drop jobs owned by someone else. Jobs without an owner field are kept:
/// the list endpoint already scopes them server-side.
fn scope_to_owner(jobs: Vec<AnalysisJob>, user_id: &UserId) -> Vec<AnalysisJob> {
    jobs.into_iter()
        .filter(|j| j.owner.as_ref().map_or(true, |owner| owner == user_id))
        .collect()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::testing::{job, owned_job, session_for, FakeService};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_refresh_without_session_is_empty_and_makes_no_request() {
        let service = Arc::new(FakeService::default());
        service.set_jobs(vec![job(1)]);
        let registry = AnalysisRegistry::new(service.clone(), session_for(None).await);

        let jobs = registry.refresh().await;
        assert!(jobs.is_empty());
        assert!(registry.jobs().is_empty());
        assert_eq!(service.list_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale_and_scopes_by_owner() {
        let service = Arc::new(FakeService::default());
        service.set_jobs(vec![owned_job(1, 7), owned_job(2, 8), job(3)]);
        let registry = AnalysisRegistry::new(service.clone(), session_for(Some(7)).await);

        registry.insert(job(99));
        let jobs = registry.refresh().await;

        let ids: Vec<Uuid> = jobs.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(1), Uuid::from_u128(3)]);
        assert!(registry.get(Uuid::from_u128(99)).is_none(), "refresh must not merge");
    }

    #[tokio::test]
    async fn test_transport_failure_clears_list_without_error() {
        let service = Arc::new(FakeService::default());
        service.set_jobs(vec![job(1)]);
        let registry = AnalysisRegistry::new(service.clone(), session_for(Some(7)).await);
        assert_eq!(registry.refresh().await.len(), 1);

        service.fail_list.store(true, Ordering::SeqCst);
        assert!(registry.refresh().await.is_empty());
        assert!(registry.jobs().is_empty());
    }

    #[tokio::test]
    async fn test_insert_prepends_and_remove_reports_presence() {
        let service = Arc::new(FakeService::default());
        let registry = AnalysisRegistry::new(service, session_for(Some(7)).await);

        registry.insert(job(1));
        registry.insert(job(2));
        registry.insert(job(1));
        let ids: Vec<Uuid> = registry.jobs().iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(1), Uuid::from_u128(2)]);

        assert!(registry.remove(Uuid::from_u128(2)));
        assert!(!registry.remove(Uuid::from_u128(2)));
        assert_eq!(registry.jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_optimistic_insert_reverts_when_server_lags() {
        let service = Arc::new(FakeService::default());
        let registry = AnalysisRegistry::new(service.clone(), session_for(Some(7)).await);

        registry.insert(job(5));
        assert_eq!(registry.jobs().len(), 1);

        // The server has not listed the new job yet.
        registry.refresh().await;
        assert!(registry.jobs().is_empty());

        service.set_jobs(vec![job(5)]);
        registry.refresh().await;
        assert_eq!(registry.jobs().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_refreshes_on_mount_and_every_period_until_cancelled() {
        let service = Arc::new(FakeService::default());
        let registry = Arc::new(AnalysisRegistry::new(service.clone(), session_for(Some(7)).await));
        let root = CancellationToken::new();

        let task = registry.start_polling(Duration::from_millis(5000), &root);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(service.list_calls.load(Ordering::SeqCst), 1, "refresh on mount");

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(service.list_calls.load(Ordering::SeqCst), 2);

        task.cancel().await;
        tokio::time::sleep(Duration::from_millis(20_000)).await;
        assert_eq!(service.list_calls.load(Ordering::SeqCst), 2, "timer must stop on teardown");
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_task_or_parent_stops_polling() {
        let service = Arc::new(FakeService::default());
        let registry = Arc::new(AnalysisRegistry::new(service.clone(), session_for(Some(7)).await));

        let root = CancellationToken::new();
        let task = registry.start_polling(Duration::from_millis(1000), &root);
        tokio::time::sleep(Duration::from_millis(10)).await;
        drop(task);
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(service.list_calls.load(Ordering::SeqCst), 1);

        let task = registry.start_polling(Duration::from_millis(1000), &root);
        tokio::time::sleep(Duration::from_millis(10)).await;
        root.cancel();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!task.is_running());
    }
}
