//! Detail view state
//!
//! The open job, its insights and its charts always change together through
//! a single `watch` modification, so an observer can never see one job's
//! header next to another job's collections. A generation counter lets late
//! responses from superseded `open` calls be discarded at commit time. The
//! counter only moves under the channel's write lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dataviz_core::filter::{self, ColumnOption, FilterState};
use dataviz_core::{AnalysisJob, Chart, Insight};
use serde::Serialize;
use tokio::sync::watch;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewTab {
    #[default]
    Insights,
    Charts,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewState {
    pub open_job: Option<AnalysisJob>,
    pub insights: Vec<Insight>,
    pub charts: Vec<Chart>,
    pub tab: ViewTab,
    pub filter: FilterState,
    /// Job whose load is in flight, if any.
    pub loading_job: Option<Uuid>,
}

impl ViewState {
    pub fn open_job_id(&self) -> Option<Uuid> {
        self.open_job.as_ref().map(|j| j.id)
    }

    pub fn is_open(&self, id: Uuid) -> bool {
        self.open_job_id() == Some(id)
    }

    pub fn is_loading(&self) -> bool {
        self.loading_job.is_some()
    }

    pub fn visible_charts(&self) -> Vec<Chart> {
        filter::filter_charts(&self.charts, &self.filter)
    }

    pub fn type_options(&self) -> Vec<String> {
        filter::type_options(&self.charts)
    }

    pub fn column_options(&self) -> Vec<ColumnOption> {
        filter::column_options(&self.charts)
    }
}

/// Shared handle to the detail view. Cloning shares the same state.
#[derive(Debug, Clone)]
pub struct DetailView {
    tx: Arc<watch::Sender<ViewState>>,
    generation: Arc<AtomicU64>,
}

impl Default for DetailView {
    fn default() -> Self {
        Self::new()
    }
}

impl DetailView {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ViewState::default());
        Self {
            tx: Arc::new(tx),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn snapshot(&self) -> ViewState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.tx.subscribe()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Start loading `id`, superseding every earlier load.
    pub(crate) fn begin_load(&self, id: Uuid) -> u64 {
        let mut generation = 0;
        self.tx.send_modify(|v| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            v.loading_job = Some(id);
        });
        generation
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Apply a loaded job as one unit. Returns `false` (and changes nothing)
    /// when `generation` has been superseded.
    ///
    /// The generation check runs under the channel's write lock, so a stale
    /// commit cannot slip in after a newer one.
    pub(crate) fn commit(
        &self,
        generation: u64,
        job: AnalysisJob,
        insights: Vec<Insight>,
        charts: Vec<Chart>,
    ) -> bool {
        self.tx.send_if_modified(|v| {
            if !self.is_current(generation) {
                return false;
            }
            v.open_job = Some(job);
            v.insights = insights;
            v.charts = charts;
            v.tab = ViewTab::Insights;
            v.filter = FilterState::default();
            v.loading_job = None;
            true
        })
    }

    /// End a load that produced nothing to commit.
    pub(crate) fn finish_load(&self, generation: u64) {
        self.tx.send_if_modified(|v| {
            if !self.is_current(generation) || v.loading_job.is_none() {
                return false;
            }
            v.loading_job = None;
            true
        });
    }

    /// Forget `id`: clear it if open and discard an in-flight load of it.
    /// Returns whether the view changed.
    pub(crate) fn clear_if_open(&self, id: Uuid) -> bool {
        self.tx.send_if_modified(|v| {
            let loading = v.loading_job == Some(id);
            if loading {
                self.generation.fetch_add(1, Ordering::SeqCst);
                v.loading_job = None;
            }
            if !v.is_open(id) {
                return loading;
            }
            v.open_job = None;
            v.insights.clear();
            v.charts.clear();
            v.filter = FilterState::default();
            true
        })
    }

    /// Deselect the open job and discard any load still in flight.
    pub fn close(&self) {
        self.tx.send_modify(|v| {
            self.generation.fetch_add(1, Ordering::SeqCst);
            v.open_job = None;
            v.insights.clear();
            v.charts.clear();
            v.tab = ViewTab::Insights;
            v.filter = FilterState::default();
            v.loading_job = None;
        });
    }

    pub fn select_tab(&self, tab: ViewTab) {
        self.tx.send_if_modified(|v| {
            let changed = v.tab != tab;
            v.tab = tab;
            changed
        });
    }

    pub fn select_type(&self, graph_type: Option<&str>) {
        self.tx.send_modify(|v| v.filter.select_type(graph_type));
    }

    pub fn select_column(&self, column: &str) {
        self.tx.send_modify(|v| v.filter.select_column(column));
    }

    pub fn reset_filter(&self) {
        self.tx.send_modify(|v| v.filter.reset());
    }

    pub fn visible_charts(&self) -> Vec<Chart> {
        self.tx.borrow().visible_charts()
    }
}
