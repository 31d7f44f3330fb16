//! Refresh orchestrator
//!
//! Owns the current search parameters and the last received results. A
//! refresh cycle issues the primary search, picks a histogram resolution from
//! the result, then issues the dependent histogram query. Every cycle carries
//! a sequence number. A search completion is stored only when it is newer than
//! the last stored one, and a histogram only when it belongs to that search.

use crate::timer::{RefreshConfigWatcher, RefreshTimer};
use loglens_core::{
    ErrorInfo, HistogramResult, QueryResult, RefreshConfig, Resolution, ResolutionError,
    SearchParams, SortOrder, TimeRange,
    resolution::{minutes_between, select_resolution},
    service::SearchService,
    snapshot::RefreshConfigSource,
};
use loglens_observability::{CycleOutcomeLabel, FetchStage, Metrics};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};


/// Observable orchestrator state
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrchestratorState {
    pub params: SearchParams,
    pub last_result: Option<Arc<QueryResult>>,
    pub last_histogram: Option<Arc<HistogramResult>>,
    /// Resolution of `last_histogram`
    pub last_resolution: Option<Resolution>,
    /// Set when the last primary search was rejected as malformed
    pub last_error: Option<ErrorInfo>,
    /// Number of cycles issued so far
    pub issued_cycles: u64,
    /// Cycle whose search completion is currently stored, 0 before the first
    pub settled_cycle: u64,
}

/// How a refresh cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Search and histogram were both stored
    Settled,
    /// The backend rejected the query; `last_error` holds the details
    MalformedQuery,
    /// A fetch failed; previous state was left in place
    Failed,
    /// A newer cycle stored its search before this one completed
    Superseded,
    /// The orchestrator was disposed
    Disposed,
}

impl CycleOutcome {
    pub fn label(&self) -> CycleOutcomeLabel {
        match self {
            CycleOutcome::Settled => CycleOutcomeLabel::Settled,
            CycleOutcome::MalformedQuery => CycleOutcomeLabel::MalformedQuery,
            CycleOutcome::Failed => CycleOutcomeLabel::Failed,
            CycleOutcome::Superseded => CycleOutcomeLabel::Superseded,
            CycleOutcome::Disposed => CycleOutcomeLabel::Disposed,
        }
    }
}

/// Phase of a cycle, reported in debug logs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    Fetching,
    FetchingHistogram,
    Settled,
    Error,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            CyclePhase::Idle => "idle",
            CyclePhase::Fetching => "fetching",
            CyclePhase::FetchingHistogram => "fetching_histogram",
            CyclePhase::Settled => "settled",
            CyclePhase::Error => "error",
        };
        f.write_str(phase)
    }
}

/// Result of trying to write a completion into state
enum Commit {
    Applied,
    Stale,
    Disposed,
}

struct Inner {
    search: Arc<dyn SearchService>,
    state: watch::Sender<OrchestratorState>,
    disposed: AtomicBool,
    timer: Mutex<Option<RefreshTimer>>,
    metrics: OnceLock<Arc<Metrics>>,
}

/// Drives the search page's two-stage fetch
#[derive(Clone)]
pub struct RefreshOrchestrator {
    inner: Arc<Inner>,
}

impl RefreshOrchestrator {
    pub fn new(search: Arc<dyn SearchService>, params: SearchParams) -> Self {
        let state = OrchestratorState {
            params,
            ..OrchestratorState::default()
        };
        Self {
            inner: Arc::new(Inner {
                search,
                state: watch::Sender::new(state),
                disposed: AtomicBool::new(false),
                timer: Mutex::new(None),
                metrics: OnceLock::new(),
            }),
        }
    }

    /// Record cycle and fetch metrics into `metrics`
    pub fn with_metrics(self, metrics: Arc<Metrics>) -> Self {
        if self.inner.metrics.set(metrics).is_err() {
            warn!("Metrics already attached to orchestrator, ignoring");
        }
        self
    }

    /// Run one refresh cycle
    ///
    /// `resolution_override` takes precedence over the resolution override in
    /// the current params and over automatic selection.
    pub async fn refresh(&self, resolution_override: Option<Resolution>) -> CycleOutcome {
        self.inner.refresh(resolution_override).await
    }

    /// Replace the refresh timer according to `config`
    ///
    /// Returns whether a timer is running afterwards.
    pub fn start_timer(&self, config: RefreshConfig) -> bool {
        Inner::start_timer(&self.inner, config)
    }

    pub fn stop_timer(&self) {
        let stopped = self.inner.timer_slot().take();
        if let Some(timer) = stopped {
            info!("Stopping refresh timer ({:?})", timer.interval());
            timer.stop();
            self.inner.record_timer(None);
        }
    }

    pub fn timer_active(&self) -> bool {
        self.inner
            .timer_slot()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// Apply the source's current config, then follow its changes
    ///
    /// Following stops when the returned watcher is dropped.
    pub fn watch_refresh_config(&self, source: &dyn RefreshConfigSource) -> RefreshConfigWatcher {
        let mut changes = source.subscribe();
        let initial = *changes.borrow_and_update();
        self.start_timer(initial);

        let target = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let config = *changes.borrow_and_update();
                let Some(inner) = target.upgrade() else {
                    break;
                };
                debug!(
                    enabled = config.enabled,
                    interval_ms = config.interval_ms,
                    "Refresh config changed"
                );
                Inner::start_timer(&inner, config);
            }
        });

        RefreshConfigWatcher::new(handle)
    }

    pub fn set_query(&self, query: impl Into<String>) {
        let query = loglens_core::types::normalize_query(query.into());
        self.update_params(|params| params.query = query);
    }

    pub fn set_range(&self, range: TimeRange) {
        self.update_params(|params| params.range = range);
    }

    pub fn set_stream_scope(&self, stream_id: Option<String>) {
        self.update_params(|params| params.stream_id = stream_id);
    }

    /// Pages are 1-based; 0 is treated as 1
    pub fn set_page(&self, page: u32) {
        self.update_params(|params| params.page = page.max(1));
    }

    pub fn set_sort(&self, sort: Option<SortOrder>) {
        self.update_params(|params| params.sort = sort);
    }

    pub fn set_limit(&self, limit: Option<u32>) {
        self.update_params(|params| params.limit = limit);
    }

    pub fn set_resolution_override(&self, resolution: Option<Resolution>) {
        self.update_params(|params| params.resolution_override = resolution);
    }

    pub fn params(&self) -> SearchParams {
        self.inner.state.borrow().params.clone()
    }

    pub fn snapshot(&self) -> OrchestratorState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.inner.state.subscribe()
    }

    /// Number of cycles issued so far
    pub fn issued_cycles(&self) -> u64 {
        self.inner.state.borrow().issued_cycles
    }

    /// Cycle whose search completion is currently stored
    pub fn settled_cycle(&self) -> u64 {
        self.inner.state.borrow().settled_cycle
    }

    /// Stop the timer and ignore every completion from now on
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_timer();
        info!("Orchestrator disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }

    fn update_params(&self, apply: impl FnOnce(&mut SearchParams)) {
        self.inner.state.send_if_modified(|state| {
            let before = state.params.clone();
            apply(&mut state.params);
            state.params != before
        });
    }
}

impl Inner {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn metrics(&self) -> Option<&Arc<Metrics>> {
        self.metrics.get()
    }

    fn timer_slot(&self) -> MutexGuard<'_, Option<RefreshTimer>> {
        // A panic while holding the slot cannot leave it half-written
        self.timer.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_timer(&self, interval: Option<std::time::Duration>) {
        if let Some(metrics) = self.metrics() {
            match interval {
                Some(interval) => metrics.set_refresh_timer(true, interval.as_secs_f64()),
                None => metrics.set_refresh_timer(false, 0.0),
            }
        }
    }

    fn start_timer(this: &Arc<Self>, config: RefreshConfig) -> bool {
        let mut slot = this.timer_slot();

        if let Some(previous) = slot.take() {
            debug!("Replacing refresh timer ({:?})", previous.interval());
            previous.stop();
        }

        if !config.enabled || config.interval_ms == 0 || this.is_disposed() {
            drop(slot);
            this.record_timer(None);
            return false;
        }

        let interval = config.interval();
        let target: Weak<Inner> = Arc::downgrade(this);
        let timer = RefreshTimer::spawn(interval, move || {
            let Some(inner) = target.upgrade() else {
                return false;
            };
            if inner.is_disposed() {
                return false;
            }
            tokio::spawn(async move {
                inner.refresh(None).await;
            });
            true
        });

        info!("Started refresh timer ({:?})", interval);
        *slot = Some(timer);
        drop(slot);
        this.record_timer(Some(interval));
        true
    }

    /// Allocate the next cycle number
    ///
    /// Bookkeeping fields change without notifying subscribers.
    fn issue_cycle(&self) -> u64 {
        let mut cycle = 0;
        self.state.send_if_modified(|state| {
            state.issued_cycles += 1;
            cycle = state.issued_cycles;
            false
        });
        cycle
    }

    /// Write a completion of `cycle` into state unless fresher state exists
    ///
    /// A search completion is fresh when no later cycle has stored its search
    /// yet; it then becomes the settled cycle. A histogram completion is fresh
    /// only while its own cycle is the settled one.
    fn commit(
        &self,
        cycle: u64,
        stage: FetchStage,
        apply: impl FnOnce(&mut OrchestratorState) -> bool,
    ) -> Commit {
        let mut verdict = Commit::Applied;
        self.state.send_if_modified(|state| {
            if self.is_disposed() {
                verdict = Commit::Disposed;
                return false;
            }
            let fresh = match stage {
                FetchStage::Search => cycle > state.settled_cycle,
                FetchStage::Histogram => cycle == state.settled_cycle,
            };
            if !fresh {
                verdict = Commit::Stale;
                return false;
            }
            apply(state)
        });

        if matches!(verdict, Commit::Stale) {
            debug!(cycle, stage = stage.as_str(), "Discarding stale completion");
            if let Some(metrics) = self.metrics() {
                metrics.record_stale_completion(stage);
            }
        }
        verdict
    }

    fn choose_resolution(&self, params: &SearchParams, result: &QueryResult) -> Resolution {
        match select_resolution(&params.range, result) {
            Ok(resolution) => resolution,
            Err(ResolutionError::NoIndices) => {
                let minutes = minutes_between(result.to, result.from);
                let fallback = Resolution::for_minutes(minutes);
                warn!(
                    "All-time search returned no index spans, using result window ({} minutes, {})",
                    minutes, fallback
                );
                fallback
            }
            Err(err) => {
                warn!("Resolution selection failed: {}, using minute", err);
                Resolution::Minute
            }
        }
    }

    async fn refresh(&self, resolution_override: Option<Resolution>) -> CycleOutcome {
        let outcome = self.run_cycle(resolution_override).await;
        if let Some(metrics) = self.metrics() {
            metrics.record_cycle(outcome.label());
        }
        outcome
    }

    async fn run_cycle(&self, resolution_override: Option<Resolution>) -> CycleOutcome {
        if self.is_disposed() {
            return CycleOutcome::Disposed;
        }

        let cycle = self.issue_cycle();
        let params = self.state.borrow().params.clone();
        debug!(cycle, phase = %CyclePhase::Fetching, query = %params.query, "Refresh cycle started");

        let started = Instant::now();
        let search_result = self.search.search(&params.search_request()).await;
        if let Some(metrics) = self.metrics() {
            metrics.record_fetch(FetchStage::Search, started.elapsed().as_secs_f64());
        }

        let result = match search_result {
            Ok(result) => Arc::new(result),
            Err(err) => {
                if let Some(metrics) = self.metrics() {
                    metrics.record_fetch_failure(FetchStage::Search, err.kind());
                }

                let Some(info) = err.as_error_info() else {
                    warn!(cycle, "Search failed: {}", err);
                    debug!(cycle, phase = %CyclePhase::Idle, "Refresh cycle ended");
                    return match self.commit(cycle, FetchStage::Search, |_| false) {
                        Commit::Disposed => CycleOutcome::Disposed,
                        Commit::Stale => CycleOutcome::Superseded,
                        Commit::Applied => CycleOutcome::Failed,
                    };
                };

                info!(cycle, status = info.status, "Malformed search query: {}", info.message());
                let outcome = match self.commit(cycle, FetchStage::Search, |state| {
                    state.settled_cycle = cycle;
                    if state.last_error.as_ref() == Some(&info) {
                        return false;
                    }
                    state.last_error = Some(info);
                    true
                }) {
                    Commit::Applied => CycleOutcome::MalformedQuery,
                    Commit::Stale => CycleOutcome::Superseded,
                    Commit::Disposed => CycleOutcome::Disposed,
                };
                debug!(cycle, phase = %CyclePhase::Error, "Refresh cycle ended");
                return outcome;
            }
        };

        let stored = self.commit(cycle, FetchStage::Search, |state| {
            state.settled_cycle = cycle;
            let mut changed = state.last_error.take().is_some();
            if state.last_result.as_deref() != Some(&*result) {
                state.last_result = Some(result.clone());
                changed = true;
            }
            changed
        });
        match stored {
            Commit::Applied => {}
            Commit::Stale => return CycleOutcome::Superseded,
            Commit::Disposed => return CycleOutcome::Disposed,
        }

        let resolution = resolution_override
            .or(params.resolution_override)
            .unwrap_or_else(|| self.choose_resolution(&params, &result));
        if let Some(metrics) = self.metrics() {
            metrics.record_resolution(resolution.as_str());
        }
        debug!(
            cycle,
            phase = %CyclePhase::FetchingHistogram,
            resolution = %resolution,
            total_results = result.total_results,
            "Search stored, fetching histogram"
        );

        let started = Instant::now();
        let histogram_result = self
            .search
            .histogram(&params.histogram_request(resolution))
            .await;
        if let Some(metrics) = self.metrics() {
            metrics.record_fetch(FetchStage::Histogram, started.elapsed().as_secs_f64());
        }

        let histogram = match histogram_result {
            Ok(histogram) => Arc::new(histogram),
            Err(err) => {
                if let Some(metrics) = self.metrics() {
                    metrics.record_fetch_failure(FetchStage::Histogram, err.kind());
                }
                warn!(cycle, "Histogram fetch failed, keeping previous histogram: {}", err);
                return match self.commit(cycle, FetchStage::Histogram, |_| false) {
                    Commit::Disposed => CycleOutcome::Disposed,
                    Commit::Stale => CycleOutcome::Superseded,
                    Commit::Applied => CycleOutcome::Failed,
                };
            }
        };

        let outcome = match self.commit(cycle, FetchStage::Histogram, |state| {
            let unchanged = state.last_histogram.as_deref() == Some(&*histogram)
                && state.last_resolution == Some(resolution);
            if unchanged {
                return false;
            }
            state.last_histogram = Some(histogram);
            state.last_resolution = Some(resolution);
            true
        }) {
            Commit::Applied => CycleOutcome::Settled,
            Commit::Stale => CycleOutcome::Superseded,
            Commit::Disposed => CycleOutcome::Disposed,
        };

        debug!(cycle, phase = %CyclePhase::Settled, "Refresh cycle ended");
        outcome
    }
}
