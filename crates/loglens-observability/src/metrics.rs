//! Metrics collection with Prometheus
//!
//! This module provides Prometheus metrics for LogLens:
//! - Refresh cycle outcomes
//! - Search and histogram fetch latencies and failures
//! - Selected histogram resolutions
//! - Stale completions discarded by the sequence guard
//! - Refresh timer state

use prometheus::{CounterVec, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Fetch stage within a refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// Primary search query
    Search,
    /// Dependent histogram query
    Histogram,
}

impl FetchStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchStage::Search => "search",
            FetchStage::Histogram => "histogram",
        }
    }
}

/// Terminal outcome of a refresh cycle, as recorded in metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcomeLabel {
    Settled,
    MalformedQuery,
    Failed,
    Superseded,
    Disposed,
}

impl CycleOutcomeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleOutcomeLabel::Settled => "settled",
            CycleOutcomeLabel::MalformedQuery => "malformed_query",
            CycleOutcomeLabel::Failed => "failed",
            CycleOutcomeLabel::Superseded => "superseded",
            CycleOutcomeLabel::Disposed => "disposed",
        }
    }
}

/// Metrics collector for LogLens
#[derive(Clone)]
pub struct Metrics {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Completed refresh cycles by outcome
    pub refresh_cycles_total: CounterVec,

    /// Fetch duration by stage
    pub fetch_duration_seconds: HistogramVec,
    /// Failed fetches by stage and error type
    pub fetch_failures_total: CounterVec,

    /// Histogram resolutions requested
    pub histogram_resolution_total: CounterVec,

    /// Completions dropped because a newer cycle had already stored its search
    pub stale_completions_total: CounterVec,

    /// 1 while a refresh timer is running
    pub refresh_timer_active: Gauge,
    /// Interval of the running refresh timer
    pub refresh_interval_seconds: Gauge,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let refresh_cycles_total = CounterVec::new(
            Opts::new(
                "loglens_refresh_cycles_total",
                "Total number of refresh cycles by outcome",
            ),
            &["outcome"],
        )?;

        let fetch_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "loglens_fetch_duration_seconds",
                "Search backend fetch duration in seconds",
            )
            .buckets(vec![0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["stage"],
        )?;

        let fetch_failures_total = CounterVec::new(
            Opts::new(
                "loglens_fetch_failures_total",
                "Total number of failed fetches",
            ),
            &["stage", "error_type"],
        )?;

        let histogram_resolution_total = CounterVec::new(
            Opts::new(
                "loglens_histogram_resolution_total",
                "Histogram requests by resolution",
            ),
            &["resolution"],
        )?;

        let stale_completions_total = CounterVec::new(
            Opts::new(
                "loglens_stale_completions_total",
                "Fetch completions discarded because a newer cycle had already stored its search",
            ),
            &["stage"],
        )?;

        let refresh_timer_active = Gauge::with_opts(Opts::new(
            "loglens_refresh_timer_active",
            "Whether the refresh timer is running (1) or stopped (0)",
        ))?;

        let refresh_interval_seconds = Gauge::with_opts(Opts::new(
            "loglens_refresh_interval_seconds",
            "Interval of the running refresh timer in seconds",
        ))?;

        registry.register(Box::new(refresh_cycles_total.clone()))?;
        registry.register(Box::new(fetch_duration_seconds.clone()))?;
        registry.register(Box::new(fetch_failures_total.clone()))?;
        registry.register(Box::new(histogram_resolution_total.clone()))?;
        registry.register(Box::new(stale_completions_total.clone()))?;
        registry.register(Box::new(refresh_timer_active.clone()))?;
        registry.register(Box::new(refresh_interval_seconds.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            refresh_cycles_total,
            fetch_duration_seconds,
            fetch_failures_total,
            histogram_resolution_total,
            stale_completions_total,
            refresh_timer_active,
            refresh_interval_seconds,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Render the registry in the Prometheus text format
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }

    /// Cycles recorded with `outcome`
    pub fn cycle_count(&self, outcome: CycleOutcomeLabel) -> u64 {
        self.refresh_cycles_total
            .with_label_values(&[outcome.as_str()])
            .get() as u64
    }

    /// Interval of the running refresh timer, `None` when stopped
    pub fn refresh_interval(&self) -> Option<f64> {
        (self.refresh_timer_active.get() > 0.0).then(|| self.refresh_interval_seconds.get())
    }

    pub fn record_cycle(&self, outcome: CycleOutcomeLabel) {
        self.refresh_cycles_total
            .with_label_values(&[outcome.as_str()])
            .inc();
    }

    pub fn record_fetch(&self, stage: FetchStage, duration_secs: f64) {
        self.fetch_duration_seconds
            .with_label_values(&[stage.as_str()])
            .observe(duration_secs);
    }

    pub fn record_fetch_failure(&self, stage: FetchStage, error_type: &str) {
        self.fetch_failures_total
            .with_label_values(&[stage.as_str(), error_type])
            .inc();
    }

    pub fn record_resolution(&self, resolution: &str) {
        self.histogram_resolution_total
            .with_label_values(&[resolution])
            .inc();
    }

    pub fn record_stale_completion(&self, stage: FetchStage) {
        self.stale_completions_total
            .with_label_values(&[stage.as_str()])
            .inc();
    }

    /// Update timer gauges; `interval_secs` is ignored when stopping
    pub fn set_refresh_timer(&self, active: bool, interval_secs: f64) {
        if active {
            self.refresh_timer_active.set(1.0);
            self.refresh_interval_seconds.set(interval_secs);
        } else {
            self.refresh_timer_active.set(0.0);
            self.refresh_interval_seconds.set(0.0);
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}
