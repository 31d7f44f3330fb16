//! LogLens refresh orchestration
//!
//! This crate drives the search page:
//! - Refresh orchestrator (two-stage search and histogram fetch)
//! - Periodic refresh timer following a refresh config source
//! - Search page composition and readiness reporting

pub mod orchestrator;
pub mod page;
pub mod timer;

#[cfg(test)]
pub(crate) mod test_support;

pub use orchestrator::{CycleOutcome, CyclePhase, OrchestratorState, RefreshOrchestrator};
pub use page::{PageSources, PageView, PageWatcher, SearchPage, SearchPageView, sort_fields};
pub use timer::{RefreshConfigWatcher, RefreshTimer};
