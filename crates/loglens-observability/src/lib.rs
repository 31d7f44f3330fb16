//! LogLens Observability
//!
//! This crate provides observability features:
//! - Metrics collection (Prometheus)
//! - Structured logging setup
//! - Health endpoints

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{
    HealthState, LivenessResponse, ReadinessChecker, ReadinessResponse, SourceState,
    SourceStatus, health_router,
};
pub use logging::{LoggingOptions, init_logging};
pub use metrics::{CycleOutcomeLabel, FetchStage, Metrics};
