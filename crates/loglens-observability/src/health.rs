//! Health endpoints for a running search page
//!
//! - `/healthz` reports liveness together with the refresh timer and cycle counts
//! - `/readyz` reports which page sources have loaded, 503 while any is pending
//! - `/metrics` exposes the Prometheus registry

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::metrics::{CycleOutcomeLabel, Metrics};

/// Load state of one page source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    Loaded,
    Pending,
    /// Fetched, but the backend rejected it; the page shows the error
    Error,
}

/// Load status of one data source merged into the search page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceStatus {
    /// Source name (search, histogram, streams, ...)
    pub name: String,
    pub state: SourceState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl SourceStatus {
    pub fn loaded(name: impl Into<String>) -> Self {
        Self::new(name, SourceState::Loaded, None)
    }

    pub fn pending(name: impl Into<String>) -> Self {
        Self::new(name, SourceState::Pending, None)
    }

    pub fn error(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(name, SourceState::Error, Some(detail.into()))
    }

    /// `Loaded` when `loaded`, `Pending` otherwise
    pub fn from_presence(name: impl Into<String>, loaded: bool) -> Self {
        if loaded {
            Self::loaded(name)
        } else {
            Self::pending(name)
        }
    }

    fn new(name: impl Into<String>, state: SourceState, detail: Option<String>) -> Self {
        Self {
            name: name.into(),
            state,
            detail,
        }
    }
}

/// Something that can report the load state of its sources
pub trait ReadinessChecker: Send + Sync {
    fn source_statuses(&self) -> Vec<SourceStatus>;

    /// Ready once no source is pending
    fn is_ready(&self) -> bool {
        self.source_statuses()
            .iter()
            .all(|source| source.state != SourceState::Pending)
    }
}

/// `/healthz` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
    pub refresh_timer_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_interval_secs: Option<f64>,
    pub settled_cycles: u64,
}

/// `/readyz` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    /// Names of the sources still pending
    pub pending: Vec<String>,
    pub sources: Vec<SourceStatus>,
}

impl ReadinessResponse {
    fn from_sources(sources: Vec<SourceStatus>) -> Self {
        let pending: Vec<String> = sources
            .iter()
            .filter(|source| source.state == SourceState::Pending)
            .map(|source| source.name.clone())
            .collect();
        Self {
            ready: pending.is_empty(),
            pending,
            sources,
        }
    }
}

/// Shared state of the health router
#[derive(Clone)]
pub struct HealthState {
    pub metrics: Arc<Metrics>,
    pub page: Option<Arc<dyn ReadinessChecker>>,
}

impl HealthState {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            page: None,
        }
    }

    /// Report readiness of `page` on `/readyz`
    pub fn with_page(mut self, page: Arc<dyn ReadinessChecker>) -> Self {
        self.page = Some(page);
        self
    }
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn healthz(State(state): State<HealthState>) -> Json<LivenessResponse> {
    let interval = state.metrics.refresh_interval();
    Json(LivenessResponse {
        status: "ok".to_string(),
        refresh_timer_active: interval.is_some(),
        refresh_interval_secs: interval,
        settled_cycles: state.metrics.cycle_count(CycleOutcomeLabel::Settled),
    })
}

async fn readyz(State(state): State<HealthState>) -> Response {
    let sources = state
        .page
        .as_ref()
        .map(|page| page.source_statuses())
        .unwrap_or_default();
    let body = ReadinessResponse::from_sources(sources);
    let status = if body.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

async fn metrics_handler(State(state): State<HealthState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", err),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    struct FixedSources(Vec<SourceStatus>);

    impl ReadinessChecker for FixedSources {
        fn source_statuses(&self) -> Vec<SourceStatus> {
            self.0.clone()
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_healthz_reports_timer_and_cycles() {
        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.set_refresh_timer(true, 5.0);
        metrics.record_cycle(CycleOutcomeLabel::Settled);
        metrics.record_cycle(CycleOutcomeLabel::Failed);

        let (status, body) = get_json(health_router(HealthState::new(metrics)), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["refresh_timer_active"], true);
        assert_eq!(body["refresh_interval_secs"], 5.0);
        assert_eq!(body["settled_cycles"], 1);
    }

    #[tokio::test]
    async fn test_healthz_without_timer() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let (_, body) = get_json(health_router(HealthState::new(metrics)), "/healthz").await;
        assert_eq!(body["refresh_timer_active"], false);
        assert!(body.get("refresh_interval_secs").is_none());
    }

    #[tokio::test]
    async fn test_readyz_lists_pending_sources() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let page = Arc::new(FixedSources(vec![
            SourceStatus::loaded("search"),
            SourceStatus::pending("histogram"),
            SourceStatus::pending("streams"),
        ]));
        let app = health_router(HealthState::new(metrics).with_page(page));

        let (status, body) = get_json(app, "/readyz").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ready"], false);
        assert_eq!(body["pending"], serde_json::json!(["histogram", "streams"]));
        assert_eq!(body["sources"][0]["state"], "loaded");
    }

    #[tokio::test]
    async fn test_readyz_error_source_counts_as_ready() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let page = Arc::new(FixedSources(vec![SourceStatus::error(
            "search",
            "Cannot parse 'source:'",
        )]));
        let app = health_router(HealthState::new(metrics).with_page(page));

        let (status, body) = get_json(app, "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sources"][0]["detail"], "Cannot parse 'source:'");
    }

    #[tokio::test]
    async fn test_readyz_without_page() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let (status, body) = get_json(health_router(HealthState::new(metrics)), "/readyz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sources"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let metrics = Arc::new(Metrics::new().unwrap());
        metrics.record_resolution("hour");
        let app = health_router(HealthState::new(metrics));

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/plain; version=0.0.4"
        );
    }

    #[test]
    fn test_source_status_from_presence() {
        assert_eq!(
            SourceStatus::from_presence("nodes", false).state,
            SourceState::Pending
        );
        let json = serde_json::to_string(&SourceStatus::loaded("nodes")).unwrap();
        assert_eq!(json, r#"{"name":"nodes","state":"loaded"}"#);
    }
}
