//! Health, readiness and metrics for a live search page

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Duration;
use common::{Harness, histogram_body, mount_catalogs, search_body};
use loglens_core::{SearchParams, TimeRange};
use loglens_egress::{GraylogClient, GraylogConfig};
use loglens_observability::{HealthState, Metrics, ReadinessChecker, health_router};
use loglens_orchestrator::RefreshOrchestrator;
use serde_json::json;
use std::sync::Arc;
use tower::ServiceExt;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

#[tokio::test]
async fn test_readiness_follows_page_and_metrics_count_cycles() {
    let server = MockServer::start().await;
    mount_catalogs(&server).await;

    Mock::given(method("GET"))
        .and(path("/search/universal/relative"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_body("*", Duration::hours(2), json!([]))),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/universal/relative/histogram"))
        .respond_with(ResponseTemplate::new(200).set_body_json(histogram_body("minute")))
        .mount(&server)
        .await;

    let metrics = Arc::new(Metrics::new().unwrap());
    let config = GraylogConfig::new(server.uri()).with_credentials("admin", "admin");
    let client = Arc::new(GraylogClient::new(config).unwrap());
    let orchestrator = RefreshOrchestrator::new(
        client.clone(),
        SearchParams::new("*", TimeRange::relative(7200)),
    )
    .with_metrics(metrics.clone());
    let harness = Harness::with_orchestrator(client, orchestrator);

    let checker: Arc<dyn ReadinessChecker> = harness.page.clone();
    let app = health_router(HealthState::new(metrics.clone()).with_page(checker));

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    harness.load_catalogs().await;
    harness.page.orchestrator().refresh(None).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/readyz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(
        metrics
            .refresh_cycles_total
            .with_label_values(&["settled"])
            .get(),
        1.0
    );
    assert_eq!(
        metrics
            .histogram_resolution_total
            .with_label_values(&["minute"])
            .get(),
        1.0
    );

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
