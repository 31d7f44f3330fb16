//! Periodic refresh against a mocked backend

mod common;

use chrono::Duration as ChronoDuration;
use common::{Harness, histogram_body, search_body};
use loglens_core::{RefreshConfig, TimeRange, snapshot::WatchRefreshConfig};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

async fn mount_search(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/search/universal/relative"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(search_body("*", ChronoDuration::minutes(5), json!([]))),
        )
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/search/universal/relative/histogram"))
        .respond_with(ResponseTemplate::new(200).set_body_json(histogram_body("minute")))
        .mount(server)
        .await;
}

async fn search_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == "/search/universal/relative")
        .count()
}

#[tokio::test]
async fn test_timer_refreshes_until_disposed() {
    let server = MockServer::start().await;
    mount_search(&server).await;

    let harness = Harness::new(&server, TimeRange::relative(300));
    let orchestrator = harness.page.orchestrator();

    assert!(orchestrator.start_timer(RefreshConfig::enabled(50)));
    tokio::time::sleep(Duration::from_millis(280)).await;
    orchestrator.dispose();

    let issued = search_requests(&server).await;
    assert!(issued >= 2, "expected periodic searches, got {}", issued);
    assert!(!orchestrator.timer_active());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(search_requests(&server).await <= issued + 1);
}

#[tokio::test]
async fn test_disabled_refresh_config_issues_nothing() {
    let server = MockServer::start().await;
    mount_search(&server).await;

    let harness = Harness::new(&server, TimeRange::relative(300));
    let source = WatchRefreshConfig::new(RefreshConfig::disabled());
    let _watcher = harness.page.orchestrator().watch_refresh_config(&source);

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(search_requests(&server).await, 0);

    source.set(RefreshConfig::enabled(40));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(search_requests(&server).await >= 1);
    assert!(harness.page.orchestrator().timer_active());
}
