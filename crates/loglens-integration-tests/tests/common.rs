//! Common test utilities for integration tests

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use loglens_core::{
    CurrentUser, Input, Node, SearchParams, TimeRange, snapshot::WatchSnapshot,
};
use loglens_egress::{GraylogClient, GraylogConfig};
use loglens_orchestrator::{PageSources, RefreshOrchestrator, SearchPage};
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("loglens=debug")
        .with_test_writer()
        .try_init();
}

pub fn end_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn rfc3339(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Search response spanning `window` before [`end_time`]
pub fn search_body(query: &str, window: Duration, used_indices: serde_json::Value) -> serde_json::Value {
    json!({
        "query": query,
        "built_query": format!("{{\"query_string\":{{\"query\":\"{}\"}}}}", query),
        "used_indices": used_indices,
        "messages": [{"message": {"_id": "m1", "message": "GET /index.html 200", "source": "web-1"}}],
        "fields": ["message", "source", "http_status"],
        "time": 7,
        "total_results": 1,
        "from": rfc3339(end_time() - window),
        "to": rfc3339(end_time())
    })
}

pub fn histogram_body(interval: &str) -> serde_json::Value {
    json!({
        "interval": interval,
        "results": {"1709290800": 3, "1709294400": 5},
        "time": 2,
        "built_query": "{}",
        "queried_timerange": {"from": rfc3339(end_time() - Duration::hours(2)), "to": rfc3339(end_time())}
    })
}

/// Mount the catalog endpoints the search page merges
pub async fn mount_catalogs(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/streams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "streams": [{"id": "s1", "title": "All messages", "disabled": false}]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/system/inputs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total": 1,
            "inputs": [{"id": "i1", "title": "Syslog UDP", "name": "Syslog UDP", "node": "n1"}]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/cluster"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "n1": {"node_id": "n1", "hostname": "graylog-a", "transport_address": "http://10.0.0.1:9000/api/", "is_master": true}
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/system/fields"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fields": ["timestamp", "message", "source", "http_status"]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/admin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "username": "admin",
            "full_name": "Administrator",
            "permissions": ["searches:relative", "searches:absolute"]
        })))
        .mount(server)
        .await;
}

pub struct Harness {
    pub client: Arc<GraylogClient>,
    pub page: Arc<SearchPage>,
    pub inputs: Arc<WatchSnapshot<Vec<Input>>>,
    pub nodes: Arc<WatchSnapshot<Vec<Node>>>,
    pub fields: Arc<WatchSnapshot<BTreeSet<String>>>,
    pub user: Arc<WatchSnapshot<CurrentUser>>,
}

impl Harness {
    pub fn new(server: &MockServer, range: TimeRange) -> Self {
        let config = GraylogConfig::new(server.uri()).with_credentials("admin", "admin");
        let client = Arc::new(GraylogClient::new(config).unwrap());
        let orchestrator =
            RefreshOrchestrator::new(client.clone(), SearchParams::new("source:web-1", range));
        Self::with_orchestrator(client, orchestrator)
    }

    pub fn with_orchestrator(client: Arc<GraylogClient>, orchestrator: RefreshOrchestrator) -> Self {
        let inputs = Arc::new(WatchSnapshot::new());
        let nodes = Arc::new(WatchSnapshot::new());
        let fields = Arc::new(WatchSnapshot::new());
        let user = Arc::new(WatchSnapshot::new());

        let sources = PageSources {
            streams: client.clone(),
            inputs: inputs.clone(),
            nodes: nodes.clone(),
            fields: fields.clone(),
            current_user: user.clone(),
        };

        Self {
            page: Arc::new(SearchPage::new(orchestrator, sources, None)),
            client,
            inputs,
            nodes,
            fields,
            user,
        }
    }

    /// Fetch catalogs the way the CLI does at startup
    pub async fn load_catalogs(&self) {
        use loglens_core::service::DirectoryService;

        self.page.load_streams().await.unwrap();
        self.inputs.publish(self.client.list_inputs().await.unwrap());
        self.nodes.publish(self.client.list_nodes().await.unwrap());
        self.fields.publish(self.client.list_fields().await.unwrap());
        self.user.publish(self.client.current_user().await.unwrap());
    }
}
