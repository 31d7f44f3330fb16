//! Shared fixtures for orchestrator and page tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use loglens_core::{
    HistogramBucket, HistogramRequest, HistogramResult, QueryResult, Result, SearchRequest,
    Stream, service::SearchService, service::StreamsCatalog,
};
use mockall::mock;

mock! {
    pub Search {}

    #[async_trait]
    impl SearchService for Search {
        async fn search(&self, request: &SearchRequest) -> Result<QueryResult>;
        async fn histogram(&self, request: &HistogramRequest) -> Result<HistogramResult>;
    }
}

mock! {
    pub Streams {}

    #[async_trait]
    impl StreamsCatalog for Streams {
        async fn list_streams(&self) -> Result<Vec<Stream>>;
    }
}

pub fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
}

/// Search result covering `minutes` up to 2024-03-01 12:00 UTC
pub fn query_result(query: &str, minutes: i64) -> QueryResult {
    let to = at(12);
    QueryResult {
        query: query.to_string(),
        built_query: format!("{{\"query_string\":\"{}\"}}", query),
        used_indices: vec![],
        messages: vec![serde_json::json!({"message": {"message": "hello"}})],
        fields: vec!["message".to_string(), "source".to_string()],
        total_results: 1,
        time_ms: 3,
        from: to - Duration::minutes(minutes),
        to,
    }
}

pub fn histogram(request: &HistogramRequest) -> HistogramResult {
    HistogramResult {
        resolution: request.resolution,
        buckets: vec![HistogramBucket {
            timestamp: at(11),
            count: 4,
        }],
        built_query: String::new(),
        time_ms: 1,
        queried_from: None,
        queried_to: None,
    }
}

pub fn stream(id: &str, title: &str) -> Stream {
    Stream {
        id: id.to_string(),
        title: title.to_string(),
        description: None,
        disabled: false,
    }
}
