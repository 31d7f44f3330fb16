//! Graylog REST connector

use crate::{
    EgressError, Result,
    client::{HttpClientConfig, create_client, with_retry},
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use loglens_core::{
    CurrentUser, HistogramBucket, HistogramRequest, HistogramResult, Input, Node, QueryResult,
    Resolution, SearchRequest, Stream, TimeRange,
    service::{DirectoryService, SearchService, StreamsCatalog},
};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, instrument};

/// Graylog connector configuration
#[derive(Debug, Clone)]
pub struct GraylogConfig {
    /// Base URL of the REST API, e.g. `http://127.0.0.1:9000/api`
    pub base_url: String,

    /// Basic auth user (also used to look up the current user)
    pub username: Option<String>,

    pub password: Option<String>,

    /// HTTP client configuration
    pub client_config: HttpClientConfig,
}

impl GraylogConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            client_config: HttpClientConfig::default(),
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_client_config(mut self, client_config: HttpClientConfig) -> Self {
        self.client_config = client_config;
        self
    }
}

/// Graylog connector
pub struct GraylogClient {
    config: GraylogConfig,
    client: Client,
}

impl GraylogClient {
    pub fn new(config: GraylogConfig) -> Result<Self> {
        let client = create_client(&config.client_config)?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// GET a JSON document, retrying only when the connection fails
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&'static str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        let max_retries = self.config.client_config.max_retries;

        with_retry(max_retries, || {
            let url = url.clone();
            async move {
                let mut request = self
                    .client
                    .get(&url)
                    .header("Accept", "application/json")
                    .query(params);
                if let Some(ref username) = self.config.username {
                    request = request.basic_auth(username, self.config.password.as_ref());
                }

                let response = request.send().await?;
                debug!("GET {} -> {}", url, response.status());

                handle_response(response).await
            }
        })
        .await
    }
}

/// Map non-success statuses to errors and decode the body
async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();

    if status == StatusCode::BAD_REQUEST {
        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<serde_json::Value>(&text)
            .unwrap_or_else(|_| serde_json::json!({ "message": text }));
        return Err(EgressError::MalformedQuery {
            status_code: status.as_u16(),
            body,
        });
    }

    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());
        return Err(EgressError::ProviderError {
            status_code: status.as_u16(),
            message,
        });
    }

    response
        .json::<T>()
        .await
        .map_err(|e| EgressError::ParseError(format!("Failed to decode response: {}", e)))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn range_params(range: &TimeRange, params: &mut Vec<(&'static str, String)>) {
    match range {
        TimeRange::Relative { range_secs } => params.push(("range", range_secs.to_string())),
        TimeRange::Absolute { from, to } => {
            params.push(("from", format_timestamp(from)));
            params.push(("to", format_timestamp(to)));
        }
    }
}

fn stream_filter(stream_id: &Option<String>, params: &mut Vec<(&'static str, String)>) {
    if let Some(id) = stream_id {
        params.push(("filter", format!("streams:{}", id)));
    }
}

fn search_params(request: &SearchRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![("query", request.query.clone())];
    range_params(&request.range, &mut params);
    if let Some(limit) = request.limit {
        params.push(("limit", limit.to_string()));
    }
    params.push(("offset", request.offset.to_string()));
    if let Some(ref sort) = request.sort {
        params.push(("sort", sort.to_param()));
    }
    stream_filter(&request.stream_id, &mut params);
    params
}

fn histogram_params(request: &HistogramRequest) -> Vec<(&'static str, String)> {
    let mut params = vec![("query", request.query.clone())];
    range_params(&request.range, &mut params);
    params.push(("interval", request.resolution.as_str().to_string()));
    stream_filter(&request.stream_id, &mut params);
    params
}

#[derive(Debug, Deserialize)]
struct HistogramResponse {
    interval: Resolution,
    #[serde(default)]
    results: HashMap<String, u64>,
    #[serde(default)]
    time: u64,
    #[serde(default)]
    built_query: String,
    #[serde(default)]
    queried_timerange: Option<QueriedTimerange>,
}

#[derive(Debug, Deserialize)]
struct QueriedTimerange {
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

impl HistogramResponse {
    /// Buckets are keyed by epoch seconds; order them by time
    fn into_result(self) -> Result<HistogramResult> {
        let mut buckets = self
            .results
            .into_iter()
            .map(|(key, count)| {
                let secs: i64 = key.parse().map_err(|_| {
                    EgressError::ParseError(format!("Invalid histogram bucket key: {}", key))
                })?;
                let timestamp = DateTime::from_timestamp(secs, 0).ok_or_else(|| {
                    EgressError::ParseError(format!("Histogram bucket out of range: {}", secs))
                })?;
                Ok(HistogramBucket { timestamp, count })
            })
            .collect::<Result<Vec<_>>>()?;
        buckets.sort_by_key(|b| b.timestamp);

        let (queried_from, queried_to) = match self.queried_timerange {
            Some(range) => (Some(range.from), Some(range.to)),
            None => (None, None),
        };

        Ok(HistogramResult {
            resolution: self.interval,
            buckets,
            built_query: self.built_query,
            time_ms: self.time,
            queried_from,
            queried_to,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    #[serde(default)]
    streams: Vec<Stream>,
}

#[derive(Debug, Deserialize)]
struct InputsResponse {
    #[serde(default)]
    inputs: Vec<Input>,
}

#[derive(Debug, Deserialize)]
struct FieldsResponse {
    #[serde(default)]
    fields: BTreeSet<String>,
}

#[async_trait]
impl SearchService for GraylogClient {
    #[instrument(skip(self, request), fields(range = %request.range.range_type()))]
    async fn search(&self, request: &SearchRequest) -> loglens_core::Result<QueryResult> {
        let path = format!("/search/universal/{}", request.range.range_type());
        let result: QueryResult = self.get_json(&path, &search_params(request)).await?;
        debug!(
            "Search returned {} results from {} indices in {}ms",
            result.total_results,
            result.used_indices.len(),
            result.time_ms
        );
        Ok(result)
    }

    #[instrument(skip(self, request), fields(resolution = %request.resolution))]
    async fn histogram(&self, request: &HistogramRequest) -> loglens_core::Result<HistogramResult> {
        let path = format!("/search/universal/{}/histogram", request.range.range_type());
        let response: HistogramResponse = self.get_json(&path, &histogram_params(request)).await?;
        Ok(response.into_result()?)
    }
}

#[async_trait]
impl StreamsCatalog for GraylogClient {
    async fn list_streams(&self) -> loglens_core::Result<Vec<Stream>> {
        let response: StreamsResponse = self.get_json("/streams", &[]).await?;
        Ok(response.streams)
    }
}

#[async_trait]
impl DirectoryService for GraylogClient {
    async fn list_inputs(&self) -> loglens_core::Result<Vec<Input>> {
        let response: InputsResponse = self.get_json("/system/inputs", &[]).await?;
        Ok(response.inputs)
    }

    async fn list_nodes(&self) -> loglens_core::Result<Vec<Node>> {
        let response: HashMap<String, Node> = self.get_json("/cluster", &[]).await?;
        let mut nodes: Vec<Node> = response.into_values().collect();
        nodes.sort_by(|a, b| a.node_id.cmp(&b.node_id));
        Ok(nodes)
    }

    async fn list_fields(&self) -> loglens_core::Result<BTreeSet<String>> {
        let response: FieldsResponse = self.get_json("/system/fields", &[]).await?;
        Ok(response.fields)
    }

    async fn current_user(&self) -> loglens_core::Result<CurrentUser> {
        let username = self.config.username.as_deref().ok_or_else(|| {
            loglens_core::Error::Config("No username configured for the current user".to_string())
        })?;
        let user: CurrentUser = self.get_json(&format!("/users/{}", username), &[]).await?;
        Ok(user)
    }
}
