//! Search, histogram and catalog data model

use crate::resolution::Resolution;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Wire name of a time range kind, as used in search API paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeType {
    Relative,
    Absolute,
}

impl RangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RangeType::Relative => "relative",
            RangeType::Absolute => "absolute",
        }
    }
}

impl fmt::Display for RangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Time window of a search
///
/// Deserialization goes through [`TimeRange::absolute`], so an inverted
/// absolute window is rejected when parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", try_from = "RawTimeRange")]
pub enum TimeRange {
    /// The last `range_secs` seconds; `0` searches all time
    Relative { range_secs: u64 },
    /// Fixed window; `from <= to`
    Absolute {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// Unchecked wire form of [`TimeRange`]
#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawTimeRange {
    Relative {
        range_secs: u64,
    },
    Absolute {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = Error;

    fn try_from(raw: RawTimeRange) -> Result<Self> {
        match raw {
            RawTimeRange::Relative { range_secs } => Ok(TimeRange::relative(range_secs)),
            RawTimeRange::Absolute { from, to } => TimeRange::absolute(from, to),
        }
    }
}

impl TimeRange {
    /// Relative range covering the last `range_secs` seconds
    pub fn relative(range_secs: u64) -> Self {
        TimeRange::Relative { range_secs }
    }

    /// Relative range covering all stored messages
    pub fn all_time() -> Self {
        TimeRange::Relative { range_secs: 0 }
    }

    /// Absolute range, rejecting windows that end before they start
    pub fn absolute(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        if from > to {
            return Err(Error::InvalidRange(format!(
                "range starts at {} but ends earlier at {}",
                from.to_rfc3339(),
                to.to_rfc3339()
            )));
        }
        Ok(TimeRange::Absolute { from, to })
    }

    pub fn range_type(&self) -> RangeType {
        match self {
            TimeRange::Relative { .. } => RangeType::Relative,
            TimeRange::Absolute { .. } => RangeType::Absolute,
        }
    }

    pub fn is_all_time(&self) -> bool {
        matches!(self, TimeRange::Relative { range_secs: 0 })
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        // Last five minutes
        TimeRange::Relative { range_secs: 300 }
    }
}

/// One physical storage segment touched by a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpan {
    pub index_name: String,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Result of a primary search query
///
/// Shared as `Arc<QueryResult>` once received; a refresh produces a new instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub built_query: String,
    #[serde(default)]
    pub used_indices: Vec<IndexSpan>,
    #[serde(default)]
    pub messages: Vec<serde_json::Value>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub total_results: u64,
    #[serde(default, rename = "time")]
    pub time_ms: u64,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

/// A single histogram bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    pub timestamp: DateTime<Utc>,
    pub count: u64,
}

/// Message counts aggregated at a given resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramResult {
    pub resolution: Resolution,
    /// Ordered by timestamp
    pub buckets: Vec<HistogramBucket>,
    pub built_query: String,
    pub time_ms: u64,
    pub queried_from: Option<DateTime<Utc>>,
    pub queried_to: Option<DateTime<Utc>>,
}

impl HistogramResult {
    pub fn total_count(&self) -> u64 {
        self.buckets.iter().map(|b| b.count).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Sort field and direction for search results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    pub direction: SortDirection,
}

impl SortOrder {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Query parameter form, e.g. `timestamp:desc`
    pub fn to_param(&self) -> String {
        let direction = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        format!("{}:{}", self.field, direction)
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        Self::new("timestamp", SortDirection::Desc)
    }
}

/// Primary search request as sent to a [`crate::service::SearchService`]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub range: TimeRange,
    pub query: String,
    pub stream_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: u32,
    pub sort: Option<SortOrder>,
}

/// Histogram request issued after a successful search
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramRequest {
    pub range: TimeRange,
    pub query: String,
    pub resolution: Resolution,
    pub stream_id: Option<String>,
}

/// Current search inputs owned by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    pub range: TimeRange,
    /// Restrict the search to a single stream
    pub stream_id: Option<String>,
    /// 1-based result page
    pub page: u32,
    pub limit: Option<u32>,
    pub sort: Option<SortOrder>,
    /// Explicit histogram resolution that bypasses automatic selection
    pub resolution_override: Option<Resolution>,
}

impl SearchParams {
    pub fn new(query: impl Into<String>, range: TimeRange) -> Self {
        Self {
            query: normalize_query(query.into()),
            range,
            ..Self::default()
        }
    }

    pub fn search_request(&self) -> SearchRequest {
        let offset = match self.limit {
            Some(limit) => self.page.saturating_sub(1).saturating_mul(limit),
            None => 0,
        };
        SearchRequest {
            range: self.range,
            query: self.query.clone(),
            stream_id: self.stream_id.clone(),
            limit: self.limit,
            offset,
            sort: self.sort.clone(),
        }
    }

    pub fn histogram_request(&self, resolution: Resolution) -> HistogramRequest {
        HistogramRequest {
            range: self.range,
            query: self.query.clone(),
            resolution,
            stream_id: self.stream_id.clone(),
        }
    }
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            query: "*".to_string(),
            range: TimeRange::default(),
            stream_id: None,
            page: 1,
            limit: None,
            sort: Some(SortOrder::default()),
            resolution_override: None,
        }
    }
}

/// Empty queries search for everything
pub fn normalize_query(query: String) -> String {
    if query.trim().is_empty() {
        "*".to_string()
    } else {
        query
    }
}

/// Periodic refresh settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl RefreshConfig {
    pub fn enabled(interval_ms: u64) -> Self {
        Self {
            enabled: true,
            interval_ms,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            interval_ms: default_interval_ms(),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

fn default_interval_ms() -> u64 {
    5000
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub id: String,
    pub title: String,
    /// Input type name
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub node: Option<String>,
    #[serde(default)]
    pub global: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub node_id: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub transport_address: String,
    #[serde(default)]
    pub is_master: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}
