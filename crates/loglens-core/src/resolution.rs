//! Histogram resolution selection
//!
//! Maps the effective duration of a search to the bucket granularity used to
//! request its histogram. Durations are measured in whole minutes and
//! classified against fixed ascending thresholds; months and years use the
//! average-month convention (`146097 / 4800` days per month), not calendar
//! months.

use crate::types::{QueryResult, TimeRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const MINUTES_PER_HOUR: f64 = 60.0;
const MINUTES_PER_DAY: f64 = 1440.0;
const DAYS_PER_400_YEARS: f64 = 146_097.0;
const MONTHS_PER_400_YEARS: f64 = 4800.0;

/// Histogram bucket granularity, ordered from finest to coarsest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl Resolution {
    pub const ALL: [Resolution; 7] = [
        Resolution::Minute,
        Resolution::Hour,
        Resolution::Day,
        Resolution::Week,
        Resolution::Month,
        Resolution::Quarter,
        Resolution::Year,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
            Resolution::Day => "day",
            Resolution::Week => "week",
            Resolution::Month => "month",
            Resolution::Quarter => "quarter",
            Resolution::Year => "year",
        }
    }

    /// Classify a duration given in whole minutes
    ///
    /// Each threshold is an exclusive upper bound: exactly 12 hours is
    /// `Hour`, exactly 3 days is `Day`. Negative durations are `Minute`.
    pub fn for_minutes(minutes: i64) -> Self {
        let minutes = minutes as f64;
        let hours = minutes / MINUTES_PER_HOUR;
        let days = minutes / MINUTES_PER_DAY;
        let months = days * MONTHS_PER_400_YEARS / DAYS_PER_400_YEARS;
        let years = months / 12.0;

        if hours < 12.0 {
            Resolution::Minute
        } else if days < 3.0 {
            Resolution::Hour
        } else if days < 30.0 {
            Resolution::Day
        } else if months < 2.0 {
            Resolution::Week
        } else if months < 18.0 {
            Resolution::Month
        } else if years < 3.0 {
            Resolution::Quarter
        } else {
            Resolution::Year
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Resolution::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ResolutionError::Unknown(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// All-time search whose result touched no index spans
    #[error("all-time search result carries no index spans")]
    NoIndices,

    #[error("unknown resolution: {0}")]
    Unknown(String),
}

/// Whole minutes from `earlier` to `later`, truncated toward zero
pub fn minutes_between(later: DateTime<Utc>, earlier: DateTime<Utc>) -> i64 {
    (later - earlier).num_minutes()
}

/// Select the histogram resolution for a search result
///
/// For all-time relative ranges the lower bound comes from the index spans
/// the query touched: spans are ordered by `end` descending and the first
/// one's `begin` is used. Every other range uses the result's own window.
pub fn select_resolution(
    range: &TimeRange,
    result: &QueryResult,
) -> Result<Resolution, ResolutionError> {
    let minutes = if range.is_all_time() {
        let mut spans: Vec<_> = result.used_indices.iter().collect();
        spans.sort_by(|a, b| b.end.cmp(&a.end));
        let reference = spans.first().ok_or(ResolutionError::NoIndices)?;
        minutes_between(result.to, reference.begin)
    } else {
        minutes_between(result.to, result.from)
    };

    Ok(Resolution::for_minutes(minutes))
}
