//! LogLens Core Types and Traits
//!
//! This crate provides the fundamental types and traits used throughout LogLens:
//! - Search, histogram and catalog data model
//! - Histogram resolution selection
//! - Collaborator trait abstractions (search service, catalogs)
//! - Snapshot sources with change notification
//! - Core error types

pub mod error;
pub mod resolution;
pub mod service;
pub mod snapshot;
pub mod types;

pub use error::{Error, ErrorInfo, Result};
pub use resolution::{Resolution, ResolutionError, select_resolution};
pub use types::{
    CurrentUser, HistogramBucket, HistogramRequest, HistogramResult, IndexSpan, Input, Node,
    QueryResult, RangeType, RefreshConfig, SearchParams, SearchRequest, SortDirection, SortOrder,
    Stream, TimeRange,
};
