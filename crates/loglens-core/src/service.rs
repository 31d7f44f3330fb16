//! Collaborator trait definitions
//!
//! The orchestrator and search page receive these as explicitly constructed
//! services instead of looking them up from ambient state.

use crate::{
    Result,
    types::{
        CurrentUser, HistogramRequest, HistogramResult, Input, Node, QueryResult, SearchRequest,
        Stream,
    },
};
use async_trait::async_trait;
use std::collections::BTreeSet;

#[async_trait]
pub trait SearchService: Send + Sync {
    /// Run the primary search query
    ///
    /// Client errors (status 400) must surface as `Error::MalformedQuery`
    /// carrying the backend's structured body.
    async fn search(&self, request: &SearchRequest) -> Result<QueryResult>;

    /// Fetch message counts bucketed at the requested resolution
    async fn histogram(&self, request: &HistogramRequest) -> Result<HistogramResult>;
}

#[async_trait]
pub trait StreamsCatalog: Send + Sync {
    async fn list_streams(&self) -> Result<Vec<Stream>>;
}

/// Read access to the cluster's inputs, nodes, fields and the current user
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn list_inputs(&self) -> Result<Vec<Input>>;

    async fn list_nodes(&self) -> Result<Vec<Node>>;

    async fn list_fields(&self) -> Result<BTreeSet<String>>;

    async fn current_user(&self) -> Result<CurrentUser>;
}
