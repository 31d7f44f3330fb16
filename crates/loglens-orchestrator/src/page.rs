//! Search page composition
//!
//! Merges the orchestrator's state with the catalog snapshots (streams,
//! inputs, nodes, fields, current user) into a single view model.

use crate::orchestrator::{OrchestratorState, RefreshOrchestrator};
use loglens_core::{
    CurrentUser, ErrorInfo, HistogramResult, Input, Node, QueryResult, Resolution, Result, Stream,
    service::StreamsCatalog, snapshot::SnapshotSource,
};
use loglens_observability::{ReadinessChecker, SourceStatus};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Fields shown for every new page
pub const DEFAULT_SELECTED_FIELDS: [&str; 2] = ["message", "source"];

pub type StreamMap = BTreeMap<String, Stream>;

/// Collaborators the page reads from
#[derive(Clone)]
pub struct PageSources {
    pub streams: Arc<dyn StreamsCatalog>,
    pub inputs: Arc<dyn SnapshotSource<Vec<Input>>>,
    pub nodes: Arc<dyn SnapshotSource<Vec<Node>>>,
    pub fields: Arc<dyn SnapshotSource<BTreeSet<String>>>,
    pub current_user: Arc<dyn SnapshotSource<CurrentUser>>,
}

/// Everything needed to render a loaded search page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchPageView {
    pub query: String,
    pub page: u32,
    pub built_query: String,
    pub result: Arc<QueryResult>,
    pub histogram: Arc<HistogramResult>,
    pub resolution: Option<Resolution>,
    pub streams: Arc<StreamMap>,
    /// Keyed by input id
    pub inputs: BTreeMap<String, Input>,
    /// Keyed by node id
    pub nodes: BTreeMap<String, Node>,
    /// All known fields, `source` first
    pub fields: Vec<String>,
    pub selected_fields: Vec<String>,
    pub permissions: Vec<String>,
    pub search_in_stream: Option<Stream>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageView {
    /// The last search was rejected by the backend
    MalformedQuery(ErrorInfo),
    /// At least one source has not delivered data yet
    Loading,
    Ready(Box<SearchPageView>),
}

impl PageView {
    pub fn is_loading(&self) -> bool {
        matches!(self, PageView::Loading)
    }
}

pub struct SearchPage {
    orchestrator: RefreshOrchestrator,
    sources: PageSources,
    search_in_stream: Option<Stream>,
    streams: watch::Sender<Option<Arc<StreamMap>>>,
    selected_fields: Vec<String>,
}

impl SearchPage {
    pub fn new(
        orchestrator: RefreshOrchestrator,
        sources: PageSources,
        search_in_stream: Option<Stream>,
    ) -> Self {
        if let Some(stream) = &search_in_stream {
            orchestrator.set_stream_scope(Some(stream.id.clone()));
        }

        Self {
            orchestrator,
            sources,
            search_in_stream,
            streams: watch::Sender::new(None),
            selected_fields: DEFAULT_SELECTED_FIELDS.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn orchestrator(&self) -> &RefreshOrchestrator {
        &self.orchestrator
    }

    /// Fetch the stream list and keep it keyed by id
    pub async fn load_streams(&self) -> Result<()> {
        let streams = match self.sources.streams.list_streams().await {
            Ok(streams) => streams,
            Err(err) => {
                warn!("Failed to load streams: {}", err);
                return Err(err);
            }
        };

        let map: StreamMap = streams
            .into_iter()
            .map(|stream| (stream.id.clone(), stream))
            .collect();
        debug!("Loaded {} streams", map.len());
        self.streams.send_replace(Some(Arc::new(map)));
        Ok(())
    }

    pub fn selected_fields(&self) -> &[String] {
        &self.selected_fields
    }

    /// Toggle a field in the selection
    ///
    /// A field is removed only when it sits after the first position;
    /// otherwise it is appended.
    pub fn toggle_field(&mut self, name: &str) {
        match self.selected_fields.iter().position(|field| field == name) {
            Some(index) if index > 0 => self.selected_fields.retain(|field| field != name),
            _ => self.selected_fields.push(name.to_string()),
        }
    }

    pub fn view(&self) -> PageView {
        let state = self.orchestrator.snapshot();
        if let Some(error) = state.last_error {
            return PageView::MalformedQuery(error);
        }

        let streams = self.streams.borrow().clone();
        let (
            Some(result),
            Some(histogram),
            Some(streams),
            Some(inputs),
            Some(nodes),
            Some(fields),
            Some(user),
        ) = (
            state.last_result,
            state.last_histogram,
            streams,
            self.sources.inputs.current(),
            self.sources.nodes.current(),
            self.sources.fields.current(),
            self.sources.current_user.current(),
        )
        else {
            return PageView::Loading;
        };

        PageView::Ready(Box::new(SearchPageView {
            query: state.params.query,
            page: state.params.page,
            built_query: result.built_query.clone(),
            result,
            histogram,
            resolution: state.last_resolution,
            streams,
            inputs: inputs
                .into_iter()
                .map(|input| (input.id.clone(), input))
                .collect(),
            nodes: nodes
                .into_iter()
                .map(|node| (node.node_id.clone(), node))
                .collect(),
            fields: sort_fields(fields),
            selected_fields: self.selected_fields.clone(),
            permissions: user.permissions,
            search_in_stream: self.search_in_stream.clone(),
        }))
    }

    /// Subscribe to every channel the view depends on
    pub fn watcher(&self) -> PageWatcher {
        PageWatcher {
            state: self.orchestrator.subscribe(),
            streams: self.streams.subscribe(),
            inputs: self.sources.inputs.subscribe(),
            nodes: self.sources.nodes.subscribe(),
            fields: self.sources.fields.subscribe(),
            current_user: self.sources.current_user.subscribe(),
        }
    }

    fn statuses(&self, state: &OrchestratorState) -> Vec<SourceStatus> {
        let search = match (&state.last_error, &state.last_result) {
            (Some(error), _) => SourceStatus::error("search", error.message()),
            (None, result) => SourceStatus::from_presence("search", result.is_some()),
        };

        vec![
            search,
            SourceStatus::from_presence("histogram", state.last_histogram.is_some()),
            SourceStatus::from_presence("streams", self.streams.borrow().is_some()),
            SourceStatus::from_presence("inputs", self.sources.inputs.current().is_some()),
            SourceStatus::from_presence("nodes", self.sources.nodes.current().is_some()),
            SourceStatus::from_presence("fields", self.sources.fields.current().is_some()),
            SourceStatus::from_presence(
                "current_user",
                self.sources.current_user.current().is_some(),
            ),
        ]
    }
}

impl ReadinessChecker for SearchPage {
    fn source_statuses(&self) -> Vec<SourceStatus> {
        self.statuses(&self.orchestrator.snapshot())
    }
}

/// Resolves whenever any input of [`SearchPage::view`] changes
pub struct PageWatcher {
    state: watch::Receiver<OrchestratorState>,
    streams: watch::Receiver<Option<Arc<StreamMap>>>,
    inputs: watch::Receiver<Option<Vec<Input>>>,
    nodes: watch::Receiver<Option<Vec<Node>>>,
    fields: watch::Receiver<Option<BTreeSet<String>>>,
    current_user: watch::Receiver<Option<CurrentUser>>,
}

impl PageWatcher {
    /// Wait for the next change; errors once a source has been dropped
    pub async fn changed(&mut self) -> std::result::Result<(), watch::error::RecvError> {
        tokio::select! {
            changed = self.state.changed() => changed,
            changed = self.streams.changed() => changed,
            changed = self.inputs.changed() => changed,
            changed = self.nodes.changed() => changed,
            changed = self.fields.changed() => changed,
            changed = self.current_user.changed() => changed,
        }
    }
}

/// Order fields for display: `source` first, the rest case-insensitively
pub fn sort_fields<I>(fields: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    let mut seen = BTreeSet::new();
    let mut has_source = false;
    let mut rest = Vec::new();

    for field in fields {
        let field = field.into();
        if field == "source" {
            has_source = true;
        } else if seen.insert(field.clone()) {
            rest.push(field);
        }
    }
    rest.sort_by_cached_key(|field| field.to_lowercase());

    let mut sorted = Vec::with_capacity(rest.len() + 1);
    if has_source {
        sorted.push("source".to_string());
    }
    sorted.extend(rest);
    sorted
}
