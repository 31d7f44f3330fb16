//! Wiring between the Graylog client, the orchestrator and the search page

use crate::config::LoglensConfig;
use loglens_core::{
    CurrentUser, Input, Node,
    service::{DirectoryService, SearchService, StreamsCatalog},
    snapshot::WatchSnapshot,
};
use loglens_egress::GraylogClient;
use loglens_observability::Metrics;
use loglens_orchestrator::{PageSources, PageView, RefreshOrchestrator, SearchPage};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Catalog snapshots shown next to the search results
#[derive(Default)]
pub struct Directory {
    pub inputs: Arc<WatchSnapshot<Vec<Input>>>,
    pub nodes: Arc<WatchSnapshot<Vec<Node>>>,
    pub fields: Arc<WatchSnapshot<BTreeSet<String>>>,
    pub current_user: Arc<WatchSnapshot<CurrentUser>>,
}

impl Directory {
    /// Fetch every catalog once; failures leave the snapshot empty
    pub async fn load(&self, service: &dyn DirectoryService) {
        let (inputs, nodes, fields, user) = tokio::join!(
            service.list_inputs(),
            service.list_nodes(),
            service.list_fields(),
            service.current_user(),
        );

        match inputs {
            Ok(inputs) => self.inputs.publish(inputs),
            Err(err) => warn!("Failed to load inputs: {}", err),
        }
        match nodes {
            Ok(nodes) => self.nodes.publish(nodes),
            Err(err) => warn!("Failed to load nodes: {}", err),
        }
        match fields {
            Ok(fields) => self.fields.publish(fields),
            Err(err) => warn!("Failed to load fields: {}", err),
        }
        match user {
            Ok(user) => self.current_user.publish(user),
            Err(err) => warn!("Failed to load current user: {}", err),
        }
    }

    pub fn page_sources(&self, streams: Arc<dyn StreamsCatalog>) -> PageSources {
        PageSources {
            streams,
            inputs: self.inputs.clone(),
            nodes: self.nodes.clone(),
            fields: self.fields.clone(),
            current_user: self.current_user.clone(),
        }
    }
}

pub struct App {
    pub page: Arc<SearchPage>,
    pub directory: Directory,
    pub client: Arc<GraylogClient>,
}

impl App {
    pub fn build(config: &LoglensConfig, metrics: Option<Arc<Metrics>>) -> anyhow::Result<Self> {
        let client = Arc::new(GraylogClient::new(config.graylog_config())?);
        info!("Using search backend at {}", config.server.base_url);

        let search: Arc<dyn SearchService> = client.clone();
        let mut orchestrator = RefreshOrchestrator::new(search, config.search_params());
        if let Some(metrics) = metrics {
            orchestrator = orchestrator.with_metrics(metrics);
        }

        let directory = Directory::default();
        let page = SearchPage::new(orchestrator, directory.page_sources(client.clone()), None);

        Ok(Self {
            page: Arc::new(page),
            directory,
            client,
        })
    }

    /// Load streams and catalogs, then run the first refresh cycle
    pub async fn load(&self) {
        if let Err(err) = self.page.load_streams().await {
            warn!("Continuing without streams: {}", err);
        }
        self.directory.load(self.client.as_ref()).await;
        let outcome = self.page.orchestrator().refresh(None).await;
        info!("Initial refresh finished: {:?}", outcome);
    }
}

/// One-line description of the page for terminal output
pub fn summary_line(view: &PageView) -> String {
    match view {
        PageView::MalformedQuery(error) => {
            format!("malformed query (status {}): {}", error.status, error.message())
        }
        PageView::Loading => "loading".to_string(),
        PageView::Ready(view) => {
            let resolution = view
                .resolution
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string());
            format!(
                "query={} results={} took={}ms histogram={} buckets/{} messages resolution={}",
                view.query,
                view.result.total_results,
                view.result.time_ms,
                view.histogram.buckets.len(),
                view.histogram.total_count(),
                resolution,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loglens_core::ErrorInfo;

    #[test]
    fn test_summary_line_loading() {
        assert_eq!(summary_line(&PageView::Loading), "loading");
    }

    #[test]
    fn test_summary_line_malformed() {
        let view = PageView::MalformedQuery(ErrorInfo {
            status: 400,
            body: serde_json::json!({"message": "Cannot parse 'a:'"}),
        });
        assert_eq!(
            summary_line(&view),
            "malformed query (status 400): Cannot parse 'a:'"
        );
    }
}
