//! LogLens CLI
//!
//! Runs the log search page against a Graylog-compatible REST API

mod app;
mod config;

use anyhow::{Context, anyhow, bail};
use app::{App, summary_line};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use config::LoglensConfig;
use loglens_core::{
    Resolution,
    resolution::minutes_between,
    snapshot::WatchRefreshConfig,
};
use loglens_observability::{
    HealthState, Metrics, ReadinessChecker, SourceState, health_router, init_logging,
};
use loglens_orchestrator::PageView;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "loglens")]
#[command(about = "LogLens - Log search with automatic histogram resolution", long_about = None)]
struct Cli {
    /// Path to a YAML or TOML config file
    #[arg(long, short, env = "LOGLENS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one search and print the page as JSON
    Search {
        /// Query, overrides the configured one
        #[arg(long)]
        query: Option<String>,

        /// Relative range in seconds (0 = all time)
        #[arg(long)]
        range: Option<u64>,

        /// Histogram resolution instead of automatic selection
        #[arg(long)]
        resolution: Option<Resolution>,
    },
    /// Keep the page refreshed and print a line on every change
    Watch {
        /// Serve /healthz, /readyz and /metrics on this address
        #[arg(long)]
        metrics_addr: Option<SocketAddr>,
    },
    /// Print the histogram resolution for a duration
    Resolution {
        #[arg(long, conflicts_with_all = ["from", "to"])]
        minutes: Option<i64>,

        #[arg(long, requires = "to")]
        from: Option<DateTime<Utc>>,

        #[arg(long, requires = "from")]
        to: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => LoglensConfig::from_file(path)?,
        None => LoglensConfig::default(),
    };
    config.merge_env();

    init_logging(&config.logging_options())
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    match cli.command {
        Commands::Search {
            query,
            range,
            resolution,
        } => {
            if let Some(query) = query {
                config.search.query = query;
            }
            if let Some(range) = range {
                config.search.range_secs = range;
            }
            run_search(&config, resolution).await
        }
        Commands::Watch { metrics_addr } => run_watch(&config, metrics_addr).await,
        Commands::Resolution { minutes, from, to } => {
            let minutes = match (minutes, from, to) {
                (Some(minutes), _, _) => minutes,
                (None, Some(from), Some(to)) => minutes_between(to, from),
                _ => bail!("Pass either --minutes or both --from and --to"),
            };
            println!("{}", Resolution::for_minutes(minutes));
            Ok(())
        }
    }
}

async fn run_search(config: &LoglensConfig, resolution: Option<Resolution>) -> anyhow::Result<()> {
    let app = App::build(config, None)?;
    app.page.orchestrator().set_resolution_override(resolution);
    app.load().await;

    match app.page.view() {
        PageView::MalformedQuery(error) => {
            bail!("Malformed query (status {}): {}", error.status, error.message())
        }
        PageView::Loading => {
            let pending: Vec<String> = app
                .page
                .source_statuses()
                .into_iter()
                .filter(|source| source.state == SourceState::Pending)
                .map(|source| source.name)
                .collect();
            bail!("Search page incomplete, missing: {}", pending.join(", "))
        }
        view @ PageView::Ready(_) => {
            let json = serde_json::to_string_pretty(&view).context("Failed to encode page")?;
            println!("{}", json);
            Ok(())
        }
    }
}

async fn run_watch(config: &LoglensConfig, metrics_addr: Option<SocketAddr>) -> anyhow::Result<()> {
    let metrics = Arc::new(Metrics::new()?);
    let app = App::build(config, Some(metrics.clone()))?;

    if let Some(addr) = metrics_addr {
        let checker: Arc<dyn ReadinessChecker> = app.page.clone();
        let router = health_router(HealthState::new(metrics).with_page(checker));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("Observability:");
        info!("   - Health check:       http://{}/healthz", addr);
        info!("   - Readiness check:    http://{}/readyz", addr);
        info!("   - Prometheus metrics: http://{}/metrics", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                warn!("Health server error: {}", e);
            }
        });
    }

    app.load().await;
    let mut watcher = app.page.watcher();
    println!("{}", summary_line(&app.page.view()));

    let refresh_config = WatchRefreshConfig::new(config.refresh);
    let _follow = app.page.orchestrator().watch_refresh_config(&refresh_config);
    if !app.page.orchestrator().timer_active() {
        info!("Periodic refresh disabled, showing the initial result only");
    }

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = watcher.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}", summary_line(&app.page.view()));
            }
        }
    }

    app.page.orchestrator().dispose();
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
