//! Shared HTTP client utilities

use crate::{EgressError, Result};
use reqwest::{Client, ClientBuilder, Proxy};
use std::time::Duration;
use tracing::{debug, warn};

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Time allowed for reading the response, in seconds
    pub read_timeout_secs: u64,

    /// Time allowed for sending the request, in seconds
    pub write_timeout_secs: u64,

    /// Optional HTTP proxy, e.g. `http://proxy.internal:3128`
    pub proxy_uri: Option<String>,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Retries after a failed connection attempt
    pub max_retries: u32,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            read_timeout_secs: 10,
            write_timeout_secs: 10,
            proxy_uri: None,
            pool_max_idle_per_host: 8,
            max_retries: 1,
            user_agent: format!("LogLens/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Whole-request budget: reqwest has a single timeout for send and receive
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs + self.write_timeout_secs)
    }
}

/// Create a configured HTTP client with connection pooling
pub fn create_client(config: &HttpClientConfig) -> Result<Client> {
    let mut builder = ClientBuilder::new()
        .timeout(config.request_timeout())
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(&config.user_agent)
        .use_rustls_tls();

    if let Some(ref proxy_uri) = config.proxy_uri {
        let proxy = Proxy::http(proxy_uri).map_err(|e| {
            EgressError::ConfigError(format!("Invalid proxy URI {}: {}", proxy_uri, e))
        })?;
        debug!("Routing HTTP traffic through proxy {}", proxy_uri);
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| EgressError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

/// Retry an operation when the connection could not be established
///
/// Requests that reached the server are never retried.
pub async fn with_retry<F, Fut, T>(max_retries: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(EgressError::HttpError(e)) if e.is_connect() && attempt < max_retries => {
                attempt += 1;
                let backoff_ms = 2u64.pow(attempt - 1) * 100; // 100ms, 200ms, 400ms
                warn!(
                    "Connection failed (attempt {}/{}), retrying in {}ms: {}",
                    attempt, max_retries, backoff_ms, e
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
