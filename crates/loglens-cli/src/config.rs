use anyhow::Context;
use loglens_core::{RefreshConfig, SearchParams, TimeRange};
use loglens_egress::{GraylogConfig, client::HttpClientConfig};
use loglens_observability::LoggingOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoglensConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Search backend location and credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_io_timeout")]
    pub read_timeout_secs: u64,

    #[serde(default = "default_io_timeout")]
    pub write_timeout_secs: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_uri: Option<String>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_query")]
    pub query: String,

    /// Relative range in seconds, 0 searches all time
    #[serde(default = "default_range_secs")]
    pub range_secs: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_false")]
    pub json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            password: None,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_io_timeout(),
            write_timeout_secs: default_io_timeout(),
            proxy_uri: None,
            max_retries: default_max_retries(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query: default_query(),
            range_secs: default_range_secs(),
            limit: None,
            stream_id: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl LoglensConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config = if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml::from_str(&contents)
                .with_context(|| format!("Invalid TOML in {}", path.display()))?
        } else {
            // Default to YAML
            serde_yaml::from_str(&contents)
                .with_context(|| format!("Invalid YAML in {}", path.display()))?
        };

        Ok(config)
    }

    /// Merge environment variables into config (env vars take precedence)
    pub fn merge_env(&mut self) {
        // Server
        if let Ok(val) = std::env::var("LOGLENS_BASE_URL") {
            self.server.base_url = val;
        }

        if let Ok(val) = std::env::var("LOGLENS_USERNAME") {
            self.server.username = Some(val);
        }

        if let Ok(val) = std::env::var("LOGLENS_PASSWORD") {
            self.server.password = Some(val);
        }

        // HTTP client
        if let Ok(val) = std::env::var("LOGLENS_PROXY_URI") {
            self.http.proxy_uri = Some(val);
        }

        if let Ok(val) = std::env::var("LOGLENS_CONNECT_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.http.connect_timeout_secs = secs;
            }
        }

        // Refresh
        if let Ok(val) = std::env::var("LOGLENS_REFRESH_ENABLED") {
            if let Ok(enabled) = val.parse::<bool>() {
                self.refresh.enabled = enabled;
            }
        }

        if let Ok(val) = std::env::var("LOGLENS_REFRESH_INTERVAL_MS") {
            if let Ok(interval_ms) = val.parse::<u64>() {
                self.refresh.interval_ms = interval_ms;
            }
        }

        // Search
        if let Ok(val) = std::env::var("LOGLENS_QUERY") {
            self.search.query = val;
        }

        if let Ok(val) = std::env::var("LOGLENS_STREAM_ID") {
            self.search.stream_id = Some(val);
        }

        // Logging
        if let Ok(val) = std::env::var("LOGLENS_LOG_LEVEL") {
            self.logging.level = val;
        }

        if let Ok(val) = std::env::var("LOGLENS_LOG_JSON") {
            if let Ok(json) = val.parse::<bool>() {
                self.logging.json = json;
            }
        }
    }

    pub fn graylog_config(&self) -> GraylogConfig {
        let client_config = HttpClientConfig {
            connect_timeout_secs: self.http.connect_timeout_secs,
            read_timeout_secs: self.http.read_timeout_secs,
            write_timeout_secs: self.http.write_timeout_secs,
            proxy_uri: self.http.proxy_uri.clone(),
            max_retries: self.http.max_retries,
            ..HttpClientConfig::default()
        };

        let config = GraylogConfig::new(&self.server.base_url).with_client_config(client_config);
        match (&self.server.username, &self.server.password) {
            (Some(username), password) => {
                config.with_credentials(username, password.clone().unwrap_or_default())
            }
            (None, _) => config,
        }
    }

    pub fn search_params(&self) -> SearchParams {
        let mut params = SearchParams::new(
            self.search.query.clone(),
            TimeRange::relative(self.search.range_secs),
        );
        params.limit = self.search.limit;
        params.stream_id = self.search.stream_id.clone();
        params
    }

    pub fn logging_options(&self) -> LoggingOptions {
        LoggingOptions {
            level: self.logging.level.clone(),
            json: self.logging.json,
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:9000/api".to_string()
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_io_timeout() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    1
}

fn default_query() -> String {
    "*".to_string()
}

fn default_range_secs() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_false() -> bool {
    false
}
