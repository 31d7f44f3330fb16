//! Structured logging setup
//!
//! Installs a global `tracing` subscriber. `RUST_LOG`, when set, takes
//! precedence over the configured level.

use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// trace, debug, info, warn or error
    pub level: String,
    /// Emit JSON lines instead of human readable output
    pub json: bool,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Parse a configured level, falling back to INFO
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Build the env filter: `RUST_LOG` if present, the configured level otherwise
pub fn build_filter(options: &LoggingOptions) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parse_level(&options.level).to_string()))
}

/// Install the global subscriber
pub fn init_logging(
    options: &LoggingOptions,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = build_filter(options);

    if options.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warn"), Level::WARN);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    #[serial]
    fn test_build_filter_uses_configured_level() {
        unsafe { std::env::remove_var("RUST_LOG") };
        let filter = build_filter(&LoggingOptions {
            level: "debug".to_string(),
            json: false,
        });
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    #[serial]
    fn test_build_filter_prefers_rust_log() {
        unsafe { std::env::set_var("RUST_LOG", "warn") };
        let filter = build_filter(&LoggingOptions::default());
        unsafe { std::env::remove_var("RUST_LOG") };
        assert_eq!(filter.to_string(), "warn");
    }
}
