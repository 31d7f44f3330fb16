//! LogLens Egress Connectors
//!
//! This crate provides the HTTP connector to the log search backend:
//! - Shared HTTP client construction (timeouts, proxy, retry on connect failure)
//! - Graylog REST connector implementing the core collaborator traits

pub mod client;
pub mod graylog;

pub use graylog::{GraylogClient, GraylogConfig};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EgressError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Malformed query (status {status_code}): {body}")]
    MalformedQuery {
        status_code: u16,
        body: serde_json::Value,
    },

    #[error("Search backend error ({status_code}): {message}")]
    ProviderError { status_code: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

pub type Result<T> = std::result::Result<T, EgressError>;

impl From<EgressError> for loglens_core::Error {
    fn from(err: EgressError) -> Self {
        match err {
            EgressError::HttpError(e) => loglens_core::Error::Transport(e.to_string()),
            EgressError::MalformedQuery { status_code, body } => {
                loglens_core::Error::MalformedQuery {
                    status: status_code,
                    body,
                }
            }
            EgressError::ProviderError {
                status_code,
                message,
            } => loglens_core::Error::Search {
                status: status_code,
                message,
            },
            EgressError::ParseError(msg) => loglens_core::Error::Parse(msg),
            EgressError::ConfigError(msg) => loglens_core::Error::Config(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_query_maps_to_core() {
        let err = EgressError::MalformedQuery {
            status_code: 400,
            body: serde_json::json!({"message": "bad"}),
        };

        let core: loglens_core::Error = err.into();
        let info = core.as_error_info().unwrap();
        assert_eq!(info.status, 400);
        assert_eq!(info.message(), "bad");
    }

    #[test]
    fn test_provider_error_maps_to_search_error() {
        let err = EgressError::ProviderError {
            status_code: 502,
            message: "bad gateway".to_string(),
        };

        let core: loglens_core::Error = err.into();
        assert!(matches!(
            core,
            loglens_core::Error::Search { status: 502, .. }
        ));
    }

    #[test]
    fn test_config_error_display() {
        let err = EgressError::ConfigError("bad proxy".to_string());
        assert!(err.to_string().contains("Invalid configuration"));
    }
}
