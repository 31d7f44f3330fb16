//! Error types for LogLens Core

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The search backend rejected the query (client error with a structured body)
    #[error("Malformed query (status {status}): {}", ErrorInfo::message_of(body))]
    MalformedQuery {
        status: u16,
        body: serde_json::Value,
    },

    #[error("Search error (status {status}): {message}")]
    Search { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid time range: {0}")]
    InvalidRange(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convert a malformed-query failure into its user-facing form
    pub fn as_error_info(&self) -> Option<ErrorInfo> {
        match self {
            Error::MalformedQuery { status, body } => Some(ErrorInfo {
                status: *status,
                body: body.clone(),
            }),
            _ => None,
        }
    }

    /// Short label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Error::MalformedQuery { .. } => "malformed_query",
            Error::Search { .. } => "search",
            Error::Transport(_) => "transport",
            Error::Parse(_) => "parse",
            Error::InvalidRange(_) => "invalid_range",
            Error::Config(_) => "config",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// User-facing error surfaced by the search page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// HTTP-style status reported by the search backend
    pub status: u16,
    /// Structured error body as returned by the backend
    pub body: serde_json::Value,
}

impl ErrorInfo {
    /// Human readable message, taken from the body's `message` field if present
    pub fn message(&self) -> String {
        Self::message_of(&self.body)
    }

    fn message_of(body: &serde_json::Value) -> String {
        match body.get("message").and_then(|m| m.as_str()) {
            Some(message) => message.to_string(),
            None => body.to_string(),
        }
    }
}
