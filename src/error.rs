//! Error types for each pipeline stage.
//!
//! Only [`OutputError`] and [`ConfigError`] may stop a run. Provider and model
//! errors are absorbed by the stage that raised them and turned into degraded
//! results (an empty provider list, a fallback summary).

use std::time::Duration;
use thiserror::Error;

/// Failure of a single source adapter. The orchestrator converts it into an
/// empty article list for that provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("feed parse failed: {0}")]
    Feed(String),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Failure of one language model call. Always recoverable: the summarizer
/// substitutes its deterministic fallback.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    Http(reqwest::Error),

    #[error("model endpoint returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("malformed model response: {0}")]
    Malformed(String),

    /// The endpoint rejected the credentials; retrying cannot help.
    #[error("model endpoint rejected the credentials (status {0})")]
    Unavailable(u16),
}

// Request URLs can carry API keys in the query string, so they are dropped
// before the error is stored or logged.
impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        ProviderError::Http(e.without_url())
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        ModelError::Http(e.without_url())
    }
}

/// Failure to persist the snapshot. The only error class that fails a run.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid or unreadable configuration, reported at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
