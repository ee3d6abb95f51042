//! Error types for the traffic generator.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using LoadError.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors raised while preparing or running a load test.
///
/// Individual request failures are not errors: they are recorded as
/// outcomes and never interrupt an iteration.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read scenario {path}: {source}")]
    ScenarioRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse scenario {path}: {source}")]
    ScenarioParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration for '{field}': {message}")]
    InvalidConfig { field: &'static str, message: String },

    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Virtual user task failed: {0}")]
    VirtualUser(#[from] tokio::task::JoinError),
}

impl LoadError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            message: message.into(),
        }
    }
}
