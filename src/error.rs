//! Error types for vramroute.

use crate::orchestrator::RunAborted;

/// Result type alias for vramroute operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for vramroute.
///
/// Backend failures never appear here directly: the dispatcher turns them
/// into a [`crate::dispatch::DispatchError`] carrying the classified failure.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("{0}")]
    Aborted(Box<RunAborted>),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<RunAborted> for Error {
    fn from(aborted: RunAborted) -> Self {
        Error::Aborted(Box::new(aborted))
    }
}
