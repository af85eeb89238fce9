//! Typed errors for the connectors crate.

use shardscan_core::CatalogError;
use thiserror::Error;

/// Errors raised while connecting to a chunk host or streaming its rows.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// A single connection attempt to one host failed. Retried by the
    /// locality connector against another replica.
    #[error("connection to {host} failed: {message}")]
    ConnectionFailure { host: String, message: String },

    /// Every allowed connection attempt failed.
    #[error("could not connect to chunk '{chunk}' after {attempts} attempts: {last_error}")]
    ConnectionExhausted {
        chunk: String,
        attempts: usize,
        last_error: String,
    },

    /// The SQL text failed to execute, or a fetch failed server-side.
    #[error("query failed: {0}")]
    QueryExecutionFailure(String),

    /// The row decoder rejected the row at `position`.
    #[error("row {position} could not be decoded: {message}")]
    RowDecodeFailure { position: u64, message: String },

    /// Releasing the cursor, statement or connection failed.
    #[error("release failed: {0}")]
    Release(String),

    /// Invalid or missing configuration.
    #[error("config error: {0}")]
    Config(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ConnectorError {
    pub fn connection(host: &str, err: impl std::fmt::Display) -> Self {
        ConnectorError::ConnectionFailure {
            host: host.to_string(),
            message: err.to_string(),
        }
    }

    /// Whether the locality connector may retry against another host.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ConnectorError::ConnectionFailure { .. })
    }
}
