//! Connector-level error types.

use thiserror::Error;

/// Errors that can occur while talking to the upstream node.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The node could not be reached (connection refused, DNS failure, ...).
    #[error("node unavailable: {0}")]
    Unavailable(String),

    /// The request did not complete within the configured timeout.
    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Protocol-level error returned by the node.
    #[error("node RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Response could not be deserialized.
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),

    /// An unexpected error.
    #[error("{0}")]
    Other(String),
}

impl ConnectorError {
    /// Returns `true` if this error is transient and the call may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. })
    }
}
