//! Coordinator error types.

use thiserror::Error;

use stakeindex_connector::ConnectorError;
use stakeindex_core::IndexError;

/// Errors surfaced by coordinator operations.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// The upstream node could not be reached. Retried on the next tick.
    #[error("upstream error: {0}")]
    Upstream(#[from] ConnectorError),

    /// An indexer operation failed.
    #[error("index error: {0}")]
    Index(#[from] IndexError),
}
