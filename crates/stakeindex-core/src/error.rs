//! Error types for the indexing engine.

use thiserror::Error;

use stakeindex_connector::ConnectorError;
use stakeindex_storage::StorageError;

/// Errors that can occur while indexing.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The upstream node could not be reached or rejected the request.
    /// Recoverable; the scheduler re-requests on its next tick.
    #[error("upstream error: {0}")]
    Upstream(#[from] ConnectorError),

    /// Storage failure. A failure during a block commit rolls the whole
    /// block back; the height stays missing.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// No processor registered for a `(module, command)` pair. Non-fatal:
    /// the transaction is logged and skipped, the block still indexes.
    #[error("no processor registered for {module}:{command}")]
    UnknownProcessor { module: String, command: String },

    /// Height range rejected before any I/O was attempted.
    #[error("invalid height range: {from}..={to}")]
    InvalidRange { from: u64, to: u64 },

    /// The node has no block matching the requested reference.
    #[error("block not found: {0}")]
    BlockNotFound(String),

    /// A transaction was applied out of order for its sender.
    #[error("nonce mismatch for {address}: expected {expected}, got {got}")]
    NonceMismatch {
        address: String,
        expected: u64,
        got: u64,
    },

    /// A transaction payload did not match its processor's schema.
    #[error("invalid params for {module}:{command}: {reason}")]
    InvalidParams {
        module: String,
        command: String,
        reason: String,
    },
}
