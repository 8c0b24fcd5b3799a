//! Storage-level error types.

use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An atomic commit failed; none of the buffered writes are visible.
    #[error("store transaction failed: {0}")]
    TransactionFailed(String),

    /// A key-value scalar was read as a type it does not hold. This is a
    /// programming error in the caller, not a transient condition.
    #[error("invalid value type: expected {expected}, found {found}")]
    InvalidValueType { expected: String, found: String },

    /// A row could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific error (I/O, connection, corrupt row).
    #[error("backend error: {0}")]
    Backend(String),
}
