//! stakeindex-storage: pluggable transactional storage for StakeIndex.
//!
//! The indexer depends only on the [`Store`] / [`StoreTransaction`] traits:
//! document tables with ordered keys, a typed key-value side store for scalar
//! bookkeeping, and buffered write-set transactions that commit atomically.
//!
//! Backends:
//! - [`memory`]: in-memory (dev/testing, no persistence)
//! - [`sqlite`]: SQLite via `sqlx` (embedded, single-file persistence)

pub mod error;
pub mod kv;
pub mod memory;
pub mod store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use error::StorageError;
pub use kv::KvValue;
pub use memory::MemoryStore;
pub use store::{Store, StoreTransaction};
