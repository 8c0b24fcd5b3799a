//! The `Store` / `StoreTransaction` traits: the storage contract the
//! indexer is written against.
//!
//! Rows are JSON documents keyed by `(table, key)`; keys are ordered, so a
//! fixed-width encoding of numeric keys gives cheap range scans. Mutations go
//! through a [`StoreTransaction`]: writes are buffered in a write-set and
//! applied atomically on [`StoreTransaction::commit`]. Dropping a transaction
//! without committing discards every buffered write.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::kv::KvValue;

/// Read surface plus transaction entry point.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn Store>`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Fetch a single row.
    async fn get(&self, table: &str, key: &str) -> Result<Option<Value>, StorageError>;

    /// Fetch all rows with `from <= key <= to`, in key order.
    async fn find_range(
        &self,
        table: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<Value>, StorageError>;

    /// Fetch every row of a table, in key order.
    async fn find_all(&self, table: &str) -> Result<Vec<Value>, StorageError>;

    /// Number of rows in a table.
    async fn count(&self, table: &str) -> Result<u64, StorageError>;

    /// Read a scalar from the key-value side store.
    async fn kv_get(&self, key: &str) -> Result<Option<KvValue>, StorageError>;

    /// Start a new transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError>;
}

/// A buffered write-set over a [`Store`].
///
/// Reads see the transaction's own writes first (read-your-writes), then the
/// committed state. `commit` applies the whole write-set atomically; a
/// transaction that is dropped instead of committed has no effect.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Read a row through the write-set overlay.
    async fn get(&self, table: &str, key: &str) -> Result<Option<Value>, StorageError>;

    /// Buffer an insert-or-overwrite of a row.
    fn upsert(&mut self, table: &str, key: &str, row: Value);

    /// Buffer a row deletion.
    fn delete(&mut self, table: &str, key: &str);

    /// Buffer a scalar write to the key-value side store.
    fn kv_set(&mut self, key: &str, value: KvValue);

    /// Apply the write-set atomically. Either every buffered write becomes
    /// visible or none does.
    async fn commit(self: Box<Self>) -> Result<(), StorageError>;
}

// ─── WriteSet ─────────────────────────────────────────────────────────────────

/// The buffered mutations of one transaction, shared by all backends.
///
/// Per `(table, key)` the last buffered write wins; `None` marks a deletion.
#[derive(Debug, Default)]
pub struct WriteSet {
    pub rows: std::collections::HashMap<String, std::collections::BTreeMap<String, Option<Value>>>,
    pub kv: std::collections::HashMap<String, KvValue>,
}

impl WriteSet {
    pub fn upsert(&mut self, table: &str, key: &str, row: Value) {
        self.rows
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), Some(row));
    }

    pub fn delete(&mut self, table: &str, key: &str) {
        self.rows
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), None);
    }

    pub fn kv_set(&mut self, key: &str, value: KvValue) {
        self.kv.insert(key.to_string(), value);
    }

    /// The buffered state of `(table, key)`, if this write-set touches it.
    /// `Some(None)` means the row is deleted in this transaction.
    pub fn lookup(&self, table: &str, key: &str) -> Option<Option<&Value>> {
        self.rows
            .get(table)
            .and_then(|t| t.get(key))
            .map(|row| row.as_ref())
    }

    /// Total number of buffered writes: row upserts, deletions and scalars.
    pub fn len(&self) -> usize {
        self.rows.values().map(|t| t.len()).sum::<usize>() + self.kv.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
