//! In-memory storage backend.
//!
//! Tables are `BTreeMap`s under a single `RwLock`, so range scans come out in
//! key order for free and a commit is one short critical section. Useful for
//! tests and short-lived indexers that don't need persistence.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::kv::KvValue;
use crate::store::{Store, StoreTransaction, WriteSet};

#[derive(Default)]
struct MemoryInner {
    tables: HashMap<String, BTreeMap<String, Value>>,
    kv: HashMap<String, KvValue>,
}

/// In-memory [`Store`]. All data is lost when the process exits.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    async fn find_range(
        &self,
        table: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<Value>, StorageError> {
        let inner = self.inner.read().unwrap();
        let Some(t) = inner.tables.get(table) else {
            return Ok(vec![]);
        };
        let range = (
            Bound::Included(from.to_string()),
            Bound::Included(to.to_string()),
        );
        Ok(t.range(range).map(|(_, v)| v.clone()).collect())
    }

    async fn find_all(&self, table: &str) -> Result<Vec<Value>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .tables
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, table: &str) -> Result<u64, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.tables.get(table).map(|t| t.len() as u64).unwrap_or(0))
    }

    async fn kv_get(&self, key: &str) -> Result<Option<KvValue>, StorageError> {
        let inner = self.inner.read().unwrap();
        Ok(inner.kv.get(key).cloned())
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError> {
        Ok(Box::new(MemoryTransaction {
            inner: Arc::clone(&self.inner),
            writes: WriteSet::default(),
        }))
    }
}

/// A buffered transaction over a [`MemoryStore`].
struct MemoryTransaction {
    inner: Arc<RwLock<MemoryInner>>,
    writes: WriteSet,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Value>, StorageError> {
        if let Some(buffered) = self.writes.lookup(table, key) {
            return Ok(buffered.cloned());
        }
        let inner = self.inner.read().unwrap();
        Ok(inner.tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    fn upsert(&mut self, table: &str, key: &str, row: Value) {
        self.writes.upsert(table, key, row);
    }

    fn delete(&mut self, table: &str, key: &str) {
        self.writes.delete(table, key);
    }

    fn kv_set(&mut self, key: &str, value: KvValue) {
        self.writes.kv_set(key, value);
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let mut inner = self.inner.write().unwrap();
        for (table, rows) in self.writes.rows {
            let t = inner.tables.entry(table).or_default();
            for (key, row) in rows {
                match row {
                    Some(row) => {
                        t.insert(key, row);
                    }
                    None => {
                        t.remove(&key);
                    }
                }
            }
        }
        for (key, value) in self.writes.kv {
            inner.kv.insert(key, value);
        }
        Ok(())
    }
}
