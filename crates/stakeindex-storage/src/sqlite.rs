//! SQLite storage backend for StakeIndex.
//!
//! Persists document rows and key-value scalars to a single SQLite file.
//! Uses `sqlx` with WAL mode for concurrent read performance. The buffered
//! write-set of a [`StoreTransaction`] is replayed inside one sqlx
//! transaction on commit, so per-block atomicity holds across restarts.
//!
//! # Usage
//! ```rust,no_run
//! use stakeindex_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./index.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::error::StorageError;
use crate::kv::KvValue;
use crate::store::{Store, StoreTransaction, WriteSet};

/// SQLite-backed [`Store`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./index.db"`) or a full
    /// SQLite URL (`"sqlite:./index.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database.
    ///
    /// Pinned to a single connection so every query sees the same database.
    /// All data is lost when the pool is dropped. Ideal for tests.
    pub async fn in_memory() -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create tables and enable WAL mode.
    async fn init_schema(&self) -> Result<(), StorageError> {
        // WAL mode for better concurrent read throughput
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS rows (
                tbl   TEXT NOT NULL,
                key   TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (tbl, key)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                kind  TEXT NOT NULL,
                value TEXT NOT NULL
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(())
    }

    fn decode_row(raw: String) -> Result<Value, StorageError> {
        serde_json::from_str(&raw).map_err(StorageError::Serialization)
    }

    fn decode_kv(key: &str, kind: &str, raw: &str) -> Result<KvValue, StorageError> {
        let corrupt = || StorageError::Backend(format!("corrupt kv row for '{key}'"));
        match kind {
            "bool" => Ok(KvValue::Bool(raw == "true")),
            "int" => raw.parse().map(KvValue::Int).map_err(|_| corrupt()),
            "bigint" => raw.parse().map(KvValue::BigInt).map_err(|_| corrupt()),
            "text" => Ok(KvValue::Text(raw.to_string())),
            other => Err(StorageError::InvalidValueType {
                expected: "bool|int|bigint|text".to_string(),
                found: other.to_string(),
            }),
        }
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let row = sqlx::query("SELECT value FROM rows WHERE tbl = ? AND key = ?")
            .bind(table)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(|r| Self::decode_row(r.get("value"))).transpose()
    }

    async fn find_range(
        &self,
        table: &str,
        from: &str,
        to: &str,
    ) -> Result<Vec<Value>, StorageError> {
        let rows = sqlx::query(
            "SELECT value FROM rows
             WHERE tbl = ? AND key >= ? AND key <= ? ORDER BY key",
        )
        .bind(table)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter()
            .map(|r| Self::decode_row(r.get("value")))
            .collect()
    }

    async fn find_all(&self, table: &str) -> Result<Vec<Value>, StorageError> {
        let rows = sqlx::query("SELECT value FROM rows WHERE tbl = ? ORDER BY key")
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        rows.into_iter()
            .map(|r| Self::decode_row(r.get("value")))
            .collect()
    }

    async fn count(&self, table: &str) -> Result<u64, StorageError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM rows WHERE tbl = ?")
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let cnt: i64 = row.get("cnt");
        Ok(cnt as u64)
    }

    async fn kv_get(&self, key: &str) -> Result<Option<KvValue>, StorageError> {
        let row = sqlx::query("SELECT kind, value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(|r| {
            let kind: String = r.get("kind");
            let raw: String = r.get("value");
            Self::decode_kv(key, &kind, &raw)
        })
        .transpose()
    }

    async fn begin(&self) -> Result<Box<dyn StoreTransaction>, StorageError> {
        Ok(Box::new(SqliteTransaction {
            pool: self.pool.clone(),
            writes: WriteSet::default(),
        }))
    }
}

/// A buffered transaction over a [`SqliteStore`].
struct SqliteTransaction {
    pool: SqlitePool,
    writes: WriteSet,
}

#[async_trait]
impl StoreTransaction for SqliteTransaction {
    async fn get(&self, table: &str, key: &str) -> Result<Option<Value>, StorageError> {
        if let Some(buffered) = self.writes.lookup(table, key) {
            return Ok(buffered.cloned());
        }
        let row = sqlx::query("SELECT value FROM rows WHERE tbl = ? AND key = ?")
            .bind(table)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        row.map(|r| SqliteStore::decode_row(r.get("value"))).transpose()
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
        let written = self.writes.len();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;

        for (table, rows) in &self.writes.rows {
            for (key, row) in rows {
                match row {
                    Some(row) => {
                        let raw = serde_json::to_string(row)?;
                        sqlx::query(
                            "INSERT OR REPLACE INTO rows (tbl, key, value) VALUES (?, ?, ?)",
                        )
                        .bind(table)
                        .bind(key)
                        .bind(raw)
                        .execute(&mut *tx)
                        .await
                        .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;
                    }
                    None => {
                        sqlx::query("DELETE FROM rows WHERE tbl = ? AND key = ?")
                            .bind(table)
                            .bind(key)
                            .execute(&mut *tx)
                            .await
                            .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;
                    }
                }
            }
        }

        for (key, value) in &self.writes.kv {
            sqlx::query("INSERT OR REPLACE INTO kv (key, kind, value) VALUES (?, ?, ?)")
                .bind(key)
                .bind(value.kind())
                .bind(value.to_string())
                .execute(&mut *tx)
                .await
                .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::TransactionFailed(e.to_string()))?;

        debug!(written, "transaction committed");
        Ok(())
    }
}
