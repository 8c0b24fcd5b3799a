//! Index progress marker: how far the index has come.
//!
//! The marker is process-wide state owned by the indexer, persisted to the
//! key-value store inside every block commit, and re-loaded at startup.
//! Readers (health checks, the coordinator) only ever see committed values.

use serde::Serialize;

use stakeindex_connector::BlockHeader;
use stakeindex_storage::{KvValue, StorageError, Store, StoreTransaction};

const KEY_GENESIS: &str = "index:genesis_height";
const KEY_CURRENT: &str = "index:current_chain_height";
const KEY_NUM_INDEXED: &str = "index:num_blocks_indexed";
const KEY_LAST_HEIGHT: &str = "index:last_block_height";
const KEY_LAST_ID: &str = "index:last_block_id";

/// Persistent bookkeeping of indexing progress.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexProgress {
    /// Genesis height, once learned from the node. Immutable afterwards.
    pub genesis_height: Option<u64>,
    /// Highest chain height seen, from node status or indexed blocks.
    pub current_chain_height: u64,
    /// Number of distinct heights indexed so far.
    pub num_blocks_indexed: u64,
    /// Highest indexed block `(height, id)`.
    pub last_block: Option<(u64, String)>,
}

impl IndexProgress {
    /// Load the marker from the key-value store, defaulting missing fields.
    pub async fn load(store: &dyn Store) -> Result<Self, StorageError> {
        let genesis_height = match store.kv_get(KEY_GENESIS).await? {
            Some(v) => Some(v.as_int()? as u64),
            None => None,
        };
        let current_chain_height = match store.kv_get(KEY_CURRENT).await? {
            Some(v) => v.as_int()? as u64,
            None => 0,
        };
        let num_blocks_indexed = match store.kv_get(KEY_NUM_INDEXED).await? {
            Some(v) => v.as_int()? as u64,
            None => 0,
        };
        let last_block = match (
            store.kv_get(KEY_LAST_HEIGHT).await?,
            store.kv_get(KEY_LAST_ID).await?,
        ) {
            (Some(height), Some(id)) => {
                Some((height.as_int()? as u64, id.as_text()?.to_string()))
            }
            _ => None,
        };
        Ok(Self {
            genesis_height,
            current_chain_height,
            num_blocks_indexed,
            last_block,
        })
    }

    /// Record the genesis height the first time it is learned.
    pub fn set_genesis_height(&mut self, height: u64) {
        if self.genesis_height.is_none() {
            self.genesis_height = Some(height);
        }
    }

    /// Fold a node-reported chain tip into the marker.
    pub fn observe_chain_height(&mut self, height: u64) {
        self.current_chain_height = self.current_chain_height.max(height);
    }

    /// Record a successfully committed block.
    pub fn record_block(&mut self, header: &BlockHeader, newly_indexed: bool) {
        self.observe_chain_height(header.height);
        if newly_indexed {
            self.num_blocks_indexed += 1;
        }
        let is_newest = self
            .last_block
            .as_ref()
            .map(|(height, _)| header.height >= *height)
            .unwrap_or(true);
        if is_newest {
            self.last_block = Some((header.height, header.id.clone()));
        }
    }

    /// Buffer the marker's fields into a store transaction.
    pub fn write_to(&self, tx: &mut dyn StoreTransaction) {
        if let Some(genesis) = self.genesis_height {
            tx.kv_set(KEY_GENESIS, KvValue::Int(genesis as i64));
        }
        tx.kv_set(KEY_CURRENT, KvValue::Int(self.current_chain_height as i64));
        tx.kv_set(KEY_NUM_INDEXED, KvValue::Int(self.num_blocks_indexed as i64));
        if let Some((height, id)) = &self.last_block {
            tx.kv_set(KEY_LAST_HEIGHT, KvValue::Int(*height as i64));
            tx.kv_set(KEY_LAST_ID, KvValue::Text(id.clone()));
        }
    }

    /// Derive the externally visible stats snapshot.
    pub fn stats(&self) -> IndexStats {
        let genesis_height = self.genesis_height.unwrap_or(0);
        let chain_length = self.current_chain_height.saturating_sub(genesis_height) + 1;
        let percentage = format!(
            "{:.2}",
            self.num_blocks_indexed as f64 * 100.0 / chain_length as f64
        );
        IndexStats {
            current_chain_height: self.current_chain_height,
            genesis_height,
            chain_length,
            num_blocks_indexed: self.num_blocks_indexed,
            percentage,
            last_indexed_block: self.last_block.as_ref().map(|(height, id)| LastBlock {
                height: *height,
                id: id.clone(),
            }),
        }
    }
}

/// Externally visible indexing statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub current_chain_height: u64,
    pub genesis_height: u64,
    pub chain_length: u64,
    pub num_blocks_indexed: u64,
    /// Fixed two-decimal percentage of the chain indexed, e.g. `"50.00"`.
    pub percentage: String,
    pub last_indexed_block: Option<LastBlock>,
}

/// `(height, id)` of the highest indexed block.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LastBlock {
    pub height: u64,
    pub id: String,
}
