//! Derived entities and their table layout.
//!
//! Entities are stored as JSON documents keyed by ordered strings. Heights
//! are zero-padded to a fixed width so lexicographic key order equals numeric
//! order, which makes height-range scans a plain key-range query.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use stakeindex_connector::Transaction;
use stakeindex_storage::StorageError;

/// Table names used by the indexer.
pub mod tables {
    pub const BLOCKS: &str = "blocks";
    pub const TRANSACTIONS: &str = "transactions";
    pub const ACCOUNTS: &str = "accounts";
    pub const VALIDATORS: &str = "validators";
    pub const VOTES: &str = "votes";
}

/// Fixed-width key for a block height.
pub fn height_key(height: u64) -> String {
    format!("{height:020}")
}

/// Key of the vote edge `(voter, validator)`.
pub fn vote_key(voter: &str, validator: &str) -> String {
    format!("{voter}:{validator}")
}

/// Serialize an entity into a storable row.
pub fn to_row<T: Serialize>(entity: &T) -> Result<Value, StorageError> {
    serde_json::to_value(entity).map_err(StorageError::Serialization)
}

/// Deserialize an entity from a stored row.
pub fn from_row<T: DeserializeOwned>(row: Value) -> Result<T, StorageError> {
    serde_json::from_value(row).map_err(StorageError::Serialization)
}

// ─── Account ──────────────────────────────────────────────────────────────────

/// Mutable aggregate state of an address. Created on first reference,
/// mutated only by transaction processors during block application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: String,
    /// Next expected transaction nonce for this sender.
    pub nonce: u64,
    pub balance: u64,
    pub is_validator: bool,
}

impl Account {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            nonce: 0,
            balance: 0,
            is_validator: false,
        }
    }
}

// ─── Validator ────────────────────────────────────────────────────────────────

/// A block-producing account, ranked by vote weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Validator {
    pub address: String,
    pub name: String,
    /// Sum of all vote edges into this validator.
    pub total_votes_received: u64,
    pub generated_blocks: u64,
    pub is_banned: bool,
    /// Height until which the validator is punished, if any.
    pub punished_until: Option<u64>,
}

impl Validator {
    pub fn new(address: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            name: name.into(),
            total_votes_received: 0,
            generated_blocks: 0,
            is_banned: false,
            punished_until: None,
        }
    }
}

// ─── VoteEdge ─────────────────────────────────────────────────────────────────

/// A `(voter, validator)` stake edge. Deleted when its amount drops to zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteEdge {
    pub voter: String,
    pub validator: String,
    pub amount: u64,
    /// Timestamp of the block that last touched this edge.
    pub updated_at: i64,
}

// ─── Stored transaction row ───────────────────────────────────────────────────

/// A transaction as persisted, annotated with the height of its block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTransaction {
    pub height: u64,
    #[serde(flatten)]
    pub tx: Transaction,
}
