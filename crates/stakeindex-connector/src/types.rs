//! Wire types returned by the upstream node.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─── NetworkStatus ────────────────────────────────────────────────────────────

/// Snapshot of the node's view of the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    /// Current chain tip height.
    pub height: u64,
    /// `true` while the node is still catching up with the network.
    pub syncing: bool,
    /// Chain identifier (e.g. `"mainnet"`).
    pub chain_id: String,
    /// Height of the genesis block. Immutable for the life of the chain.
    pub genesis_height: u64,
}

// ─── Block / BlockHeader ──────────────────────────────────────────────────────

/// Header fields of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeader {
    /// Block height, monotonic and unique.
    pub height: u64,
    /// Content hash of the block, unique.
    pub id: String,
    /// Id of the previous block.
    pub previous_id: String,
    /// Address of the validator that generated the block.
    pub generator: String,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
    /// `true` once later blocks have certified this one. May flip to `true`
    /// retroactively, which is why re-indexing overwrites the stored row.
    pub is_final: bool,
}

/// A full block as fetched from the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub header: BlockHeader,
    /// Transactions in canonical order. Order is significant: later
    /// transactions may depend on state mutated by earlier ones.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Returns `true` if `parent` is the direct parent of `self`.
    pub fn extends(&self, parent: &Block) -> bool {
        self.header.height == parent.header.height + 1
            && self.header.previous_id == parent.header.id
    }
}

// ─── Transaction ──────────────────────────────────────────────────────────────

/// A transaction included in a block.
///
/// `(module, command)` selects the processor that applies it; `params` is the
/// module-specific payload and is kept as raw JSON until the processor
/// deserializes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Content hash of the transaction, unique.
    pub id: String,
    /// Module name (e.g. `"token"`).
    pub module: String,
    /// Command name within the module (e.g. `"transfer"`).
    pub command: String,
    /// Per-sender monotonic counter.
    pub nonce: u64,
    /// Address of the sender, derived by the node from the sender public key.
    pub sender: String,
    /// Module-specific payload.
    pub params: Value,
}

// ─── Validator / genesis bootstrap payloads ──────────────────────────────────

/// A validator as reported by the node's validator-list endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatorInfo {
    pub address: String,
    pub name: String,
}

/// An account present in the genesis block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisAccount {
    pub address: String,
    pub balance: u64,
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn block(height: u64, id: &str, previous: &str) -> Block {
        Block {
            header: BlockHeader {
                height,
                id: id.into(),
                previous_id: previous.into(),
                generator: "val-1".into(),
                timestamp: (height * 10) as i64,
                is_final: false,
            },
            transactions: vec![],
        }
    }

    #[test]
    fn block_extends_parent() {
        let parent = block(100, "aaa", "000");
        let child = block(101, "bbb", "aaa");
        assert!(child.extends(&parent));
        assert!(!parent.extends(&child));
    }

    #[test]
    fn block_extends_false_on_gap() {
        let a = block(100, "aaa", "000");
        let b = block(102, "ccc", "aaa"); // gap
        assert!(!b.extends(&a));
    }

    #[test]
    fn transaction_wire_format() {
        let json = serde_json::json!({
            "id": "tx-1",
            "module": "token",
            "command": "transfer",
            "nonce": 3,
            "sender": "addr-a",
            "params": { "recipient": "addr-b", "amount": 500 }
        });
        let tx: Transaction = serde_json::from_value(json).unwrap();
        assert_eq!(tx.module, "token");
        assert_eq!(tx.nonce, 3);
        assert_eq!(tx.params["amount"], 500);
    }
}
