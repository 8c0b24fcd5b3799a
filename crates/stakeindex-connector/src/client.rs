//! The `NodeClient` trait: the contract every node connector must implement.

use async_trait::async_trait;

use crate::error::ConnectorError;
use crate::types::{Block, GenesisAccount, NetworkStatus, ValidatorInfo};

/// The central async trait over the upstream node.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` for use across Tokio tasks.
///
/// # Object Safety
/// The trait is object-safe and can be stored as `Arc<dyn NodeClient>`.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Return the node's current sync status and chain constants.
    async fn get_network_status(&self) -> Result<NetworkStatus, ConnectorError>;

    /// Fetch a block by height. `None` if the node has no block at `height`.
    async fn get_block_by_height(&self, height: u64)
        -> Result<Option<Block>, ConnectorError>;

    /// Fetch a block by its id. `None` if unknown to the node.
    async fn get_block_by_id(&self, id: &str) -> Result<Option<Block>, ConnectorError>;

    /// Fetch all blocks in `[from, to]` (inclusive). The node may return them
    /// in any order; callers must sort before applying.
    async fn get_blocks_by_height_range(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<Block>, ConnectorError>;

    /// Return the full validator set known to the node.
    async fn get_all_validators(&self) -> Result<Vec<ValidatorInfo>, ConnectorError>;

    /// Return the account set of the genesis block.
    async fn get_genesis_accounts(&self) -> Result<Vec<GenesisAccount>, ConnectorError>;
}
