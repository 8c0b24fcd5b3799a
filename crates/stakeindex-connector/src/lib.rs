//! stakeindex-connector: the contract over the upstream node.
//!
//! The indexing pipeline never talks to a node directly; everything goes
//! through the [`NodeClient`] trait. Production deployments wrap a concrete
//! client in [`RetryingClient`], which bounds every call with a request
//! timeout and retries transient failures with exponential backoff.

pub mod client;
pub mod error;
pub mod retry;
pub mod types;

pub use client::NodeClient;
pub use error::ConnectorError;
pub use retry::{RetryConfig, RetryPolicy, RetryingClient};
pub use types::{Block, BlockHeader, GenesisAccount, NetworkStatus, Transaction, ValidatorInfo};
