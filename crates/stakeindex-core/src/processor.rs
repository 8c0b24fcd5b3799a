//! Transaction processor trait + registry.
//!
//! Each transaction carries a `(module, command)` pair selecting the
//! processor that applies it. The registry is an explicit table built at
//! startup from a static list; there is no runtime discovery.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use stakeindex_connector::{BlockHeader, Transaction};
use stakeindex_storage::StoreTransaction;

use crate::error::IndexError;

/// Applies one kind of transaction to derived store state.
///
/// Processors run inside the block's store transaction: everything they
/// write commits (or rolls back) together with the block itself. They are
/// invoked in the block's canonical transaction order and must not assume
/// anything about state beyond what the store handle shows them.
#[async_trait]
pub trait TransactionProcessor: Send + Sync {
    /// Module this processor handles (e.g. `"token"`).
    fn module(&self) -> &str;

    /// Command within the module (e.g. `"transfer"`).
    fn command(&self) -> &str;

    /// Apply `tx` to derived state through the block's store transaction.
    async fn apply(
        &self,
        header: &BlockHeader,
        tx: &Transaction,
        store_tx: &mut dyn StoreTransaction,
    ) -> Result<(), IndexError>;
}

/// Registry of transaction processors, keyed by `(module, command)`.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: HashMap<(String, String), Arc<dyn TransactionProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in token and PoS processors.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::processors::token::TokenTransferProcessor));
        registry.register(Arc::new(crate::processors::pos::RegisterValidatorProcessor));
        registry.register(Arc::new(crate::processors::pos::StakeProcessor));
        registry
    }

    /// Register a processor under its own `(module, command)` key.
    /// A later registration for the same key replaces the earlier one.
    pub fn register(&mut self, processor: Arc<dyn TransactionProcessor>) {
        let key = (
            processor.module().to_string(),
            processor.command().to_string(),
        );
        self.processors.insert(key, processor);
    }

    /// Look up the processor for a `(module, command)` pair.
    pub fn get(
        &self,
        module: &str,
        command: &str,
    ) -> Result<&Arc<dyn TransactionProcessor>, IndexError> {
        self.processors
            .get(&(module.to_string(), command.to_string()))
            .ok_or_else(|| IndexError::UnknownProcessor {
                module: module.to_string(),
                command: command.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}
