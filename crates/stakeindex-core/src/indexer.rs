//! The indexer turns raw blocks into derived store state.
//!
//! Every block is applied as one store transaction: block row, transaction
//! rows, processor effects and the progress marker commit together or not at
//! all. Re-indexing a height is an idempotent upsert: the block row is
//! overwritten with the freshly fetched payload (finality flags may change
//! retroactively) while transaction effects are applied exactly once.
//!
//! Concurrency: an in-flight height set guarantees at most one writer per
//! height. Overlapping requests are coalesced; disjoint ranges index in
//! parallel.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

use stakeindex_connector::{Block, NetworkStatus, NodeClient};
use stakeindex_storage::Store;

use crate::entities::{
    from_row, height_key, tables, to_row, Account, StoredTransaction, Validator,
};
use crate::error::IndexError;
use crate::events::{EventBus, IndexEvent};
use crate::gaps::{missing_ranges, HeightRange};
use crate::processor::ProcessorRegistry;
use crate::progress::{IndexProgress, IndexStats};
use crate::ranking::ValidatorRanking;

/// The indexing engine.
pub struct Indexer {
    client: Arc<dyn NodeClient>,
    store: Arc<dyn Store>,
    processors: ProcessorRegistry,
    progress: AsyncMutex<IndexProgress>,
    ranking: RwLock<ValidatorRanking>,
    inflight: Arc<Mutex<BTreeSet<u64>>>,
    bus: EventBus,
}

impl Indexer {
    /// Create an indexer, restoring the progress marker from the store.
    pub async fn new(
        client: Arc<dyn NodeClient>,
        store: Arc<dyn Store>,
        processors: ProcessorRegistry,
        bus: EventBus,
    ) -> Result<Self, IndexError> {
        let progress = IndexProgress::load(store.as_ref()).await?;
        info!(
            current = progress.current_chain_height,
            indexed = progress.num_blocks_indexed,
            "index progress restored"
        );
        Ok(Self {
            client,
            store,
            processors,
            progress: AsyncMutex::new(progress),
            ranking: RwLock::new(ValidatorRanking::default()),
            inflight: Arc::new(Mutex::new(BTreeSet::new())),
            bus,
        })
    }

    /// The signal bus this indexer publishes on.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Fold a fresh node status into the progress marker. The genesis height
    /// is memoized on first sight; the chain tip only ever moves forward.
    pub async fn apply_network_status(&self, status: &NetworkStatus) {
        let mut progress = self.progress.lock().await;
        progress.set_genesis_height(status.genesis_height);
        progress.observe_chain_height(status.height);
    }

    // ─── Index operations ─────────────────────────────────────────────────────

    /// Fetch and index the block at `height`.
    pub async fn index_block_by_height(&self, height: u64) -> Result<(), IndexError> {
        let guard = self.claim_heights(height, height);
        if guard.heights().is_empty() {
            debug!(height, "height already being indexed, coalesced");
            return Ok(());
        }
        let block = self
            .client
            .get_block_by_height(height)
            .await?
            .ok_or_else(|| IndexError::BlockNotFound(format!("height {height}")))?;
        self.apply_block(&block).await?;
        self.bus.publish(IndexEvent::IndexUpdated {
            from: height,
            to: height,
        });
        Ok(())
    }

    /// Fetch and index the block with the given id.
    pub async fn index_block_by_id(&self, id: &str) -> Result<(), IndexError> {
        let block = self
            .client
            .get_block_by_id(id)
            .await?
            .ok_or_else(|| IndexError::BlockNotFound(format!("id {id}")))?;
        let height = block.header.height;
        let guard = self.claim_heights(height, height);
        if guard.heights().is_empty() {
            debug!(height, "height already being indexed, coalesced");
            return Ok(());
        }
        self.apply_block(&block).await?;
        self.bus.publish(IndexEvent::IndexUpdated {
            from: height,
            to: height,
        });
        Ok(())
    }

    /// Fetch and index every block in `[from, to]`, ascending.
    ///
    /// A fetch or application failure aborts only the un-applied remainder of
    /// this call; already-committed blocks stay indexed and the caller is
    /// expected to re-request the rest on its next reconciliation tick.
    pub async fn index_blocks_in_range(&self, from: u64, to: u64) -> Result<(), IndexError> {
        if from > to {
            return Err(IndexError::InvalidRange { from, to });
        }
        let guard = self.claim_heights(from, to);
        if guard.heights().is_empty() {
            debug!(from, to, "range already in flight, coalesced");
            return Ok(());
        }
        let claimed: BTreeSet<u64> = guard.heights().iter().copied().collect();

        let mut blocks = self.client.get_blocks_by_height_range(from, to).await?;
        blocks.sort_by_key(|b| b.header.height);

        let mut committed: Option<(u64, u64)> = None;
        let mut outcome = Ok(());
        for block in blocks.iter().filter(|b| claimed.contains(&b.header.height)) {
            match self.apply_block(block).await {
                Ok(_) => {
                    let height = block.header.height;
                    committed = Some(match committed {
                        None => (height, height),
                        Some((first, _)) => (first, height),
                    });
                }
                Err(e) => {
                    warn!(
                        height = block.header.height,
                        error = %e,
                        "block application failed, aborting remainder of range"
                    );
                    outcome = Err(e);
                    break;
                }
            }
        }

        if let Some((first, last)) = committed {
            self.bus
                .publish(IndexEvent::IndexUpdated { from: first, to: last });
            info!(from = first, to = last, "index updated");
        }
        outcome
    }

    /// Report the un-indexed sub-ranges of `[from, to]`. Pure read.
    pub async fn get_missing_blocks(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<HeightRange>, IndexError> {
        if from > to {
            return Err(IndexError::InvalidRange { from, to });
        }
        let rows = self
            .store
            .find_range(tables::BLOCKS, &height_key(from), &height_key(to))
            .await?;
        let mut indexed = BTreeSet::new();
        for row in rows {
            let block: Block = from_row(row)?;
            indexed.insert(block.header.height);
        }
        Ok(missing_ranges(&indexed, from, to))
    }

    /// Snapshot of the current indexing statistics.
    pub async fn get_index_stats(&self) -> IndexStats {
        self.progress.lock().await.stats()
    }

    // ─── Bulk loads ───────────────────────────────────────────────────────────

    /// Upsert the genesis account set. Safe to call repeatedly: existing
    /// accounts keep their processor-mutated state.
    pub async fn index_genesis_accounts(&self) -> Result<u64, IndexError> {
        let accounts = self.client.get_genesis_accounts().await?;
        let total = accounts.len();
        let mut tx = self.store.begin().await?;
        let mut created = 0u64;
        for genesis in accounts {
            if tx.get(tables::ACCOUNTS, &genesis.address).await?.is_some() {
                continue;
            }
            let mut account = Account::new(genesis.address.as_str());
            account.balance = genesis.balance;
            tx.upsert(tables::ACCOUNTS, &genesis.address, to_row(&account)?);
            created += 1;
        }
        tx.commit().await?;
        info!(created, total, "genesis accounts indexed");
        Ok(created)
    }

    /// Refresh the validator table from the node's validator list. Safe to
    /// call repeatedly: indexed aggregates (votes, generated blocks) survive.
    pub async fn index_all_validators(&self) -> Result<u64, IndexError> {
        let validators = self.client.get_all_validators().await?;
        let count = validators.len() as u64;
        let mut tx = self.store.begin().await?;
        for info in validators {
            let mut validator = match tx.get(tables::VALIDATORS, &info.address).await? {
                Some(row) => from_row::<Validator>(row)?,
                None => Validator::new(info.address.as_str(), ""),
            };
            validator.name = info.name;
            tx.upsert(tables::VALIDATORS, &info.address, to_row(&validator)?);

            if let Some(row) = tx.get(tables::ACCOUNTS, &info.address).await? {
                let mut account: Account = from_row(row)?;
                if !account.is_validator {
                    account.is_validator = true;
                    tx.upsert(tables::ACCOUNTS, &info.address, to_row(&account)?);
                }
            }
        }
        tx.commit().await?;
        info!(count, "validator set refreshed");
        Ok(count)
    }

    // ─── Validator ranking cache ──────────────────────────────────────────────

    /// Rebuild the in-memory validator ranking from the store.
    pub async fn reload_validator_cache(&self) -> Result<usize, IndexError> {
        let rows = self.store.find_all(tables::VALIDATORS).await?;
        let mut validators = Vec::with_capacity(rows.len());
        for row in rows {
            validators.push(from_row::<Validator>(row)?);
        }
        let count = validators.len();
        self.ranking.write().unwrap().rebuild(validators);
        debug!(count, "validator ranking cache reloaded");
        Ok(count)
    }

    /// The top `n` validators by rank, from the cache.
    pub fn active_validators(&self, n: usize) -> Vec<Validator> {
        self.ranking.read().unwrap().top(n).to_vec()
    }

    /// Validators ranked below the active set of size `active`, from the cache.
    pub fn standby_validators(&self, active: usize) -> Vec<Validator> {
        self.ranking.read().unwrap().standby(active).to_vec()
    }

    // ─── Block application ────────────────────────────────────────────────────

    /// Apply one block atomically. Returns `true` if the height was not
    /// indexed before.
    async fn apply_block(&self, block: &Block) -> Result<bool, IndexError> {
        let header = &block.header;
        let key = height_key(header.height);

        let mut tx = self.store.begin().await?;
        let newly = tx.get(tables::BLOCKS, &key).await?.is_none();
        tx.upsert(tables::BLOCKS, &key, to_row(block)?);

        for txn in &block.transactions {
            let seen = tx.get(tables::TRANSACTIONS, &txn.id).await?.is_some();
            let stored = StoredTransaction {
                height: header.height,
                tx: txn.clone(),
            };
            tx.upsert(tables::TRANSACTIONS, &txn.id, to_row(&stored)?);
            if seen {
                debug!(tx = %txn.id, height = header.height, "effects already applied, skipping");
                continue;
            }
            match self.processors.get(&txn.module, &txn.command) {
                Ok(processor) => processor.apply(header, txn, tx.as_mut()).await?,
                Err(IndexError::UnknownProcessor { module, command }) => {
                    warn!(%module, %command, tx = %txn.id, "no processor registered, transaction skipped");
                }
                Err(e) => return Err(e),
            }
        }

        if newly {
            if let Some(row) = tx.get(tables::VALIDATORS, &header.generator).await? {
                let mut generator: Validator = from_row(row)?;
                generator.generated_blocks += 1;
                tx.upsert(tables::VALIDATORS, &header.generator, to_row(&generator)?);
            }
        }

        let mut progress = self.progress.lock().await;
        let mut next = progress.clone();
        next.record_block(header, newly);
        next.write_to(tx.as_mut());
        tx.commit().await?;
        *progress = next;

        debug!(height = header.height, id = %header.id, txs = block.transactions.len(), "block indexed");
        Ok(newly)
    }

    /// Claim the heights of `[from, to]` not already being indexed by
    /// another caller. The claim is released when the guard drops.
    fn claim_heights(&self, from: u64, to: u64) -> InflightGuard {
        let mut set = self.inflight.lock().unwrap();
        let heights = (from..=to).filter(|height| set.insert(*height)).collect();
        InflightGuard {
            set: Arc::clone(&self.inflight),
            heights,
        }
    }
}

/// RAII claim over a set of in-flight heights.
struct InflightGuard {
    set: Arc<Mutex<BTreeSet<u64>>>,
    heights: Vec<u64>,
}

impl InflightGuard {
    fn heights(&self) -> &[u64] {
        &self.heights
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap();
        for height in &self.heights {
            set.remove(height);
        }
    }
}
