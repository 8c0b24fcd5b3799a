//! The coordinator: sync wait, gap reconciliation, validator refresh.

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use stakeindex_connector::{NetworkStatus, NodeClient};
use stakeindex_core::{EventBus, IndexEvent, Indexer};

use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;

/// Lifecycle state of a coordinator instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    /// Polling the node until it reports `syncing == false`.
    WaitingForSync,
    /// Scheduling reconciliation and refresh jobs.
    Ready,
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitingForSync => write!(f, "waiting-for-sync"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

/// Best-effort scheduler over an [`Indexer`].
///
/// Chain constants are memoized: the genesis height is fetched once and kept
/// for the life of the process; the current height is refreshed by
/// `NodeInfoUpdated` signals between ticks (push invalidation beats poll
/// staleness) and by the reconciliation tick's own status poll.
pub struct Coordinator {
    client: Arc<dyn NodeClient>,
    indexer: Arc<Indexer>,
    config: CoordinatorConfig,
    bus: EventBus,
    state: Mutex<CoordinatorState>,
    genesis_height: Mutex<Option<u64>>,
    current_height: Mutex<Option<u64>>,
}

impl Coordinator {
    pub fn new(
        client: Arc<dyn NodeClient>,
        indexer: Arc<Indexer>,
        config: CoordinatorConfig,
        bus: EventBus,
    ) -> Self {
        Self {
            client,
            indexer,
            config,
            bus,
            state: Mutex::new(CoordinatorState::WaitingForSync),
            genesis_height: Mutex::new(None),
            current_height: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        *self.state.lock().unwrap()
    }

    /// Genesis height, memoized after the first successful status fetch.
    /// Fails with the upstream error if it was never resolved and the node
    /// is unreachable.
    pub async fn get_genesis_height(&self) -> Result<u64, CoordinatorError> {
        if let Some(height) = *self.genesis_height.lock().unwrap() {
            return Ok(height);
        }
        Ok(self.fetch_status().await?.genesis_height)
    }

    /// Latest known chain height; fetched from the node if no status has
    /// been seen yet.
    pub async fn get_current_height(&self) -> Result<u64, CoordinatorError> {
        if let Some(height) = *self.current_height.lock().unwrap() {
            return Ok(height);
        }
        Ok(self.fetch_status().await?.height)
    }

    /// Block until the node reports `syncing == false`, polling on a fixed
    /// interval. Upstream failures are logged and retried on the next poll;
    /// this loop only ends on sync or shutdown.
    pub async fn wait_for_node_sync(&self, shutdown: &mut watch::Receiver<bool>) {
        info!("waiting for node sync");
        loop {
            match self.fetch_status().await {
                Ok(status) if !status.syncing => {
                    *self.state.lock().unwrap() = CoordinatorState::Ready;
                    info!(height = status.height, "node synced, coordinator ready");
                    return;
                }
                Ok(status) => {
                    debug!(height = status.height, "node still syncing");
                }
                Err(e) => {
                    warn!(error = %e, "network status poll failed, retrying next tick");
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.sync_poll_interval()) => {}
                changed = shutdown.changed() => {
                    // A dropped sender counts as shutdown
                    if changed.is_err() || *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    }

    /// Drive the coordinator until shutdown: wait for sync, then run the
    /// reconciliation and validator-refresh jobs on their intervals.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        self.wait_for_node_sync(&mut shutdown).await;
        if *shutdown.borrow() {
            return;
        }

        let mut reconcile = tokio::time::interval(self.config.reconcile_interval());
        reconcile.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut refresh = tokio::time::interval(self.config.validator_refresh_interval());
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events = self.bus.subscribe();

        loop {
            tokio::select! {
                _ = reconcile.tick() => {
                    if let Err(e) = self.reconcile_missing_blocks().await {
                        warn!(error = %e, "missing-block reconciliation failed");
                    }
                }
                _ = refresh.tick() => {
                    if let Err(e) = self.refresh_validators().await {
                        warn!(error = %e, "validator refresh failed");
                    }
                }
                event = events.recv() => match event {
                    Ok(IndexEvent::NodeInfoUpdated(status)) => self.note_status(&status),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {}
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("coordinator shutting down");
                        return;
                    }
                }
            }
        }
    }

    /// One reconciliation pass: refresh the status snapshot, ask the indexer
    /// for gaps in `[genesis, current]` and dispatch an index request per
    /// gap. Returns the number of successfully indexed gaps.
    pub async fn reconcile_missing_blocks(&self) -> Result<usize, CoordinatorError> {
        self.fetch_status().await?;
        let genesis = self.get_genesis_height().await?;
        let current = self.get_current_height().await?;

        let gaps = self.indexer.get_missing_blocks(genesis, current).await?;
        let mut dispatched = 0;
        for gap in &gaps {
            match self.indexer.index_blocks_in_range(gap.from, gap.to).await {
                Ok(()) => dispatched += 1,
                Err(e) => {
                    warn!(range = %gap, error = %e, "index range dispatch failed");
                }
            }
        }
        if !gaps.is_empty() {
            info!(gaps = gaps.len(), dispatched, "reconciliation pass complete");
        }
        Ok(dispatched)
    }

    /// Reload the validator set from the node and rebuild the ranking cache.
    pub async fn refresh_validators(&self) -> Result<(), CoordinatorError> {
        let count = self.indexer.index_all_validators().await?;
        self.indexer.reload_validator_cache().await?;
        debug!(count, "validator cache refreshed");
        Ok(())
    }

    /// Fetch a status snapshot, fold it into the caches and the indexer's
    /// progress marker, and announce it on the bus.
    async fn fetch_status(&self) -> Result<NetworkStatus, CoordinatorError> {
        let status = self.client.get_network_status().await?;
        self.note_status(&status);
        self.indexer.apply_network_status(&status).await;
        self.bus.publish(IndexEvent::NodeInfoUpdated(status.clone()));
        Ok(status)
    }

    /// Fold a status snapshot into the memoized heights. The genesis height
    /// is written once; the current height only moves forward.
    fn note_status(&self, status: &NetworkStatus) {
        let mut genesis = self.genesis_height.lock().unwrap();
        if genesis.is_none() {
            *genesis = Some(status.genesis_height);
        }
        drop(genesis);

        let mut current = self.current_height.lock().unwrap();
        *current = Some(current.unwrap_or(0).max(status.height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use stakeindex_connector::{
        Block, BlockHeader, ConnectorError, GenesisAccount, ValidatorInfo,
    };
    use stakeindex_core::ProcessorRegistry;
    use stakeindex_storage::MemoryStore;

    // ── Test fixtures ─────────────────────────────────────────────────────────

    fn status(height: u64, syncing: bool) -> NetworkStatus {
        NetworkStatus {
            height,
            syncing,
            chain_id: "testnet".into(),
            genesis_height: 1,
        }
    }

    fn block(height: u64) -> Block {
        Block {
            header: BlockHeader {
                height,
                id: format!("blk-{height}"),
                previous_id: format!("blk-{}", height.saturating_sub(1)),
                generator: "gen-1".into(),
                timestamp: (height * 10) as i64,
                is_final: false,
            },
            transactions: vec![],
        }
    }

    /// Plays back a script of status responses, then repeats `fallback`.
    struct ScriptedNode {
        script: Mutex<VecDeque<Result<NetworkStatus, ConnectorError>>>,
        fallback: NetworkStatus,
        status_calls: AtomicU32,
        blocks: HashMap<u64, Block>,
        validators: Vec<ValidatorInfo>,
    }

    impl ScriptedNode {
        fn new(
            script: Vec<Result<NetworkStatus, ConnectorError>>,
            fallback: NetworkStatus,
        ) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback,
                status_calls: AtomicU32::new(0),
                blocks: HashMap::new(),
                validators: vec![],
            }
        }

        fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
            self.blocks = blocks.into_iter().map(|b| (b.header.height, b)).collect();
            self
        }
    }

    #[async_trait]
    impl NodeClient for ScriptedNode {
        async fn get_network_status(&self) -> Result<NetworkStatus, ConnectorError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            match self.script.lock().unwrap().pop_front() {
                Some(result) => result,
                None => Ok(self.fallback.clone()),
            }
        }

        async fn get_block_by_height(
            &self,
            height: u64,
        ) -> Result<Option<Block>, ConnectorError> {
            Ok(self.blocks.get(&height).cloned())
        }

        async fn get_block_by_id(&self, id: &str) -> Result<Option<Block>, ConnectorError> {
            Ok(self.blocks.values().find(|b| b.header.id == id).cloned())
        }

        async fn get_blocks_by_height_range(
            &self,
            from: u64,
            to: u64,
        ) -> Result<Vec<Block>, ConnectorError> {
            Ok(self
                .blocks
                .values()
                .filter(|b| b.header.height >= from && b.header.height <= to)
                .cloned()
                .collect())
        }

        async fn get_all_validators(&self) -> Result<Vec<ValidatorInfo>, ConnectorError> {
            Ok(self.validators.clone())
        }

        async fn get_genesis_accounts(&self) -> Result<Vec<GenesisAccount>, ConnectorError> {
            Ok(vec![])
        }
    }

    fn fast_config() -> CoordinatorConfig {
        CoordinatorConfig {
            sync_poll_interval_ms: 1,
            reconcile_interval_ms: 5,
            validator_refresh_interval_ms: 5,
        }
    }

    async fn coordinator_over(node: ScriptedNode) -> (Arc<Coordinator>, Arc<Indexer>) {
        let client: Arc<dyn NodeClient> = Arc::new(node);
        let bus = EventBus::default();
        let indexer = Arc::new(
            Indexer::new(
                client.clone(),
                Arc::new(MemoryStore::new()),
                ProcessorRegistry::builtin(),
                bus.clone(),
            )
            .await
            .unwrap(),
        );
        let coordinator = Arc::new(Coordinator::new(
            client,
            indexer.clone(),
            fast_config(),
            bus,
        ));
        (coordinator, indexer)
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn becomes_ready_only_after_upstream_recovers() {
        let node = ScriptedNode::new(
            vec![
                Err(ConnectorError::Unavailable("refused".into())),
                Err(ConnectorError::Timeout { ms: 10 }),
            ],
            status(50, false),
        );
        let client = Arc::new(node);
        let bus = EventBus::default();
        let indexer = Arc::new(
            Indexer::new(
                client.clone() as Arc<dyn NodeClient>,
                Arc::new(MemoryStore::new()),
                ProcessorRegistry::builtin(),
                bus.clone(),
            )
            .await
            .unwrap(),
        );
        let coordinator =
            Coordinator::new(client.clone(), indexer, fast_config(), bus);

        assert_eq!(coordinator.state(), CoordinatorState::WaitingForSync);
        let (_tx, mut shutdown) = watch::channel(false);
        coordinator.wait_for_node_sync(&mut shutdown).await;

        assert_eq!(coordinator.state(), CoordinatorState::Ready);
        // two failures + the successful third poll
        assert_eq!(client.status_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn waits_while_node_is_syncing() {
        let node = ScriptedNode::new(
            vec![Ok(status(10, true)), Ok(status(20, true))],
            status(30, false),
        );
        let client = Arc::new(node);
        let bus = EventBus::default();
        let indexer = Arc::new(
            Indexer::new(
                client.clone() as Arc<dyn NodeClient>,
                Arc::new(MemoryStore::new()),
                ProcessorRegistry::builtin(),
                bus.clone(),
            )
            .await
            .unwrap(),
        );
        let coordinator =
            Coordinator::new(client.clone(), indexer, fast_config(), bus);

        let (_tx, mut shutdown) = watch::channel(false);
        coordinator.wait_for_node_sync(&mut shutdown).await;

        assert_eq!(coordinator.state(), CoordinatorState::Ready);
        assert_eq!(client.status_calls.load(Ordering::SeqCst), 3);
        // current height kept the freshest value seen
        assert_eq!(coordinator.get_current_height().await.unwrap(), 30);
    }

    #[tokio::test]
    async fn genesis_height_is_memoized() {
        let node = ScriptedNode::new(vec![], status(100, false));
        let client = Arc::new(node);
        let bus = EventBus::default();
        let indexer = Arc::new(
            Indexer::new(
                client.clone() as Arc<dyn NodeClient>,
                Arc::new(MemoryStore::new()),
                ProcessorRegistry::builtin(),
                bus.clone(),
            )
            .await
            .unwrap(),
        );
        let coordinator =
            Coordinator::new(client.clone(), indexer, fast_config(), bus);

        assert_eq!(coordinator.get_genesis_height().await.unwrap(), 1);
        assert_eq!(coordinator.get_genesis_height().await.unwrap(), 1);
        assert_eq!(client.status_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn genesis_height_fails_when_unreachable() {
        let node = ScriptedNode::new(
            vec![Err(ConnectorError::Unavailable("down".into()))],
            status(0, false),
        );
        // script has one failure; use it for the only call
        let (coordinator, _indexer) = coordinator_over(node).await;
        let err = coordinator.get_genesis_height().await.unwrap_err();
        assert!(matches!(err, CoordinatorError::Upstream(_)));
    }

    #[tokio::test]
    async fn reconciliation_fills_the_gaps() {
        let node = ScriptedNode::new(vec![], status(5, false))
            .with_blocks((1..=5).map(block).collect());
        let (coordinator, indexer) = coordinator_over(node).await;

        let dispatched = coordinator.reconcile_missing_blocks().await.unwrap();
        assert_eq!(dispatched, 1); // one gap: [1, 5]

        assert!(indexer.get_missing_blocks(1, 5).await.unwrap().is_empty());
        let stats = indexer.get_index_stats().await;
        assert_eq!(stats.num_blocks_indexed, 5);
        assert_eq!(stats.genesis_height, 1);
        assert_eq!(stats.percentage, "100.00");

        // A second pass finds nothing to do
        assert_eq!(coordinator.reconcile_missing_blocks().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn refresh_populates_validator_cache() {
        let mut node = ScriptedNode::new(vec![], status(0, false));
        node.validators = vec![
            ValidatorInfo { address: "val-b".into(), name: "beta".into() },
            ValidatorInfo { address: "val-a".into(), name: "alpha".into() },
        ];
        let (coordinator, indexer) = coordinator_over(node).await;

        coordinator.refresh_validators().await.unwrap();

        let active: Vec<String> = indexer
            .active_validators(10)
            .into_iter()
            .map(|v| v.address)
            .collect();
        // equal (zero) weights: address ascending
        assert_eq!(active, vec!["val-a", "val-b"]);
    }

    #[tokio::test]
    async fn run_reconciles_and_stops_on_shutdown() {
        let node = ScriptedNode::new(vec![], status(3, false))
            .with_blocks((1..=3).map(block).collect());
        let (coordinator, indexer) = coordinator_over(node).await;

        let (tx, shutdown) = watch::channel(false);
        let handle = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.run(shutdown).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("coordinator did not shut down")
            .unwrap();

        assert!(indexer.get_missing_blocks(1, 3).await.unwrap().is_empty());
    }
}
