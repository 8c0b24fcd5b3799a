//! Index signals: explicit publish/subscribe channels.
//!
//! Subscribers attach at startup; publishing never blocks and never fails.
//! A publish with no subscribers is simply dropped.

use tokio::sync::broadcast;

use stakeindex_connector::NetworkStatus;

/// Signals emitted by the indexing pipeline.
#[derive(Debug, Clone)]
pub enum IndexEvent {
    /// A height range was committed to the store. Consumed by the gateway
    /// for cache invalidation and by the coordinator for progress tracking.
    IndexUpdated { from: u64, to: u64 },
    /// A fresh network status snapshot was fetched from the node.
    NodeInfoUpdated(NetworkStatus),
}

/// Broadcast bus for [`IndexEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<IndexEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Fire-and-forget publish. No subscribers is not an error.
    pub fn publish(&self, event: IndexEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(128)
    }
}
