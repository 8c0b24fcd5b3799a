//! Coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tick intervals for the coordinator's jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How often to poll the node's sync status before it is caught up.
    pub sync_poll_interval_ms: u64,
    /// How often to reconcile missing block ranges.
    pub reconcile_interval_ms: u64,
    /// How often to refresh the validator set and ranking cache.
    pub validator_refresh_interval_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            sync_poll_interval_ms: 15_000,
            reconcile_interval_ms: 30_000,
            validator_refresh_interval_ms: 300_000,
        }
    }
}

impl CoordinatorConfig {
    pub fn sync_poll_interval(&self) -> Duration {
        Duration::from_millis(self.sync_poll_interval_ms)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_millis(self.reconcile_interval_ms)
    }

    pub fn validator_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.validator_refresh_interval_ms)
    }
}
