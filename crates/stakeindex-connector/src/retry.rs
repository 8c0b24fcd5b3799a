//! Timeout + exponential-backoff retry decorator for [`NodeClient`].
//!
//! Every call is bounded by a fixed request timeout; a timeout is treated
//! like any other transient failure. Non-retryable errors (RPC-level
//! rejections, malformed responses) surface immediately.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::NodeClient;
use crate::error::ConnectorError;
use crate::types::{Block, GenesisAccount, NetworkStatus, ValidatorInfo};

/// Configuration for the retry policy.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not counting the first try).
    pub max_retries: u32,
    /// Initial backoff delay.
    pub initial_backoff: Duration,
    /// Maximum backoff delay (caps exponential growth).
    pub max_backoff: Duration,
    /// Multiplier applied to backoff on each retry.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// Stateless retry policy: computes the next delay given the attempt number.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the delay before the `attempt`-th retry (1-based).
    /// Returns `None` if `attempt` exceeds `max_retries`.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.config.max_retries {
            return None;
        }
        let base_ms = self.config.initial_backoff.as_millis() as f64
            * self.config.multiplier.powi((attempt - 1) as i32);
        let cap_ms = self.config.max_backoff.as_millis() as f64;
        Some(Duration::from_millis(base_ms.min(cap_ms) as u64))
    }

    /// Returns `true` if any retries remain after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.config.max_retries
    }
}

/// Decorator that adds request timeouts and retry-with-backoff to any
/// [`NodeClient`].
pub struct RetryingClient<C> {
    inner: C,
    policy: RetryPolicy,
    request_timeout: Duration,
}

impl<C: NodeClient> RetryingClient<C> {
    /// Wrap `inner` with the given retry config and per-request timeout.
    pub fn new(inner: C, config: RetryConfig, request_timeout: Duration) -> Self {
        Self {
            inner,
            policy: RetryPolicy::new(config),
            request_timeout,
        }
    }

    async fn call<T, F, Fut>(&self, op: &'static str, f: F) -> Result<T, ConnectorError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ConnectorError>>,
    {
        let mut attempt = 0u32;
        loop {
            let result = match tokio::time::timeout(self.request_timeout, f()).await {
                Ok(result) => result,
                Err(_) => Err(ConnectorError::Timeout {
                    ms: self.request_timeout.as_millis() as u64,
                }),
            };
            match result {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() => {
                    attempt += 1;
                    match self.policy.next_delay(attempt) {
                        Some(delay) => {
                            tracing::warn!(op, attempt, error = %e, "node call failed, retrying");
                            tokio::time::sleep(delay).await;
                        }
                        None => return Err(e),
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl<C: NodeClient> NodeClient for RetryingClient<C> {
    async fn get_network_status(&self) -> Result<NetworkStatus, ConnectorError> {
        self.call("get_network_status", || self.inner.get_network_status())
            .await
    }

    async fn get_block_by_height(
        &self,
        height: u64,
    ) -> Result<Option<Block>, ConnectorError> {
        self.call("get_block_by_height", || {
            self.inner.get_block_by_height(height)
        })
        .await
    }

    async fn get_block_by_id(&self, id: &str) -> Result<Option<Block>, ConnectorError> {
        self.call("get_block_by_id", || self.inner.get_block_by_id(id))
            .await
    }

    async fn get_blocks_by_height_range(
        &self,
        from: u64,
        to: u64,
    ) -> Result<Vec<Block>, ConnectorError> {
        self.call("get_blocks_by_height_range", || {
            self.inner.get_blocks_by_height_range(from, to)
        })
        .await
    }

    async fn get_all_validators(&self) -> Result<Vec<ValidatorInfo>, ConnectorError> {
        self.call("get_all_validators", || self.inner.get_all_validators())
            .await
    }

    async fn get_genesis_accounts(&self) -> Result<Vec<GenesisAccount>, ConnectorError> {
        self.call("get_genesis_accounts", || self.inner.get_genesis_accounts())
            .await
    }
}
