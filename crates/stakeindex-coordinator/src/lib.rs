//! stakeindex-coordinator decides *what* to index, without indexing itself.
//!
//! The coordinator waits for the node to finish syncing, then drives two
//! recurring jobs against the indexer: missing-block reconciliation and
//! validator refresh. It is a best-effort scheduler: a failed tick is logged
//! and retried on the next one, never fatal.

pub mod config;
pub mod coordinator;
pub mod error;

pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, CoordinatorState};
pub use error::CoordinatorError;
