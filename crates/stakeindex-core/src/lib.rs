//! stakeindex-core: the indexing engine.
//!
//! # Architecture
//!
//! ```text
//! Coordinator ──► Indexer
//!                    ├── ProcessorRegistry   (module/command → transaction processor)
//!                    ├── IndexProgress       (current height, genesis, blocks indexed)
//!                    ├── ValidatorRanking    (in-memory ranked validator cache)
//!                    ├── EventBus            (indexUpdated / nodeInfoUpdated signals)
//!                    └── Store backend       (memory / SQLite, per-block transactions)
//! ```
//!
//! Every block is applied as one store transaction: the block row, its
//! transaction rows, all processor effects and the progress marker commit
//! together or not at all.

pub mod entities;
pub mod error;
pub mod events;
pub mod gaps;
pub mod indexer;
pub mod processor;
pub mod processors;
pub mod progress;
pub mod ranking;

pub use entities::{Account, Validator, VoteEdge};
pub use error::IndexError;
pub use events::{EventBus, IndexEvent};
pub use gaps::HeightRange;
pub use indexer::Indexer;
pub use processor::{ProcessorRegistry, TransactionProcessor};
pub use progress::{IndexProgress, IndexStats};
pub use ranking::{compare_validators, ValidatorRanking};
