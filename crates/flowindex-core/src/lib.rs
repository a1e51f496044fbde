//! flowindex-core: the block-ingestion control loop behind FlowIndex.
//!
//! # Architecture
//!
//! ```text
//! Supervisor                  (restart + backoff, store scoped per attempt)
//!   └── CatchUpScheduler      (committed + 1 ..= safe tip, one block at a time)
//!         ├── ConfirmationPolicy  (chain tip − depth)
//!         ├── ChainTipOracle      (node: tip + blocks)
//!         ├── BlockTransformer    (block → MoneyFlowGraph)
//!         └── GraphStore          (persistence + durable committed height)
//! ShutdownToken               (checked between blocks and before every wait)
//! ```

pub mod builder;
pub mod cursor;
pub mod error;
pub mod graph;
pub mod indexer;
pub mod oracle;
pub mod policy;
pub mod progress;
pub mod scheduler;
pub mod shutdown;
pub mod store;
pub mod supervisor;
pub mod types;

#[cfg(test)]
mod testkit;

pub use builder::IndexerBuilder;
pub use cursor::Cursor;
pub use error::IndexerError;
pub use graph::{FlowEdge, FlowNode, MoneyFlowGraph, TxNode};
pub use indexer::{IndexerConfig, IndexerState};
pub use oracle::{BlockTransformer, ChainTipOracle};
pub use policy::ConfirmationPolicy;
pub use progress::BlockProgress;
pub use scheduler::{CatchUpReport, CatchUpScheduler, StepOutcome};
pub use shutdown::ShutdownToken;
pub use store::{GraphStore, StoreConnector};
pub use supervisor::{Supervisor, SupervisorReport};
pub use types::{Block, Height, Transaction, TxInput, TxOutput};
