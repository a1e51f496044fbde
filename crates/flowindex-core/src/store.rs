//! Graph store traits: persistence and the durable committed-height cursor.
//!
//! The store owns the committed height. The pipeline never writes the cursor
//! directly: a successful [`GraphStore::persist`] of height `h` is the only
//! thing that advances it, and it is read back on every scheduling cycle and
//! on every supervisor restart.

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::graph::MoneyFlowGraph;
use crate::types::Height;

/// Trait for persisting money-flow graphs.
///
/// Implementations include `InMemoryGraphStore` and `SqliteGraphStore`
/// (in `flowindex-storage`).
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Create tables / indexes. Must be idempotent.
    async fn ensure_schema(&self) -> Result<(), IndexerError>;

    /// Height of the last durably persisted block, `None` if nothing has
    /// been committed yet.
    async fn last_committed_height(&self) -> Result<Option<Height>, IndexerError>;

    /// Persist one block's graph.
    ///
    /// - `Ok(true)`: committed, the cursor now equals `graph.height`.
    /// - `Ok(false)`: soft failure, nothing changed; the caller retries later.
    /// - `Err(_)`: hard failure.
    async fn persist(&self, graph: &MoneyFlowGraph) -> Result<bool, IndexerError>;

    /// Release all held resources. Safe to call after earlier failures.
    async fn close(&self) -> Result<(), IndexerError>;
}

/// Opens a fresh [`GraphStore`] handle for one supervisor attempt.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    type Store: GraphStore;

    async fn connect(&self) -> Result<Self::Store, IndexerError>;
}
