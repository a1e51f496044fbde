//! In-memory graph store.
//!
//! Keeps committed graphs in RAM. Handles created with
//! [`InMemoryGraphStore::handle`] share the data but each has its own
//! open/closed state, which mirrors how a database survives a dropped
//! connection. Useful for tests and ephemeral indexers.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use flowindex_core::error::IndexerError;
use flowindex_core::graph::{FlowEdge, MoneyFlowGraph};
use flowindex_core::store::{GraphStore, StoreConnector};
use flowindex_core::types::Height;

/// A committed block graph and when it was stored.
#[derive(Debug, Clone)]
pub struct StoredGraph {
    pub graph: MoneyFlowGraph,
    pub committed_at: DateTime<Utc>,
}

#[derive(Default)]
struct GraphData {
    schema_ready: bool,
    committed: Option<Height>,
    graphs: BTreeMap<Height, StoredGraph>,
}

/// In-memory graph storage.
///
/// All data is lost when the last handle is dropped.
#[derive(Clone, Default)]
pub struct InMemoryGraphStore {
    data: Arc<Mutex<GraphData>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A new open handle onto the same data.
    pub fn handle(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of committed blocks.
    pub fn block_count(&self) -> usize {
        self.read().graphs.len()
    }

    /// Total committed transactions.
    pub fn transaction_count(&self) -> usize {
        self.read().graphs.values().map(|g| g.graph.tx_count()).sum()
    }

    /// Committed graph at `height`.
    pub fn graph_at(&self, height: Height) -> Option<StoredGraph> {
        self.read().graphs.get(&height).cloned()
    }

    /// Committed heights in ascending order.
    pub fn heights(&self) -> Vec<Height> {
        self.read().graphs.keys().copied().collect()
    }

    /// Every committed edge touching `address`, in height order.
    pub fn flows_for_address(&self, address: &str) -> Vec<(Height, FlowEdge)> {
        self.read()
            .graphs
            .iter()
            .flat_map(|(height, stored)| {
                stored
                    .graph
                    .outflows(address)
                    .chain(stored.graph.inflows(address))
                    .map(move |edge| (*height, edge.clone()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    fn read(&self) -> MutexGuard<'_, GraphData> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn open_data(&self) -> Result<MutexGuard<'_, GraphData>, IndexerError> {
        if self.is_closed() {
            return Err(IndexerError::Storage("graph store handle is closed".into()));
        }
        self.data
            .lock()
            .map_err(|_| IndexerError::Storage("graph store lock poisoned".into()))
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn ensure_schema(&self) -> Result<(), IndexerError> {
        self.open_data()?.schema_ready = true;
        Ok(())
    }

    async fn last_committed_height(&self) -> Result<Option<Height>, IndexerError> {
        Ok(self.open_data()?.committed)
    }

    async fn persist(&self, graph: &MoneyFlowGraph) -> Result<bool, IndexerError> {
        let mut data = self.open_data()?;
        if !data.schema_ready {
            return Err(IndexerError::Storage("schema has not been created".into()));
        }

        if let Some(committed) = data.committed {
            if graph.height != committed + 1 {
                tracing::warn!(
                    height = graph.height,
                    committed,
                    "refusing out-of-order block"
                );
                return Ok(false);
            }
        }

        data.graphs.insert(
            graph.height,
            StoredGraph {
                graph: graph.clone(),
                committed_at: Utc::now(),
            },
        );
        data.committed = Some(graph.height);
        tracing::debug!(height = graph.height, edges = graph.edges.len(), "graph stored");
        Ok(true)
    }

    async fn close(&self) -> Result<(), IndexerError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector that hands the supervisor a fresh handle per attempt.
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    store: InMemoryGraphStore,
}

impl InMemoryConnector {
    pub fn new(store: InMemoryGraphStore) -> Self {
        Self { store }
    }

    /// The shared store, for inspection.
    pub fn store(&self) -> &InMemoryGraphStore {
        &self.store
    }
}

#[async_trait]
impl StoreConnector for InMemoryConnector {
    type Store = InMemoryGraphStore;

    async fn connect(&self) -> Result<InMemoryGraphStore, IndexerError> {
        Ok(self.store.handle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowindex_core::graph::FlowNode;

    fn graph(height: Height) -> MoneyFlowGraph {
        let mut g = MoneyFlowGraph {
            height,
            block_hash: format!("{height:064x}"),
            timestamp: 0,
            transactions: vec![],
            addresses: Default::default(),
            edges: vec![],
        };
        g.add_edge(
            FlowNode::transaction(format!("tx{height}")),
            FlowNode::address("1Bob"),
            Some(height * 10),
        );
        g
    }

    async fn ready_store() -> InMemoryGraphStore {
        let store = InMemoryGraphStore::new();
        store.ensure_schema().await.unwrap();
        store
    }

    #[tokio::test]
    async fn persist_advances_cursor() {
        let store = ready_store().await;
        assert_eq!(store.last_committed_height().await.unwrap(), None);

        assert!(store.persist(&graph(100)).await.unwrap());
        assert!(store.persist(&graph(101)).await.unwrap());

        assert_eq!(store.last_committed_height().await.unwrap(), Some(101));
        assert_eq!(store.heights(), vec![100, 101]);
    }

    #[tokio::test]
    async fn out_of_order_is_soft_failure() {
        let store = ready_store().await;
        store.persist(&graph(100)).await.unwrap();

        assert!(!store.persist(&graph(102)).await.unwrap());
        assert!(!store.persist(&graph(100)).await.unwrap());
        assert_eq!(store.last_committed_height().await.unwrap(), Some(100));
        assert_eq!(store.block_count(), 1);
    }

    #[tokio::test]
    async fn persist_requires_schema() {
        let store = InMemoryGraphStore::new();
        assert!(store.persist(&graph(1)).await.is_err());
    }

    #[tokio::test]
    async fn closed_handle_rejects_calls_but_data_survives() {
        let store = ready_store().await;
        store.persist(&graph(5)).await.unwrap();
        store.close().await.unwrap();
        store.close().await.unwrap(); // safe to repeat

        assert!(store.is_closed());
        assert!(store.last_committed_height().await.is_err());

        let reopened = store.handle();
        assert_eq!(reopened.last_committed_height().await.unwrap(), Some(5));
    }

    #[tokio::test]
    async fn connector_hands_out_fresh_handles() {
        let connector = InMemoryConnector::default();
        let first = connector.connect().await.unwrap();
        first.ensure_schema().await.unwrap();
        first.persist(&graph(0)).await.unwrap();
        first.close().await.unwrap();

        let second = connector.connect().await.unwrap();
        assert!(!second.is_closed());
        assert_eq!(second.last_committed_height().await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn flows_for_address_spans_blocks() {
        let store = ready_store().await;
        for h in 1..=3 {
            store.persist(&graph(h)).await.unwrap();
        }
        let flows = store.flows_for_address("1Bob");
        assert_eq!(flows.len(), 3);
        assert_eq!(flows[2].0, 3);
        assert_eq!(flows[2].1.value_sat, Some(30));
        assert!(store.flows_for_address("1Nobody").is_empty());
    }
}
