//! Scripted collaborators for scheduler and supervisor tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::graph::{FlowNode, MoneyFlowGraph, TxNode};
use crate::oracle::{BlockTransformer, ChainTipOracle};
use crate::shutdown::ShutdownToken;
use crate::store::{GraphStore, StoreConnector};
use crate::types::{Block, Height, Transaction, TxInput, TxOutput};

// ─── Chain ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ChainState {
    tip: Height,
    grows: bool,
    polls: u32,
    stop_after_polls: Option<(u32, ShutdownToken)>,
    failures: HashMap<Height, u32>,
    panics: HashMap<Height, u32>,
    /// (requested height, tip at the most recent poll)
    fetched: Vec<(Height, Height)>,
}

/// Node double with a scripted tip and per-height failures.
#[derive(Clone, Default)]
pub struct ScriptedChain {
    inner: Arc<Mutex<ChainState>>,
}

impl ScriptedChain {
    pub fn new(tip: Height) -> Self {
        let chain = Self::default();
        chain.inner.lock().unwrap().tip = tip;
        chain
    }

    /// Tip starts at `tip` and grows by one on every poll.
    pub fn growing(tip: Height) -> Self {
        let chain = Self::new(tip);
        chain.inner.lock().unwrap().grows = true;
        chain
    }

    /// Trigger `shutdown` on the `n`-th tip poll.
    pub fn stop_after_polls(self, n: u32, shutdown: ShutdownToken) -> Self {
        self.inner.lock().unwrap().stop_after_polls = Some((n, shutdown));
        self
    }

    pub fn fail_block(self, height: Height) -> Self {
        self.fail_block_times(height, u32::MAX)
    }

    pub fn fail_block_times(self, height: Height, times: u32) -> Self {
        self.inner.lock().unwrap().failures.insert(height, times);
        self
    }

    /// Panic once while fetching `height`.
    pub fn panic_at(self, height: Height) -> Self {
        self.inner.lock().unwrap().panics.insert(height, 1);
        self
    }

    pub fn polls(&self) -> u32 {
        self.inner.lock().unwrap().polls
    }

    pub fn fetched(&self) -> Vec<Height> {
        self.inner.lock().unwrap().fetched.iter().map(|(h, _)| *h).collect()
    }

    pub fn fetches_with_tip(&self) -> Vec<(Height, Height)> {
        self.inner.lock().unwrap().fetched.clone()
    }
}

#[async_trait]
impl ChainTipOracle for ScriptedChain {
    async fn current_height(&self) -> Result<Height, IndexerError> {
        let mut state = self.inner.lock().unwrap();
        if state.grows && state.polls > 0 {
            state.tip += 1;
        }
        state.polls += 1;
        if let Some((n, token)) = &state.stop_after_polls {
            if state.polls >= *n {
                token.trigger();
            }
        }
        Ok(state.tip)
    }

    async fn block_at(&self, height: Height) -> Result<Block, IndexerError> {
        let should_panic = {
            let mut state = self.inner.lock().unwrap();
            let tip = state.tip;
            state.fetched.push((height, tip));

            if let Some(left) = state.failures.get_mut(&height) {
                if *left > 0 {
                    *left -= 1;
                    return Err(IndexerError::BlockUnavailable {
                        height,
                        reason: "scripted failure".into(),
                    });
                }
            }
            match state.panics.get_mut(&height) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            }
        };
        if should_panic {
            panic!("scripted panic at block {height}");
        }
        Ok(sample_block(height))
    }
}

/// A block with a coinbase and one spend.
pub fn sample_block(height: Height) -> Block {
    Block {
        height,
        hash: format!("{height:064x}"),
        prev_hash: height.checked_sub(1).map(|p| format!("{p:064x}")),
        timestamp: 1_231_006_505 + height as i64 * 600,
        transactions: vec![
            Transaction {
                txid: format!("cb{height}"),
                inputs: vec![TxInput::Coinbase],
                outputs: vec![TxOutput {
                    index: 0,
                    value_sat: 5_000_000_000,
                    address: Some("1Miner".into()),
                }],
            },
            Transaction {
                txid: format!("tx{height}"),
                inputs: vec![TxInput::Spend {
                    prev_txid: "prev".into(),
                    prev_vout: 0,
                    address: Some("1Alice".into()),
                    value_sat: Some(1_000),
                }],
                outputs: vec![TxOutput {
                    index: 0,
                    value_sat: 900,
                    address: Some("1Bob".into()),
                }],
            },
        ],
    }
}

// ─── Transformer ─────────────────────────────────────────────────────────────

/// Minimal transformer: one tx node per transaction, output edges only.
pub struct CountingTransformer;

impl BlockTransformer for CountingTransformer {
    fn to_graph(&self, block: &Block) -> Result<MoneyFlowGraph, IndexerError> {
        let mut graph = MoneyFlowGraph::for_block(block);
        for tx in &block.transactions {
            graph.transactions.push(TxNode {
                txid: tx.txid.clone(),
                is_coinbase: tx.is_coinbase(),
                input_count: tx.inputs.len() as u32,
                output_count: tx.outputs.len() as u32,
                total_out_sat: tx.total_output_sat(),
            });
            for out in &tx.outputs {
                if let Some(addr) = &out.address {
                    graph.add_edge(
                        FlowNode::transaction(&tx.txid),
                        FlowNode::address(addr),
                        Some(out.value_sat),
                    );
                }
            }
        }
        Ok(graph)
    }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A recorded store interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    EnsureSchema,
    LastCommitted,
    Persist {
        height: Height,
        committed_before: Option<Height>,
    },
    Close,
}

enum Trigger {
    AfterCommit(Height),
    DuringPersist(Height),
    AfterPersists(u32),
}

#[derive(Default)]
struct StoreState {
    committed: Option<Height>,
    refusals: HashMap<Height, u32>,
    schema_failures: u32,
    panic_on_close: bool,
    triggers: Vec<(Trigger, ShutdownToken)>,
    persists: u32,
    calls: Vec<Call>,
}

/// Store double with a durable cursor shared across handles.
#[derive(Clone, Default)]
pub struct ScriptedStore {
    inner: Arc<Mutex<StoreState>>,
}

impl ScriptedStore {
    pub fn new(committed: Option<Height>) -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().committed = committed;
        store
    }

    /// Refuse `height` the next `times` persists.
    pub fn refuse(self, height: Height, times: u32) -> Self {
        self.inner.lock().unwrap().refusals.insert(height, times);
        self
    }

    pub fn fail_schema_times(self, times: u32) -> Self {
        self.inner.lock().unwrap().schema_failures = times;
        self
    }

    pub fn panic_on_close(self) -> Self {
        self.inner.lock().unwrap().panic_on_close = true;
        self
    }

    pub fn trigger_after_commit(self, height: Height, shutdown: ShutdownToken) -> Self {
        self.push_trigger(Trigger::AfterCommit(height), shutdown)
    }

    pub fn trigger_during_persist(self, height: Height, shutdown: ShutdownToken) -> Self {
        self.push_trigger(Trigger::DuringPersist(height), shutdown)
    }

    pub fn trigger_after_persists(self, n: u32, shutdown: ShutdownToken) -> Self {
        self.push_trigger(Trigger::AfterPersists(n), shutdown)
    }

    fn push_trigger(self, trigger: Trigger, shutdown: ShutdownToken) -> Self {
        self.inner.lock().unwrap().triggers.push((trigger, shutdown));
        self
    }

    pub fn committed(&self) -> Option<Height> {
        self.inner.lock().unwrap().committed
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn record(&self, call: Call) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl GraphStore for ScriptedStore {
    async fn ensure_schema(&self) -> Result<(), IndexerError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push(Call::EnsureSchema);
        if state.schema_failures > 0 {
            state.schema_failures -= 1;
            return Err(IndexerError::Storage("scripted schema failure".into()));
        }
        Ok(())
    }

    async fn last_committed_height(&self) -> Result<Option<Height>, IndexerError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push(Call::LastCommitted);
        Ok(state.committed)
    }

    async fn persist(&self, graph: &MoneyFlowGraph) -> Result<bool, IndexerError> {
        let mut state = self.inner.lock().unwrap();
        let height = graph.height;
        let committed_before = state.committed;
        state.calls.push(Call::Persist { height, committed_before });
        state.persists += 1;
        let persists = state.persists;

        for (trigger, token) in &state.triggers {
            match trigger {
                Trigger::DuringPersist(h) if *h == height => token.trigger(),
                Trigger::AfterPersists(n) if *n == persists => token.trigger(),
                _ => {}
            }
        }

        if let Some(left) = state.refusals.get_mut(&height) {
            if *left > 0 {
                *left -= 1;
                return Ok(false);
            }
        }
        if let Some(c) = committed_before {
            if height != c + 1 {
                return Ok(false);
            }
        }

        state.committed = Some(height);
        for (trigger, token) in &state.triggers {
            if matches!(trigger, Trigger::AfterCommit(h) if *h == height) {
                token.trigger();
            }
        }
        Ok(true)
    }

    async fn close(&self) -> Result<(), IndexerError> {
        self.record(Call::Close);
        if self.inner.lock().unwrap().panic_on_close {
            panic!("scripted close panic");
        }
        Ok(())
    }
}

/// Hands out handles to one shared [`ScriptedStore`].
pub struct ScriptedConnector {
    store: ScriptedStore,
    connect_failures: Mutex<u32>,
    connect_panics: Mutex<u32>,
}

impl ScriptedConnector {
    pub fn new(store: ScriptedStore) -> Self {
        Self {
            store,
            connect_failures: Mutex::new(0),
            connect_panics: Mutex::new(0),
        }
    }

    pub fn fail_connects(self, times: u32) -> Self {
        *self.connect_failures.lock().unwrap() = times;
        self
    }

    pub fn panic_connects(self, times: u32) -> Self {
        *self.connect_panics.lock().unwrap() = times;
        self
    }
}

#[async_trait]
impl StoreConnector for ScriptedConnector {
    type Store = ScriptedStore;

    async fn connect(&self) -> Result<ScriptedStore, IndexerError> {
        {
            let mut failures = self.connect_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(IndexerError::Storage("scripted connect failure".into()));
            }
        }
        {
            let mut panics = self.connect_panics.lock().unwrap();
            if *panics > 0 {
                *panics -= 1;
                drop(panics);
                panic!("scripted connect panic");
            }
        }
        self.store.record(Call::Connect);
        Ok(self.store.clone())
    }
}
