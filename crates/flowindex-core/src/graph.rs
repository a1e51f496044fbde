//! In-memory money-flow graph built from a single block.
//!
//! Nodes are transactions and addresses; edges carry value from spent
//! outputs into a transaction and from the transaction to its outputs.
//! A graph lives for exactly one indexing step: it is built, persisted and
//! dropped.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::types::{Block, Height};

/// One endpoint of a value flow.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FlowNode {
    /// New coins created by a coinbase transaction.
    Coinbase,
    /// A receiving or spending address.
    Address { address: String },
    /// A transaction in this block.
    Transaction { txid: String },
    /// A previous output whose owner the node did not resolve.
    Outpoint { txid: String, vout: u32 },
}

impl FlowNode {
    pub fn address(address: impl Into<String>) -> Self {
        Self::Address { address: address.into() }
    }

    pub fn transaction(txid: impl Into<String>) -> Self {
        Self::Transaction { txid: txid.into() }
    }
}

/// A directed, value-carrying edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: FlowNode,
    pub to: FlowNode,
    /// Value in satoshis; `None` when the spent output was not resolved.
    pub value_sat: Option<u64>,
}

/// Per-transaction node attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxNode {
    pub txid: String,
    pub is_coinbase: bool,
    pub input_count: u32,
    pub output_count: u32,
    pub total_out_sat: u64,
}

/// The money-flow graph of one block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyFlowGraph {
    pub height: Height,
    pub block_hash: String,
    pub timestamp: i64,
    pub transactions: Vec<TxNode>,
    pub addresses: BTreeSet<String>,
    pub edges: Vec<FlowEdge>,
}

impl MoneyFlowGraph {
    /// An empty graph carrying the identity of `block`.
    pub fn for_block(block: &Block) -> Self {
        Self {
            height: block.height,
            block_hash: block.hash.clone(),
            timestamp: block.timestamp,
            transactions: Vec::with_capacity(block.tx_count()),
            addresses: BTreeSet::new(),
            edges: Vec::new(),
        }
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Add an edge, registering any address endpoint as a node.
    pub fn add_edge(&mut self, from: FlowNode, to: FlowNode, value_sat: Option<u64>) {
        for node in [&from, &to] {
            if let FlowNode::Address { address } = node {
                if !self.addresses.contains(address) {
                    self.addresses.insert(address.clone());
                }
            }
        }
        self.edges.push(FlowEdge { from, to, value_sat });
    }

    /// Edges leaving `address`.
    pub fn outflows<'a>(&'a self, address: &'a str) -> impl Iterator<Item = &'a FlowEdge> + 'a {
        self.edges
            .iter()
            .filter(move |e| matches!(&e.from, FlowNode::Address { address: a } if a == address))
    }

    /// Edges arriving at `address`.
    pub fn inflows<'a>(&'a self, address: &'a str) -> impl Iterator<Item = &'a FlowEdge> + 'a {
        self.edges
            .iter()
            .filter(move |e| matches!(&e.to, FlowNode::Address { address: a } if a == address))
    }
}
