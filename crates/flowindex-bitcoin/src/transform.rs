//! Funds-flow transformer: one block in, one money-flow graph out.
//!
//! For every transaction:
//! - coinbase input: `Coinbase -> tx` carrying the newly minted total,
//! - spend with a known owner: `address -> tx` with the spent value,
//! - spend without one: `outpoint -> tx` so the link is not lost,
//! - output with an address: `tx -> address` with its value.
//!
//! Outputs without an address (`OP_RETURN`, bare multisig, raw pubkey) count
//! towards the transaction totals but produce no node.

use flowindex_core::error::IndexerError;
use flowindex_core::graph::{FlowNode, MoneyFlowGraph, TxNode};
use flowindex_core::oracle::BlockTransformer;
use flowindex_core::types::{Block, Transaction, TxInput};

#[derive(Debug, Clone, Copy, Default)]
pub struct FundsFlowTransformer;

impl FundsFlowTransformer {
    pub fn new() -> Self {
        Self
    }

    fn add_transaction(
        graph: &mut MoneyFlowGraph,
        position: usize,
        tx: &Transaction,
    ) -> Result<(), IndexerError> {
        let height = graph.height;
        if tx.inputs.is_empty() {
            return Err(IndexerError::Transform {
                height,
                reason: format!("transaction {} has no inputs", tx.txid),
            });
        }
        if tx.is_coinbase() && position != 0 {
            return Err(IndexerError::Transform {
                height,
                reason: format!("coinbase {} at position {position}", tx.txid),
            });
        }

        let total_out_sat = tx.total_output_sat();
        graph.transactions.push(TxNode {
            txid: tx.txid.clone(),
            is_coinbase: tx.is_coinbase(),
            input_count: tx.inputs.len() as u32,
            output_count: tx.outputs.len() as u32,
            total_out_sat,
        });

        let this_tx = FlowNode::transaction(&tx.txid);
        for input in &tx.inputs {
            match input {
                TxInput::Coinbase => {
                    graph.add_edge(FlowNode::Coinbase, this_tx.clone(), Some(total_out_sat));
                }
                TxInput::Spend {
                    prev_txid,
                    prev_vout,
                    address,
                    value_sat,
                } => {
                    let source = match address {
                        Some(addr) => FlowNode::address(addr),
                        None => FlowNode::Outpoint {
                            txid: prev_txid.clone(),
                            vout: *prev_vout,
                        },
                    };
                    graph.add_edge(source, this_tx.clone(), *value_sat);
                }
            }
        }

        for output in &tx.outputs {
            if let Some(addr) = &output.address {
                graph.add_edge(this_tx.clone(), FlowNode::address(addr), Some(output.value_sat));
            }
        }
        Ok(())
    }
}

impl BlockTransformer for FundsFlowTransformer {
    fn to_graph(&self, block: &Block) -> Result<MoneyFlowGraph, IndexerError> {
        if block.transactions.is_empty() {
            return Err(IndexerError::Transform {
                height: block.height,
                reason: "block has no transactions".into(),
            });
        }

        let mut graph = MoneyFlowGraph::for_block(block);
        for (position, tx) in block.transactions.iter().enumerate() {
            Self::add_transaction(&mut graph, position, tx)?;
        }

        tracing::trace!(
            height = block.height,
            transactions = graph.tx_count(),
            addresses = graph.addresses.len(),
            edges = graph.edges.len(),
            "graph built"
        );
        Ok(graph)
    }
}
