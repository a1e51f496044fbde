//! Collaborator traits on the read side: the node and the block transformer.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::IndexerError;
use crate::graph::MoneyFlowGraph;
use crate::types::{Block, Height};

/// Source of the live chain tip and of block contents.
///
/// Implementations talk to a full node; see `flowindex-bitcoin` for the
/// Bitcoin Core implementation.
#[async_trait]
pub trait ChainTipOracle: Send + Sync {
    /// Current height of the node's best chain.
    async fn current_height(&self) -> Result<Height, IndexerError>;

    /// Fetch the block at `height` on the best chain.
    ///
    /// Fails if the height is unknown to the node.
    async fn block_at(&self, height: Height) -> Result<Block, IndexerError>;
}

/// Pure conversion from a block to its money-flow graph.
pub trait BlockTransformer: Send + Sync {
    fn to_graph(&self, block: &Block) -> Result<MoneyFlowGraph, IndexerError>;
}

#[async_trait]
impl<O: ChainTipOracle + ?Sized> ChainTipOracle for Arc<O> {
    async fn current_height(&self) -> Result<Height, IndexerError> {
        (**self).current_height().await
    }

    async fn block_at(&self, height: Height) -> Result<Block, IndexerError> {
        (**self).block_at(height).await
    }
}

impl<T: BlockTransformer + ?Sized> BlockTransformer for Arc<T> {
    fn to_graph(&self, block: &Block) -> Result<MoneyFlowGraph, IndexerError> {
        (**self).to_graph(block)
    }
}
