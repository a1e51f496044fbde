//! flowindex-bitcoin: Bitcoin Core collaborators for FlowIndex.
//!
//! - [`BitcoinNode`]: [`ChainTipOracle`](flowindex_core::ChainTipOracle) over
//!   Bitcoin Core JSON-RPC (`getblockcount`, `getblockhash`, `getblock`).
//! - [`FundsFlowTransformer`]: turns a block into its money-flow graph.
//! - [`wait_for_sync`]: blocks until the node has caught up with its headers.
//!
//! # Example
//!
//! ```rust,no_run
//! use flowindex_bitcoin::{BitcoinNode, HttpRpcClient};
//! use flowindex_core::ChainTipOracle;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let rpc = HttpRpcClient::default_for(
//!     "http://127.0.0.1:8332",
//!     Some(("rpcuser".into(), "rpcpassword".into())),
//! )?;
//! let node = BitcoinNode::new(rpc).with_prevouts();
//! let tip = node.current_height().await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod node;
pub mod request;
pub mod retry;
pub mod sync;
pub mod transform;
pub mod transport;

#[cfg(test)]
mod testkit;

pub use error::RpcError;
pub use node::{btc_to_sat, BitcoinNode, BlockchainInfo};
pub use retry::{RetryConfig, RetryPolicy};
pub use sync::wait_for_sync;
pub use transform::FundsFlowTransformer;
pub use transport::{HttpClientConfig, HttpRpcClient, RpcTransport};
