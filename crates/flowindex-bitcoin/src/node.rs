//! Bitcoin Core as a [`ChainTipOracle`].
//!
//! Blocks are fetched with `getblockhash` + `getblock <hash> <verbosity>`.
//! Verbosity 2 gives decoded transactions; verbosity 3 (Core 25+) also
//! embeds each input's previous output, which lets the transformer attach
//! addresses and values to spends.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use flowindex_core::error::IndexerError;
use flowindex_core::oracle::ChainTipOracle;
use flowindex_core::types::{Block, Height, Transaction, TxInput, TxOutput};

use crate::error::{RpcError, RPC_INVALID_PARAMETER};
use crate::transport::RpcTransport;

/// Satoshis per BTC.
pub const SATS_PER_BTC: f64 = 100_000_000.0;

/// Convert a BTC amount as printed by Core into satoshis.
pub fn btc_to_sat(btc: f64) -> u64 {
    (btc * SATS_PER_BTC).round() as u64
}

// ─── Raw RPC shapes ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    pub hash: String,
    pub height: Height,
    #[serde(rename = "previousblockhash", default)]
    pub prev_hash: Option<String>,
    pub time: i64,
    pub tx: Vec<RawTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    pub txid: String,
    pub vin: Vec<RawInput>,
    pub vout: Vec<RawOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawInput {
    #[serde(default)]
    pub coinbase: Option<String>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<u32>,
    /// Present with verbosity 3 only.
    #[serde(default)]
    pub prevout: Option<RawPrevout>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPrevout {
    pub value: f64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: RawScriptPubKey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOutput {
    pub value: f64,
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: RawScriptPubKey,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawScriptPubKey {
    #[serde(default)]
    pub address: Option<String>,
    /// Pre-22.0 nodes report a list instead of `address`.
    #[serde(default)]
    pub addresses: Vec<String>,
}

impl RawScriptPubKey {
    /// The single address paying to this script, if there is one.
    pub fn address(&self) -> Option<String> {
        match (&self.address, self.addresses.as_slice()) {
            (Some(a), _) => Some(a.clone()),
            (None, [only]) => Some(only.clone()),
            _ => None,
        }
    }
}

impl RawBlock {
    /// Convert into the chain-agnostic [`Block`].
    pub fn into_block(self) -> Result<Block, IndexerError> {
        let height = self.height;
        let transactions = self
            .tx
            .into_iter()
            .map(|tx| tx.into_transaction(height))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Block {
            height,
            hash: self.hash,
            prev_hash: self.prev_hash,
            timestamp: self.time,
            transactions,
        })
    }
}

impl RawTransaction {
    fn into_transaction(self, height: Height) -> Result<Transaction, IndexerError> {
        let txid = self.txid;
        let inputs = self
            .vin
            .into_iter()
            .map(|vin| {
                if vin.coinbase.is_some() {
                    return Ok(TxInput::Coinbase);
                }
                match (vin.txid, vin.vout) {
                    (Some(prev_txid), Some(prev_vout)) => Ok(TxInput::Spend {
                        prev_txid,
                        prev_vout,
                        address: vin.prevout.as_ref().and_then(|p| p.script_pub_key.address()),
                        value_sat: vin.prevout.as_ref().map(|p| btc_to_sat(p.value)),
                    }),
                    _ => Err(IndexerError::Transform {
                        height,
                        reason: format!("input of {txid} has neither coinbase nor outpoint"),
                    }),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let outputs = self
            .vout
            .into_iter()
            .map(|out| TxOutput {
                index: out.n,
                value_sat: btc_to_sat(out.value),
                address: out.script_pub_key.address(),
            })
            .collect();

        Ok(Transaction {
            txid,
            inputs,
            outputs,
        })
    }
}

/// `getblockchaininfo` subset used for sync checks.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockchainInfo {
    pub chain: String,
    pub blocks: Height,
    pub headers: Height,
    #[serde(rename = "initialblockdownload", default)]
    pub initial_block_download: bool,
    #[serde(rename = "verificationprogress", default)]
    pub verification_progress: f64,
}

impl BlockchainInfo {
    /// The node has validated every header it knows about.
    pub fn is_synced(&self) -> bool {
        self.blocks >= self.headers
    }
}

// ─── Node ────────────────────────────────────────────────────────────────────

/// A Bitcoin Core node reached through an [`RpcTransport`].
pub struct BitcoinNode<T> {
    rpc: T,
    verbosity: u8,
}

impl<T: RpcTransport> BitcoinNode<T> {
    /// Fetch blocks with verbosity 2.
    pub fn new(rpc: T) -> Self {
        Self { rpc, verbosity: 2 }
    }

    /// Fetch blocks with verbosity 3 so spends carry prevout data.
    pub fn with_prevouts(mut self) -> Self {
        self.verbosity = 3;
        self
    }

    pub fn rpc(&self) -> &T {
        &self.rpc
    }

    async fn typed<R: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<R, RpcError> {
        let value = self.rpc.call(method, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get_block_count(&self) -> Result<Height, RpcError> {
        self.typed("getblockcount", vec![]).await
    }

    pub async fn get_block_hash(&self, height: Height) -> Result<String, RpcError> {
        self.typed("getblockhash", vec![json!(height)]).await
    }

    pub async fn get_block(&self, hash: &str) -> Result<RawBlock, RpcError> {
        self.typed("getblock", vec![json!(hash), json!(self.verbosity)])
            .await
    }

    pub async fn get_blockchain_info(&self) -> Result<BlockchainInfo, RpcError> {
        self.typed("getblockchaininfo", vec![]).await
    }
}

#[async_trait]
impl<T: RpcTransport> ChainTipOracle for BitcoinNode<T> {
    async fn current_height(&self) -> Result<Height, IndexerError> {
        Ok(self.get_block_count().await?)
    }

    async fn block_at(&self, height: Height) -> Result<Block, IndexerError> {
        let hash = self.get_block_hash(height).await.map_err(|e| {
            if e.rpc_code() == Some(RPC_INVALID_PARAMETER) {
                IndexerError::BlockUnavailable {
                    height,
                    reason: e.to_string(),
                }
            } else {
                e.into()
            }
        })?;

        let raw = self.get_block(&hash).await?;
        tracing::debug!(height, hash = %hash, txs = raw.tx.len(), "block fetched");
        raw.into_block()
    }
}
