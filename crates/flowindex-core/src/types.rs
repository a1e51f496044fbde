//! Shared block and transaction types consumed by the indexing pipeline.

use serde::{Deserialize, Serialize};

/// Position of a block in the chain (genesis = 0).
pub type Height = u64;

// ─── Block ───────────────────────────────────────────────────────────────────

/// A fully fetched block, as handed over by a [`ChainTipOracle`].
///
/// Blocks are consumed by exactly one indexing step and then dropped.
///
/// [`ChainTipOracle`]: crate::oracle::ChainTipOracle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Block height.
    pub height: Height,
    /// Block hash (hex, node byte order).
    pub hash: String,
    /// Hash of the parent block; `None` for genesis.
    pub prev_hash: Option<String>,
    /// Unix timestamp of the block header (seconds since epoch).
    pub timestamp: i64,
    /// Transactions in block order.
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Number of transactions in the block.
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// A transaction with its inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Returns `true` if this transaction mints new coins.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.iter().any(|i| matches!(i, TxInput::Coinbase))
    }

    /// Sum of all output values in satoshis.
    pub fn total_output_sat(&self) -> u64 {
        self.outputs.iter().map(|o| o.value_sat).sum()
    }
}

/// A transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxInput {
    /// Newly minted coins (block reward + fees).
    Coinbase,
    /// Spend of a previous output. `address` and `value_sat` are only known
    /// when the node resolved the previous output for us.
    Spend {
        prev_txid: String,
        prev_vout: u32,
        address: Option<String>,
        value_sat: Option<u64>,
    },
}

/// A transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Output index (`vout`).
    pub index: u32,
    /// Value in satoshis.
    pub value_sat: u64,
    /// Receiving address; `None` for non-standard or data-carrier outputs.
    pub address: Option<String>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn coinbase_tx() -> Transaction {
        Transaction {
            txid: "cb".into(),
            inputs: vec![TxInput::Coinbase],
            outputs: vec![TxOutput {
                index: 0,
                value_sat: 625_000_000,
                address: Some("1Miner".into()),
            }],
        }
    }

    #[test]
    fn coinbase_detection() {
        assert!(coinbase_tx().is_coinbase());

        let spend = Transaction {
            txid: "t1".into(),
            inputs: vec![TxInput::Spend {
                prev_txid: "cb".into(),
                prev_vout: 0,
                address: None,
                value_sat: None,
            }],
            outputs: vec![],
        };
        assert!(!spend.is_coinbase());
    }

    #[test]
    fn output_total() {
        let mut tx = coinbase_tx();
        tx.outputs.push(TxOutput { index: 1, value_sat: 5, address: None });
        assert_eq!(tx.total_output_sat(), 625_000_005);
    }

    #[test]
    fn input_serializes_with_kind_tag() {
        let json = serde_json::to_value(TxInput::Coinbase).unwrap();
        assert_eq!(json["kind"], "coinbase");
    }
}
