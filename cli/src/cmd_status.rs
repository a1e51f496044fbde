//! `flowindex status`

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;

use flowindex_core::{ChainTipOracle, ConfirmationPolicy, Cursor, GraphStore, Height};
use flowindex_storage::SqliteGraphStore;

use crate::{NodeArgs, StoreArgs};

#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct StatusReport {
    pub chain_tip: Height,
    pub safe_tip: Option<Height>,
    pub committed: Option<Height>,
    /// Confirmed blocks not yet indexed.
    pub lag: u64,
    pub blocks: u64,
    pub transactions: u64,
    pub addresses: u64,
}

impl StatusReport {
    fn new(
        chain_tip: Height,
        policy: ConfirmationPolicy,
        start_height: Height,
        committed: Option<Height>,
        counts: (u64, u64, u64),
    ) -> Self {
        let safe_tip = policy.safe_tip(chain_tip);
        let next = Cursor::new(committed, start_height).next_height();
        let lag = safe_tip.map_or(0, |safe| (safe + 1).saturating_sub(next));
        Self {
            chain_tip,
            safe_tip,
            committed,
            lag,
            blocks: counts.0,
            transactions: counts.1,
            addresses: counts.2,
        }
    }
}

fn show(value: Option<Height>) -> String {
    value.map_or_else(|| "-".to_string(), |h| h.to_string())
}

pub async fn run(args: StatusArgs) -> Result<()> {
    let node = args.node.connect()?;
    let chain_tip = node
        .current_height()
        .await
        .context("querying node tip")?;

    let store = SqliteGraphStore::open_existing(&args.store.database)
        .await
        .with_context(|| format!("opening {} (has `flowindex run` created it?)", args.store.database))?;
    let report = async {
        let committed = store.last_committed_height().await?;
        let counts = (
            store.block_count().await?,
            store.transaction_count().await?,
            store.address_count().await?,
        );
        Ok::<_, flowindex_core::IndexerError>(StatusReport::new(
            chain_tip,
            ConfirmationPolicy::new(args.store.confirmation_depth),
            args.store.start_height,
            committed,
            counts,
        ))
    }
    .await;
    store.close().await?;
    let report = report?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Chain tip:     {}", report.chain_tip);
        println!("Safe tip:      {}", show(report.safe_tip));
        println!("Committed:     {}", show(report.committed));
        println!("Lag:           {} blocks", report.lag);
        println!("Blocks:        {}", report.blocks);
        println!("Transactions:  {}", report.transactions);
        println!("Addresses:     {}", report.addresses);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lag_counts_confirmed_unindexed_blocks() {
        let policy = ConfirmationPolicy::new(6);
        assert_eq!(StatusReport::new(101, policy, 0, Some(90), (0, 0, 0)).lag, 5);
        assert_eq!(StatusReport::new(101, policy, 0, Some(95), (0, 0, 0)).lag, 0);
        // empty database: heights 0..=95 are outstanding
        assert_eq!(StatusReport::new(101, policy, 0, None, (0, 0, 0)).lag, 96);
        // chain shorter than the depth
        let young = StatusReport::new(3, policy, 0, None, (0, 0, 0));
        assert_eq!(young.safe_tip, None);
        assert_eq!(young.lag, 0);
    }

    #[test]
    fn lag_starts_at_configured_height() {
        let policy = ConfirmationPolicy::new(6);
        // empty database starting at 90: heights 90..=95 are outstanding
        assert_eq!(StatusReport::new(101, policy, 90, None, (0, 0, 0)).lag, 6);
        // start height above the safe tip
        assert_eq!(StatusReport::new(101, policy, 200, None, (0, 0, 0)).lag, 0);
        // once blocks are stored the start height no longer matters
        assert_eq!(StatusReport::new(101, policy, 90, Some(93), (0, 0, 0)).lag, 2);
    }

    #[tokio::test]
    async fn missing_database_is_an_error() {
        let path = std::env::temp_dir()
            .join(format!("flowindex-status-missing-{}.db", std::process::id()))
            .to_string_lossy()
            .into_owned();
        assert!(SqliteGraphStore::open_existing(&path).await.is_err());
        assert!(!std::path::Path::new(&path).exists());
    }
}
