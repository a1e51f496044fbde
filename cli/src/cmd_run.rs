//! `flowindex run`

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use flowindex_bitcoin::{wait_for_sync, FundsFlowTransformer};
use flowindex_core::{IndexerBuilder, IndexerConfig, ShutdownToken, Supervisor};
use flowindex_storage::SqliteConnector;

use crate::signal::spawn_signal_listener;
use crate::{NodeArgs, StoreArgs};

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub node: NodeArgs,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Indexer ID attached to log records
    #[arg(long, env = "FLOWINDEX_ID", default_value = "funds-flow")]
    pub id: String,

    /// Chain label attached to log records
    #[arg(long, env = "FLOWINDEX_CHAIN", default_value = "bitcoin")]
    pub chain: String,

    /// Wait before re-polling when the chain is shorter than the confirmation depth
    #[arg(long, env = "FLOWINDEX_NOT_READY_POLL_MS", default_value_t = 1_000)]
    pub not_ready_poll_ms: u64,

    /// Wait before re-polling when caught up
    #[arg(long, env = "FLOWINDEX_IDLE_POLL_MS", default_value_t = 10_000)]
    pub idle_poll_ms: u64,

    /// Wait before retrying a block the store refused
    #[arg(long, env = "FLOWINDEX_SOFT_RETRY_DELAY_MS", default_value_t = 30_000)]
    pub soft_retry_delay_ms: u64,

    /// Wait before restarting after a failed attempt
    #[arg(long, env = "FLOWINDEX_RESTART_BACKOFF_MS", default_value_t = 60_000)]
    pub restart_backoff_ms: u64,

    /// Wait for the node to finish syncing before indexing
    #[arg(long, env = "FLOWINDEX_WAIT_FOR_SYNC")]
    pub wait_for_sync: bool,

    /// Sync check interval in seconds
    #[arg(long, env = "FLOWINDEX_SYNC_POLL_SECS", default_value_t = 10)]
    pub sync_poll_secs: u64,
}

impl RunArgs {
    fn indexer_config(&self) -> IndexerConfig {
        IndexerBuilder::new()
            .id(&self.id)
            .chain(&self.chain)
            .start_height(self.store.start_height)
            .confirmation_depth(self.store.confirmation_depth)
            .not_ready_poll_ms(self.not_ready_poll_ms)
            .idle_poll_ms(self.idle_poll_ms)
            .soft_retry_delay_ms(self.soft_retry_delay_ms)
            .restart_backoff_ms(self.restart_backoff_ms)
            .build_config()
    }
}

pub async fn run(args: RunArgs) -> Result<()> {
    let config = args.indexer_config();
    let node = args.node.connect().context("building RPC client")?;

    let shutdown = ShutdownToken::new();
    spawn_signal_listener(shutdown.clone());

    if args.wait_for_sync {
        let poll = Duration::from_secs(args.sync_poll_secs);
        let synced = wait_for_sync(&node, &shutdown, poll)
            .await
            .context("checking node sync status")?;
        if !synced {
            tracing::info!("Shutdown requested before the node finished syncing");
            return Ok(());
        }
    }

    tracing::info!(
        rpc = %args.node.rpc_url,
        database = %args.store.database,
        depth = config.confirmation_depth,
        "Launching indexer"
    );

    let supervisor = Supervisor::new(
        config,
        node,
        FundsFlowTransformer::new(),
        SqliteConnector::new(&args.store.database),
        shutdown,
    );

    let mut state = supervisor.subscribe();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            tracing::debug!(state = %current, "indexer state changed");
        }
    });

    let report = supervisor.run().await;
    tracing::info!(
        attempts = report.attempts,
        failures = report.failures,
        blocks = report.last_run.blocks_indexed,
        transactions = report.last_run.transactions_indexed,
        "Indexer exited"
    );
    Ok(())
}
