//! Supervisor: restarts the whole indexing lifecycle after hard failures.
//!
//! Each attempt:
//! 1. connects a fresh store handle,
//! 2. runs idempotent schema setup,
//! 3. runs the [`CatchUpScheduler`] until shutdown or error,
//! 4. closes the store, whatever happened in 2–3.
//!
//! Panics in any collaborator call count as hard failures.
//!
//! A failed attempt is followed by a fixed backoff and a full restart that
//! re-reads the committed height from the store. A clean return (shutdown) is
//! terminal.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::watch;

use crate::error::IndexerError;
use crate::indexer::{IndexerConfig, IndexerState};
use crate::oracle::{BlockTransformer, ChainTipOracle};
use crate::scheduler::{CatchUpReport, CatchUpScheduler};
use crate::shutdown::ShutdownToken;
use crate::store::{GraphStore, StoreConnector};

/// Summary of a supervisor run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorReport {
    /// Lifecycle attempts started (1 + restarts).
    pub attempts: u32,
    /// Attempts that ended in a hard failure.
    pub failures: u32,
    /// Counters from the final, cleanly stopped attempt.
    pub last_run: CatchUpReport,
}

/// Owns the collaborators and runs the indexer until shutdown.
pub struct Supervisor<O, T, C> {
    config: IndexerConfig,
    oracle: O,
    transformer: T,
    connector: C,
    shutdown: ShutdownToken,
    state: watch::Sender<IndexerState>,
}

impl<O, T, C> Supervisor<O, T, C>
where
    O: ChainTipOracle,
    T: BlockTransformer,
    C: StoreConnector,
{
    pub fn new(
        config: IndexerConfig,
        oracle: O,
        transformer: T,
        connector: C,
        shutdown: ShutdownToken,
    ) -> Self {
        let (state, _) = watch::channel(IndexerState::Starting);
        Self {
            config,
            oracle,
            transformer,
            connector,
            shutdown,
            state,
        }
    }

    /// Watch the indexer state.
    pub fn subscribe(&self) -> watch::Receiver<IndexerState> {
        self.state.subscribe()
    }

    pub fn shutdown_token(&self) -> ShutdownToken {
        self.shutdown.clone()
    }

    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Run until shutdown. Never returns because of a transient error.
    pub async fn run(&self) -> SupervisorReport {
        let mut report = SupervisorReport::default();

        while !self.shutdown.is_triggered() {
            report.attempts += 1;
            self.state.send_replace(IndexerState::Starting);
            tracing::info!(
                indexer = %self.config.id,
                chain = %self.config.chain,
                attempt = report.attempts,
                "Starting indexer"
            );

            match self.run_attempt().await {
                Ok(run) => {
                    report.last_run = run;
                    break;
                }
                Err(e) => {
                    report.failures += 1;
                    self.state.send_replace(IndexerState::Failed);
                    tracing::error!(
                        indexer = %self.config.id,
                        attempt = report.attempts,
                        transient = e.is_transient(),
                        error = %e,
                        "Indexer attempt failed"
                    );

                    if self.shutdown.is_triggered() {
                        break;
                    }
                    tracing::info!(
                        backoff_ms = self.config.restart_backoff_ms,
                        "Retrying after backoff"
                    );
                    self.shutdown.sleep(self.config.restart_backoff()).await;
                }
            }
        }

        self.state.send_replace(IndexerState::Stopped);
        tracing::info!(
            indexer = %self.config.id,
            attempts = report.attempts,
            failures = report.failures,
            "Indexer stopped"
        );
        report
    }

    /// One lifecycle attempt with the store scoped to it.
    async fn run_attempt(&self) -> Result<CatchUpReport, IndexerError> {
        let store = contained(self.connector.connect()).await?;

        let outcome = contained(self.drive(&store)).await;

        if let Err(e) = contained(store.close()).await {
            tracing::warn!(error = %e, "Failed to close graph store");
        }
        outcome
    }

    async fn drive(&self, store: &C::Store) -> Result<CatchUpReport, IndexerError> {
        tracing::info!("Ensuring graph schema");
        store.ensure_schema().await?;

        let chain_tip = self.oracle.current_height().await?;
        let committed = store.last_committed_height().await?;
        tracing::info!(
            chain_tip,
            committed = ?committed,
            depth = self.config.confirmation_depth,
            "Indexer ready"
        );

        CatchUpScheduler::new(
            &self.config,
            &self.oracle,
            &self.transformer,
            store,
            &self.shutdown,
            &self.state,
        )
        .run()
        .await
    }
}

/// Turn a panic inside a collaborator call into a hard failure.
async fn contained<F, R>(fut: F) -> Result<R, IndexerError>
where
    F: Future<Output = Result<R, IndexerError>>,
{
    AssertUnwindSafe(fut)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(IndexerError::Panicked(panic_message(&*panic))))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
