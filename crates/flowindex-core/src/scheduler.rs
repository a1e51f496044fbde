//! The catch-up scheduler: sequential indexing from the committed height to
//! the safe tip.
//!
//! # Cycle
//! 1. Check shutdown.
//! 2. Query the chain tip and derive the safe tip. Not ready → short wait.
//! 3. Read the committed height from the store. Caught up → long wait.
//! 4. Index `committed + 1 ..= safe_tip` one height at a time:
//!    - committed: advance immediately;
//!    - refused (soft failure): wait, then retry the same height;
//!    - error: return it to the supervisor.
//!
//! Shutdown is only observed between steps and before waits.

use std::time::Instant;

use tokio::sync::watch;

use crate::cursor::Cursor;
use crate::error::IndexerError;
use crate::indexer::{IndexerConfig, IndexerState};
use crate::oracle::{BlockTransformer, ChainTipOracle};
use crate::policy::ConfirmationPolicy;
use crate::progress::BlockProgress;
use crate::shutdown::ShutdownToken;
use crate::store::GraphStore;
use crate::types::Height;

/// Result of a single indexing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The store committed the block.
    Committed,
    /// The store refused the block without raising an error.
    Refused,
}

/// Counters accumulated over one run of the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatchUpReport {
    pub blocks_indexed: u64,
    pub transactions_indexed: u64,
    pub soft_failures: u64,
    /// Last height this run saw committed.
    pub committed: Option<Height>,
}

/// Drives sequential indexing for one supervisor attempt.
pub struct CatchUpScheduler<'a, O, T, S> {
    config: &'a IndexerConfig,
    policy: ConfirmationPolicy,
    oracle: &'a O,
    transformer: &'a T,
    store: &'a S,
    shutdown: &'a ShutdownToken,
    state: &'a watch::Sender<IndexerState>,
}

impl<'a, O, T, S> CatchUpScheduler<'a, O, T, S>
where
    O: ChainTipOracle,
    T: BlockTransformer,
    S: GraphStore,
{
    pub fn new(
        config: &'a IndexerConfig,
        oracle: &'a O,
        transformer: &'a T,
        store: &'a S,
        shutdown: &'a ShutdownToken,
        state: &'a watch::Sender<IndexerState>,
    ) -> Self {
        Self {
            config,
            policy: config.policy(),
            oracle,
            transformer,
            store,
            shutdown,
            state,
        }
    }

    /// Run until shutdown is requested or a hard failure occurs.
    pub async fn run(&self) -> Result<CatchUpReport, IndexerError> {
        let mut report = CatchUpReport::default();

        while !self.shutdown.is_triggered() {
            let chain_tip = self.oracle.current_height().await?;

            let Some(safe_tip) = self.policy.safe_tip(chain_tip) else {
                self.set_state(IndexerState::WaitingForConfirmations);
                tracing::info!(
                    chain_tip,
                    depth = self.policy.depth(),
                    "Waiting for enough blocks to be mined"
                );
                self.shutdown.sleep(self.config.not_ready_poll()).await;
                continue;
            };

            let committed = self.store.last_committed_height().await?;
            check_monotonic(report.committed, committed)?;
            report.committed = committed;

            let mut cursor = Cursor::new(committed, self.config.start_height);
            let Some(range) = cursor.pending(safe_tip) else {
                self.set_state(IndexerState::WaitingForNewBlocks);
                tracing::info!(safe_tip, committed = ?committed, "Waiting for new blocks");
                self.shutdown.sleep(self.config.idle_poll()).await;
                continue;
            };

            self.set_state(IndexerState::Indexing);
            tracing::debug!(
                from = *range.start(),
                to = *range.end(),
                chain_tip,
                "Catching up"
            );

            while cursor.next_height() <= safe_tip {
                let height = cursor.next_height();
                let outcome = self.index_block(height, chain_tip, &mut report).await?;

                if outcome == StepOutcome::Committed {
                    cursor.advance(height);
                    report.committed = Some(height);
                }

                if self.shutdown.is_triggered() {
                    tracing::info!(height, ?outcome, "Finished in-flight block before shutdown");
                    break;
                }

                if outcome == StepOutcome::Refused {
                    self.set_state(IndexerState::WaitingForSoftRetry);
                    tracing::error!(
                        height,
                        retry_in_ms = self.config.soft_retry_delay_ms,
                        "Failed to index block"
                    );
                    self.shutdown.sleep(self.config.soft_retry_delay()).await;
                    if self.shutdown.is_triggered() {
                        break;
                    }
                    self.set_state(IndexerState::Indexing);
                }
            }
        }

        self.set_state(IndexerState::ShuttingDown);
        Ok(report)
    }

    /// Fetch, transform and persist one height.
    async fn index_block(
        &self,
        height: Height,
        chain_tip: Height,
        report: &mut CatchUpReport,
    ) -> Result<StepOutcome, IndexerError> {
        let block = self.oracle.block_at(height).await?;
        if block.height != height {
            return Err(IndexerError::HeightMismatch {
                requested: height,
                actual: block.height,
            });
        }

        let started = Instant::now();
        let graph = self.transformer.to_graph(&block)?;
        let committed = self.store.persist(&graph).await?;

        let progress = BlockProgress {
            height,
            tx_count: block.tx_count(),
            elapsed: started.elapsed(),
            chain_tip,
            committed,
        };
        progress.log();

        if committed {
            report.blocks_indexed += 1;
            report.transactions_indexed += block.tx_count() as u64;
            Ok(StepOutcome::Committed)
        } else {
            report.soft_failures += 1;
            Ok(StepOutcome::Refused)
        }
    }

    fn set_state(&self, state: IndexerState) {
        self.state.send_if_modified(|current| {
            let changed = *current != state;
            *current = state;
            changed
        });
    }
}

/// The committed height may only move forward.
fn check_monotonic(previous: Option<Height>, current: Option<Height>) -> Result<(), IndexerError> {
    match (previous, current) {
        (Some(prev), Some(cur)) if cur < prev => Err(IndexerError::CursorRegressed {
            previous: prev,
            current,
        }),
        (Some(prev), None) => Err(IndexerError::CursorRegressed {
            previous: prev,
            current: None,
        }),
        _ => Ok(()),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
