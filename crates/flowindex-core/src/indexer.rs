//! Indexer configuration and state types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::policy::ConfirmationPolicy;
use crate::types::Height;

/// Configuration for an indexer instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
    /// Name of this indexer (attached to log records).
    pub id: String,
    /// Chain being indexed (e.g. `"bitcoin"`).
    pub chain: String,
    /// First height to index when the store is empty.
    pub start_height: Height,
    /// Number of trailing blocks excluded from indexing.
    pub confirmation_depth: u64,
    /// Re-poll interval while the chain is shorter than the confirmation depth (ms).
    pub not_ready_poll_ms: u64,
    /// Re-poll interval when there are no new safe blocks (ms).
    pub idle_poll_ms: u64,
    /// Delay before retrying a block whose persist was refused (ms).
    pub soft_retry_delay_ms: u64,
    /// Delay before restarting the pipeline after a hard failure (ms).
    pub restart_backoff_ms: u64,
}

impl IndexerConfig {
    pub fn policy(&self) -> ConfirmationPolicy {
        ConfirmationPolicy::new(self.confirmation_depth)
    }

    pub fn not_ready_poll(&self) -> Duration {
        Duration::from_millis(self.not_ready_poll_ms)
    }

    pub fn idle_poll(&self) -> Duration {
        Duration::from_millis(self.idle_poll_ms)
    }

    pub fn soft_retry_delay(&self) -> Duration {
        Duration::from_millis(self.soft_retry_delay_ms)
    }

    pub fn restart_backoff(&self) -> Duration {
        Duration::from_millis(self.restart_backoff_ms)
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            id: "default".into(),
            chain: "bitcoin".into(),
            start_height: 0,
            confirmation_depth: ConfirmationPolicy::DEFAULT_DEPTH,
            not_ready_poll_ms: 1_000,
            idle_poll_ms: 10_000,
            soft_retry_delay_ms: 30_000,
            restart_backoff_ms: 60_000,
        }
    }
}

/// Runtime state of the indexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexerState {
    /// Connecting to the store and running schema setup.
    Starting,
    /// Chain tip is below the confirmation depth.
    WaitingForConfirmations,
    /// Caught up with the safe tip; following the chain.
    WaitingForNewBlocks,
    /// Processing blocks.
    Indexing,
    /// A persist was refused; waiting before retrying the same height.
    WaitingForSoftRetry,
    /// Shutdown observed; leaving the catch-up loop.
    ShuttingDown,
    /// The current attempt hit a hard failure.
    Failed,
    /// Terminated.
    Stopped,
}

impl std::fmt::Display for IndexerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::WaitingForConfirmations => write!(f, "waiting-for-confirmations"),
            Self::WaitingForNewBlocks => write!(f, "waiting-for-new-blocks"),
            Self::Indexing => write!(f, "indexing"),
            Self::WaitingForSoftRetry => write!(f, "waiting-for-soft-retry"),
            Self::ShuttingDown => write!(f, "shutting-down"),
            Self::Failed => write!(f, "failed"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}
