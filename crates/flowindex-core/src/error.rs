//! Error types for the flowindex pipeline.

use thiserror::Error;

use crate::types::Height;

/// Errors that can occur during indexing.
///
/// Every variant is a hard failure from the scheduler's point of view: it
/// aborts the current attempt and hands control back to the supervisor.
/// Soft persist failures are not errors; they are reported as `Ok(false)`.
#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Block {height} not available: {reason}")]
    BlockUnavailable { height: Height, reason: String },

    #[error("Node returned block {actual} when block {requested} was requested")]
    HeightMismatch { requested: Height, actual: Height },

    #[error("Transform error at block {height}: {reason}")]
    Transform { height: Height, reason: String },

    #[error("Committed height went backwards: {previous} -> {current:?}")]
    CursorRegressed {
        previous: Height,
        current: Option<Height>,
    },

    #[error("Indexer attempt panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Other(String),
}

impl IndexerError {
    /// Returns `true` if the error is likely to clear up on its own
    /// (node or database temporarily unreachable).
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Rpc(_) | Self::Storage(_) | Self::BlockUnavailable { .. }
        )
    }
}
