//! Fluent builder API for indexer configuration.
//!
//! # Example
//!
//! ```rust
//! use flowindex_core::IndexerBuilder;
//!
//! let config = IndexerBuilder::new()
//!     .id("mainnet-flows")
//!     .confirmation_depth(6)
//!     .soft_retry_delay_ms(30_000)
//!     .build_config();
//! assert_eq!(config.id, "mainnet-flows");
//! ```

use crate::indexer::IndexerConfig;
use crate::types::Height;

/// Fluent builder for `IndexerConfig`.
#[derive(Default)]
pub struct IndexerBuilder {
    config: IndexerConfig,
}

impl IndexerBuilder {
    pub fn new() -> Self {
        Self {
            config: IndexerConfig::default(),
        }
    }

    /// Set the indexer ID (attached to log records).
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Set the chain label.
    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        self.config.chain = chain.into();
        self
    }

    /// Set the first height indexed into an empty store.
    pub fn start_height(mut self, height: Height) -> Self {
        self.config.start_height = height;
        self
    }

    /// Set confirmation depth (blocks behind tip before processing).
    pub fn confirmation_depth(mut self, depth: u64) -> Self {
        self.config.confirmation_depth = depth;
        self
    }

    pub fn not_ready_poll_ms(mut self, ms: u64) -> Self {
        self.config.not_ready_poll_ms = ms;
        self
    }

    pub fn idle_poll_ms(mut self, ms: u64) -> Self {
        self.config.idle_poll_ms = ms;
        self
    }

    pub fn soft_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.soft_retry_delay_ms = ms;
        self
    }

    pub fn restart_backoff_ms(mut self, ms: u64) -> Self {
        self.config.restart_backoff_ms = ms;
        self
    }

    /// Build the `IndexerConfig`.
    pub fn build_config(self) -> IndexerConfig {
        self.config
    }
}
