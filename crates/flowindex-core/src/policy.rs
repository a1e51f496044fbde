//! Confirmation-lag policy: which heights are final enough to index.

use serde::{Deserialize, Serialize};

use crate::types::Height;

/// Excludes the newest `depth` blocks from indexing to ride out shallow
/// reorganizations.
///
/// The depth is subtracted exactly once from the live tip. The safe tip is
/// recomputed on every scheduling cycle and never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    depth: u64,
}

impl ConfirmationPolicy {
    /// Default number of trailing blocks treated as not yet final.
    pub const DEFAULT_DEPTH: u64 = 6;

    pub fn new(depth: u64) -> Self {
        Self { depth }
    }

    pub fn depth(&self) -> u64 {
        self.depth
    }

    /// Highest height safe to index given `chain_tip`.
    ///
    /// Returns `None` ("not ready") while the chain is shorter than the depth.
    pub fn safe_tip(&self, chain_tip: Height) -> Option<Height> {
        chain_tip.checked_sub(self.depth)
    }

    /// Returns `true` if `height` is at or below the safe tip for `chain_tip`.
    pub fn is_confirmed(&self, height: Height, chain_tip: Height) -> bool {
        self.safe_tip(chain_tip).is_some_and(|safe| height <= safe)
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DEPTH)
    }
}
