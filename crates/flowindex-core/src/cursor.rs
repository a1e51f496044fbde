//! Indexer cursor: the scheduler's view of the committed height.

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::types::Height;

/// The indexer's current position in the chain.
///
/// Built from the store's committed height at the top of every scheduling
/// cycle; only advanced after the store reports a successful persist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Last committed height, `None` for an empty store.
    committed: Option<Height>,
    /// Where to begin when nothing has been committed.
    start_height: Height,
}

impl Cursor {
    pub fn new(committed: Option<Height>, start_height: Height) -> Self {
        Self {
            committed,
            start_height,
        }
    }

    pub fn committed(&self) -> Option<Height> {
        self.committed
    }

    /// Returns the next height to process (committed + 1).
    pub fn next_height(&self) -> Height {
        match self.committed {
            Some(h) => h.saturating_add(1),
            None => self.start_height,
        }
    }

    /// Heights still to be indexed up to and including `safe_tip`, or `None`
    /// if the cursor has already caught up.
    pub fn pending(&self, safe_tip: Height) -> Option<RangeInclusive<Height>> {
        let next = self.next_height();
        (next <= safe_tip).then(|| next..=safe_tip)
    }

    /// Record that `height` was committed. Heights must arrive in order.
    pub fn advance(&mut self, height: Height) {
        debug_assert_eq!(height, self.next_height(), "cursor advanced out of order");
        self.committed = Some(height);
    }
}
