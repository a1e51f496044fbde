//! Per-block progress records.
//!
//! Progress is emitted as structured `tracing` events and never feeds back
//! into scheduling.

use std::time::Duration;

use crate::types::Height;

/// Timing and throughput for one indexing step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockProgress {
    pub height: Height,
    pub tx_count: usize,
    /// Time spent transforming and persisting the block.
    pub elapsed: Duration,
    /// Chain tip observed at the start of the current scheduling cycle.
    pub chain_tip: Height,
    /// Whether the store committed the block.
    pub committed: bool,
}

impl BlockProgress {
    /// Transactions per second, `None` when the step took no measurable time.
    pub fn tps(&self) -> Option<f64> {
        let secs = self.elapsed.as_secs_f64();
        (secs > 0.0).then(|| self.tx_count as f64 / secs)
    }

    /// Height as a percentage of the chain tip.
    pub fn percent_of_tip(&self) -> f64 {
        if self.chain_tip == 0 {
            return 100.0;
        }
        (self.height as f64 / self.chain_tip as f64 * 100.0).min(100.0)
    }

    /// Emit the progress record.
    pub fn log(&self) {
        let elapsed_secs = format!("{:.2}", self.elapsed.as_secs_f64());
        let tps = self
            .tps()
            .map(|tps| format!("{tps:.2}"))
            .unwrap_or_else(|| "inf".to_string());
        let progress_pct = format!("{:.2}", self.percent_of_tip());

        tracing::info!(
            height = self.height,
            txs = self.tx_count,
            elapsed_secs = %elapsed_secs,
            tps = %tps,
            progress_pct = %progress_pct,
            committed = self.committed,
            "Block processed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(height: Height, tx_count: usize, elapsed_ms: u64, chain_tip: Height) -> BlockProgress {
        BlockProgress {
            height,
            tx_count,
            elapsed: Duration::from_millis(elapsed_ms),
            chain_tip,
            committed: true,
        }
    }

    #[test]
    fn tps_from_elapsed() {
        let p = progress(100, 500, 250, 200);
        assert_eq!(p.tps(), Some(2000.0));
    }

    #[test]
    fn zero_elapsed_has_no_tps() {
        assert_eq!(progress(100, 500, 0, 200).tps(), None);
    }

    #[test]
    fn percent_of_tip() {
        assert_eq!(progress(50, 1, 1, 200).percent_of_tip(), 25.0);
        assert_eq!(progress(0, 1, 1, 0).percent_of_tip(), 100.0);
    }
}
