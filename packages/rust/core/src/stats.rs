//! Per-run statistics.

use serde::Serialize;

/// Success/failure tally for one stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageTally {
    pub ok: usize,
    pub failed: usize,
}

impl StageTally {
    pub fn record(&mut self, ok: bool) {
        if ok {
            self.ok += 1;
        } else {
            self.failed += 1;
        }
    }

    pub fn total(&self) -> usize {
        self.ok + self.failed
    }
}

/// Counters for one run, created fresh by every `run_once` call.
///
/// `attempted`, `succeeded` and `failed` count per-item sub-pipeline
/// invocations; `succeeded + failed == attempted` holds after every item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Items that ended up published or saved as a draft.
    pub processed: usize,
    pub scrape: StageTally,
    pub summarize: StageTally,
    pub publish: StageTally,
    /// Summarized fields replaced by placeholders because the source was empty too.
    pub summarize_fallbacks: usize,
}

impl RunStats {
    /// Mark the start of one item's sub-pipeline.
    pub fn begin_item(&mut self) {
        self.attempted += 1;
    }

    /// The item finished and its article was published or drafted.
    pub fn item_processed(&mut self) {
        self.succeeded += 1;
        self.processed += 1;
    }

    /// The item was skipped or failed somewhere in its sub-pipeline.
    pub fn item_failed(&mut self) {
        self.failed += 1;
    }

    /// Items that have started but not been settled as succeeded or failed.
    pub fn in_flight(&self) -> usize {
        self.attempted - self.succeeded - self.failed
    }
}
