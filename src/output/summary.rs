//! End-of-run summary
//!
//! Counters collected by the coordinator during one run, and their
//! human-readable rendering for the command line.

use crate::state::RunState;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// What one run did
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Final lifecycle state (`Completed` or `Aborted`)
    pub state: RunState,

    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed: Duration,

    /// Categories in the index
    pub categories: usize,

    /// Listing pages fetched successfully
    pub listing_pages: usize,

    /// Categories ended early by a failed listing fetch or a pagination loop
    pub categories_cut_short: usize,

    /// Detail URLs produced by the walk
    pub discovered: usize,

    /// Detail URLs skipped because a previous run already stored them
    pub skipped_existing: usize,

    /// New records collected in this run
    pub collected: usize,

    /// Detail pages skipped after a fetch or parse failure
    pub failed: usize,

    /// Intermediate checkpoint flushes
    pub checkpoints: usize,

    /// Rows written by the terminal flush
    pub final_flush_rows: usize,

    /// Rows in the dataset when the run ended
    pub total_rows: usize,

    /// Whether the run stopped because of the item limit
    pub limit_reached: bool,
}

impl RunSummary {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            state: RunState::Running,
            started_at,
            finished_at: None,
            elapsed: Duration::ZERO,
            categories: 0,
            listing_pages: 0,
            categories_cut_short: 0,
            discovered: 0,
            skipped_existing: 0,
            collected: 0,
            failed: 0,
            checkpoints: 0,
            final_flush_rows: 0,
            total_rows: 0,
            limit_reached: false,
        }
    }

    /// Records the terminal state and timing
    pub fn finish(&mut self, state: RunState, finished_at: DateTime<Utc>, elapsed: Duration) {
        self.state = state;
        self.finished_at = Some(finished_at);
        self.elapsed = elapsed;
    }

    /// Renders the summary as plain text
    pub fn render(&self) -> String {
        let mut out = String::new();

        out.push_str("=== Harvest Summary ===\n\n");

        out.push_str("Run:\n");
        out.push_str(&format!("  State: {}\n", self.state));
        out.push_str(&format!("  Started: {}\n", self.started_at.to_rfc3339()));
        if let Some(finished) = self.finished_at {
            out.push_str(&format!("  Finished: {}\n", finished.to_rfc3339()));
        }
        out.push_str(&format!("  Elapsed: {:.2}s\n", self.elapsed.as_secs_f64()));
        if self.limit_reached {
            out.push_str("  Stopped at item limit\n");
        }
        out.push('\n');

        out.push_str("Walk:\n");
        out.push_str(&format!("  Categories: {}\n", self.categories));
        out.push_str(&format!("  Listing pages: {}\n", self.listing_pages));
        if self.categories_cut_short > 0 {
            out.push_str(&format!(
                "  Categories cut short: {}\n",
                self.categories_cut_short
            ));
        }
        out.push_str(&format!("  Detail URLs seen: {}\n", self.discovered));
        out.push('\n');

        out.push_str("Items:\n");
        out.push_str(&format!("  Collected: {}\n", self.collected));
        out.push_str(&format!("  Already stored: {}\n", self.skipped_existing));
        out.push_str(&format!("  Failed: {}\n", self.failed));
        out.push_str(&format!(
            "  Checkpoints: {} (+{} rows in final flush)\n",
            self.checkpoints, self.final_flush_rows
        ));
        out.push_str(&format!("  Rows in dataset: {}\n", self.total_rows));

        out
    }
}

/// Prints the summary to stdout
pub fn print_summary(summary: &RunSummary) {
    print!("{}", summary.render());
}
