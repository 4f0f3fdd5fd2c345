//! Output module for reporting run results
//!
//! The dataset itself is written by the storage module; this module only
//! reports on what a run did.

mod summary;

pub use summary::{print_summary, RunSummary};
