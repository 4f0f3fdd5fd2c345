//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `RunState`: lifecycle of a single run (init, running, completed, aborted)
//! - `StopHandle`: cooperative cancellation checked between items

mod run_state;

// Re-export main types
pub use run_state::{RunState, StopHandle};
