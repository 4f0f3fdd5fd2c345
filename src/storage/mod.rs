//! Storage module for persisting harvested records
//!
//! This module owns the output dataset, including:
//! - The fixed CSV column set shared with downstream readers
//! - Item record types and the two-decimal `Price` amount
//! - The checkpoint store: dedup keys, id assignment, batched flushes
//! - Resume reconciliation against an existing dataset

mod checkpoint;
mod error;
mod record;
mod schema;

pub use checkpoint::{read_records, CheckpointStore};
pub use error::CheckpointError;
pub use record::{InvalidPrice, ItemDetails, ItemRecord, Price};
pub use schema::{check_header, COLUMNS, MAX_RATING};
