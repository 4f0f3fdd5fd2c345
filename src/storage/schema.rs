//! Output dataset schema
//!
//! The column set and its order are part of the contract with downstream
//! readers of the CSV file. Changing them makes every existing dataset
//! unresumable, which `check_header` reports as a `SchemaMismatch`.

use crate::storage::CheckpointError;
use std::path::Path;

/// Column names in file order
pub const COLUMNS: [&str; 8] = [
    "id",
    "title",
    "price",
    "rating",
    "availability",
    "category",
    "image_url",
    "detail_url",
];

/// Highest value the `rating` column may hold
pub const MAX_RATING: u8 = 5;

/// Verifies that an existing file's header is exactly `COLUMNS`
pub fn check_header(path: &Path, header: &csv::StringRecord) -> Result<(), CheckpointError> {
    let matches = header.len() == COLUMNS.len()
        && header.iter().zip(COLUMNS.iter()).all(|(found, expected)| found == *expected);

    if matches {
        Ok(())
    } else {
        Err(CheckpointError::SchemaMismatch {
            path: path.to_path_buf(),
            expected: COLUMNS.join(","),
            found: header.iter().collect::<Vec<_>>().join(","),
        })
    }
}
