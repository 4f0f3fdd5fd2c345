//! Checkpoint store error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while opening, reconciling, or flushing the output dataset
///
/// Any of these at start-up is fatal: an existing dataset that cannot be
/// trusted is never coerced into shape.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} has columns [{found}], expected [{expected}]", .path.display())]
    SchemaMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("Corrupt row at {}:{line}: {source}", .path.display())]
    CorruptRow {
        path: PathBuf,
        line: u64,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid row at {}:{line}: {reason}", .path.display())]
    InvalidRow {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("CSV error on {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl CheckpointError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &std::path::Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}
