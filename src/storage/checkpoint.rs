//! CSV checkpoint store
//!
//! Wraps the output dataset as a resumable, append-only sink. Records are
//! buffered in memory and written in whole-row batches by `flush`, so a
//! reader opening the file between flushes always sees a valid prefix of
//! the final dataset.

use crate::storage::record::{ItemDetails, ItemRecord};
use crate::storage::schema::{check_header, COLUMNS, MAX_RATING};
use crate::storage::CheckpointError;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

/// Resumable sink over the output CSV file
///
/// Owns the dedup key set (detail URLs) and the running `id` counter for one
/// run. Concurrent runs against the same file are not supported; nothing
/// here locks the file.
#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    keys: HashSet<String>,
    pending: Vec<ItemRecord>,
    next_id: u64,
    persisted: usize,
}

impl CheckpointStore {
    /// Opens the store at `path`
    ///
    /// With `resume` and an existing non-empty file, the file is validated
    /// and its keys and highest id are loaded. Otherwise the file is
    /// truncated (or created) and holds only the header.
    ///
    /// # Returns
    ///
    /// * `Ok(CheckpointStore)` - Store ready for appends
    /// * `Err(CheckpointError)` - Existing file unreadable or incompatible
    pub fn open(path: &Path, resume: bool) -> Result<Self, CheckpointError> {
        let existing = if resume { load_for_resume(path)? } else { None };
        if let Some(records) = existing {
            let next_id = records.last().map_or(1, |r| r.id + 1);
            let keys: HashSet<String> = records.into_iter().map(|r| r.detail_url).collect();

            tracing::info!(
                "Resume: loaded {} existing records from {} (next id {})",
                keys.len(),
                path.display(),
                next_id
            );

            return Ok(Self {
                path: path.to_path_buf(),
                persisted: keys.len(),
                keys,
                pending: Vec::new(),
                next_id,
            });
        }

        if resume {
            tracing::info!(
                "Resume requested but {} has no records yet, starting empty",
                path.display()
            );
        }

        create_with_header(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            keys: HashSet::new(),
            pending: Vec::new(),
            next_id: 1,
            persisted: 0,
        })
    }

    /// Returns true if `detail_url` is already persisted or buffered
    pub fn contains(&self, detail_url: &str) -> bool {
        self.keys.contains(detail_url)
    }

    /// Buffers a record and assigns it the next id
    ///
    /// Returns the assigned id, or `None` if the detail URL is already
    /// known. Nothing reaches the file until `flush`.
    pub fn append(&mut self, details: ItemDetails) -> Option<u64> {
        if !self.keys.insert(details.detail_url.clone()) {
            tracing::debug!("Ignoring duplicate record for {}", details.detail_url);
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.pending.push(ItemRecord::from_details(id, details));
        Some(id)
    }

    /// Durably writes all buffered records in append order
    ///
    /// Rows are serialized into one buffer and appended with a single write
    /// followed by a sync. Returns the number of rows written; calling with
    /// nothing buffered is a no-op returning 0. On error the file is cut back
    /// to its previous length and the buffer is kept, so a later flush can
    /// retry without tearing or duplicating rows.
    pub fn flush(&mut self) -> Result<usize, CheckpointError> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for record in &self.pending {
            writer
                .serialize(record)
                .map_err(|e| CheckpointError::csv(&self.path, e))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| CheckpointError::io(&self.path, e.into_error()))?;

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| CheckpointError::io(&self.path, e))?;
        append_batch(&mut file, &bytes).map_err(|e| CheckpointError::io(&self.path, e))?;

        let written = self.pending.len();
        self.persisted += written;
        self.pending.clear();

        tracing::debug!(
            "Checkpoint: wrote {} rows to {} ({} total)",
            written,
            self.path.display(),
            self.persisted
        );

        Ok(written)
    }

    /// The id the next appended record will receive
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Records buffered but not yet flushed
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Records already on disk
    pub fn persisted_len(&self) -> usize {
        self.persisted
    }

    /// Total records known to the store (persisted and buffered)
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads and validates every record of an existing dataset
///
/// Enforces the header, row shape, rating range, strictly increasing ids,
/// and unique detail URLs.
pub fn read_records(path: &Path) -> Result<Vec<ItemRecord>, CheckpointError> {
    let file = File::open(path).map_err(|e| CheckpointError::io(path, e))?;
    parse_records(path, file)
}

fn parse_records<R: Read>(path: &Path, source: R) -> Result<Vec<ItemRecord>, CheckpointError> {
    let mut reader = csv::Reader::from_reader(source);
    let header = reader
        .headers()
        .map_err(|e| CheckpointError::csv(path, e))?
        .clone();
    check_header(path, &header)?;

    let mut records: Vec<ItemRecord> = Vec::new();
    let mut seen = HashSet::new();

    for (index, row) in reader.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let row = row.map_err(|source| CheckpointError::CorruptRow {
            path: path.to_path_buf(),
            line: fallback_line,
            source,
        })?;
        let line = row.position().map_or(fallback_line, |p| p.line());

        let record: ItemRecord =
            row.deserialize(Some(&header))
                .map_err(|source| CheckpointError::CorruptRow {
                    path: path.to_path_buf(),
                    line,
                    source,
                })?;

        let invalid = |reason: String| CheckpointError::InvalidRow {
            path: path.to_path_buf(),
            line,
            reason,
        };

        if record.rating > MAX_RATING {
            return Err(invalid(format!("rating {} out of range", record.rating)));
        }
        let previous = records.last().map_or(0, |r| r.id);
        if record.id <= previous {
            return Err(invalid(format!(
                "id {} does not increase on previous id {}",
                record.id, previous
            )));
        }
        if !seen.insert(record.detail_url.clone()) {
            return Err(invalid(format!("duplicate detail_url {}", record.detail_url)));
        }

        records.push(record);
    }

    Ok(records)
}

/// Reads an existing dataset for resume
///
/// Returns `None` when there is nothing to resume: no file, an empty file,
/// or a header cut off while the file was being created. A file that does
/// not end in a newline was torn mid-write; once the complete rows before
/// the tear validate, the partial row is truncated away. A file that fails
/// validation is never modified.
fn load_for_resume(path: &Path) -> Result<Option<Vec<ItemRecord>>, CheckpointError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CheckpointError::io(path, e)),
    };

    let complete = bytes
        .iter()
        .rposition(|&b| b == b'\n')
        .map_or(0, |pos| pos + 1);

    if complete == 0 {
        if header_line().as_bytes().starts_with(&bytes) {
            return Ok(None);
        }
        // reports the foreign header
        return parse_records(path, bytes.as_slice()).map(Some);
    }

    let records = parse_records(path, &bytes[..complete])?;

    if complete < bytes.len() {
        tracing::warn!(
            "{} ends in a partial row ({} bytes after the last newline), truncating it before resuming",
            path.display(),
            bytes.len() - complete
        );
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| CheckpointError::io(path, e))?;
        file.set_len(complete as u64)
            .and_then(|_| file.sync_data())
            .map_err(|e| CheckpointError::io(path, e))?;
    }

    Ok(Some(records))
}

fn header_line() -> String {
    format!("{}\n", COLUMNS.join(","))
}

/// Append target for flushed batches
trait BatchSink: Write {
    fn end_offset(&self) -> io::Result<u64>;
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl BatchSink for File {
    fn end_offset(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Appends one serialized batch, all or nothing
///
/// If the write or the sync fails, the sink is cut back to where it ended
/// before the batch so it still ends on a row boundary.
fn append_batch<S: BatchSink>(sink: &mut S, bytes: &[u8]) -> io::Result<()> {
    let start = sink.end_offset()?;

    if let Err(e) = sink.write_all(bytes).and_then(|_| sink.sync()) {
        match sink.truncate_to(start).and_then(|_| sink.sync()) {
            Ok(()) => tracing::warn!("Rolled back partial batch to offset {}", start),
            Err(rollback) => tracing::error!(
                "Could not roll back partial batch to offset {}: {}",
                start,
                rollback
            ),
        }
        return Err(e);
    }

    Ok(())
}

fn create_with_header(path: &Path) -> Result<(), CheckpointError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CheckpointError::io(path, e))?;
    }

    let file = File::create(path).map_err(|e| CheckpointError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(file);
    writer
        .write_record(COLUMNS)
        .map_err(|e| CheckpointError::csv(path, e))?;
    let file = writer
        .into_inner()
        .map_err(|e| CheckpointError::io(path, e.into_error()))?;
    file.sync_data().map_err(|e| CheckpointError::io(path, e))
}
