//! Append-only persistence for the raw trial log, with resume support.
//!
//! The raw log is a CSV file behind a stable header row. Every append is
//! flushed and synced before the driver moves to the next trial, so a crash
//! after row *k* loses at most the in-flight row *k+1*, never rows already
//! written. Resume works at whole-problem granularity: a problem counts as
//! complete only when its row count equals the configured number of starts;
//! anything less is rerun from scratch.

use crate::run::RunError;
use crate::run::record::RunRecord;
use std::collections::{BTreeSet, HashMap};
use std::fs::{self, File, OpenOptions};
use std::path::Path;

/// Open handle on the raw log. Acquired once per run invocation, written
/// sequentially, closed (and flushed) on drop on every exit path.
pub struct RunLog {
    writer: csv::Writer<File>,
    /// Second handle on the same file, used to fsync after each append.
    sync_handle: File,
}

impl RunLog {
    /// Create (or truncate) the raw log and write the schema header.
    pub fn create(path: &Path) -> Result<Self, RunError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let sync_handle = file.try_clone()?;
        Ok(Self {
            writer: csv::WriterBuilder::new().has_headers(true).from_writer(file),
            sync_handle,
        })
    }

    /// Open the raw log for appending, writing the schema header only when
    /// the file is new or empty.
    pub fn append_to(path: &Path) -> Result<Self, RunError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let needs_header = file.metadata()?.len() == 0;
        let sync_handle = file.try_clone()?;
        Ok(Self {
            writer: csv::WriterBuilder::new()
                .has_headers(needs_header)
                .from_writer(file),
            sync_handle,
        })
    }

    /// Append one record and force it to durable storage before returning.
    pub fn append(&mut self, record: &RunRecord) -> Result<(), RunError> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        self.sync_handle.sync_data()?;
        Ok(())
    }
}

/// Read the whole raw log. A missing file is the typed
/// [`RunError::MissingRawLog`] so the binary can exit distinctly.
pub fn read_all(path: &Path) -> Result<Vec<RunRecord>, RunError> {
    if !path.exists() {
        return Err(RunError::MissingRawLog {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}

/// Problems whose persisted row count equals `rows_per_problem`. Partial
/// problem logs are never treated as complete.
pub fn completed_problems(records: &[RunRecord], rows_per_problem: usize) -> BTreeSet<u32> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    for record in records {
        *counts.entry(record.problem_id).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .filter(|&(_, count)| count == rows_per_problem)
        .map(|(id, _)| id)
        .collect()
}

/// Rewrite the raw log to exactly the given records (header included).
/// Used on resume to prune stale rows of problems that will be rerun.
pub fn rewrite(path: &Path, records: &[RunRecord]) -> Result<(), RunError> {
    let mut log = RunLog::create(path)?;
    for record in records {
        log.writer.serialize(record)?;
    }
    log.writer.flush()?;
    log.sync_handle.sync_data()?;
    Ok(())
}
