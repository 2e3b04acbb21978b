//! Append-only JSON-lines data file.
//!
//! Each sample becomes one line. A batch is encoded in full before anything
//! touches the file and is written with a single `write_all`, so a failed
//! write can be rolled back to the end of the previous batch.

use crate::source::{QuantityType, Sample, Unit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::error;

/// MIME type of the data file.
pub const CONTENT_TYPE: &str = "application/x-ndjson";

/// File extension of the data file.
pub const FILE_EXTENSION: &str = "jsonl";

/// One persisted sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub quantity_type: QuantityType,
    pub value: f64,
    pub unit: Unit,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl SampleRecord {
    pub fn from_sample(quantity_type: QuantityType, sample: &Sample) -> Self {
        Self {
            quantity_type,
            value: sample.value,
            unit: sample.unit,
            start_date: sample.start,
            end_date: sample.end,
            source: sample.source.clone(),
        }
    }
}

/// Writer for one recorder data file.
#[derive(Debug)]
pub struct DataFileWriter {
    path: PathBuf,
    file: File,
    /// Length of the file after the last fully written batch.
    committed_len: u64,
    records: u64,
}

impl DataFileWriter {
    /// Create a new data file. Fails if the file already exists.
    pub fn create(path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&path)?;
        Ok(Self::from_file(path, file))
    }

    pub(crate) fn from_file(path: PathBuf, file: File) -> Self {
        Self {
            path,
            file,
            committed_len: 0,
            records: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Send further writes to `file`, keeping the committed length.
    #[cfg(test)]
    pub(crate) fn redirect(&mut self, file: File) {
        self.file = file;
    }

    /// Number of records written so far.
    pub fn record_count(&self) -> u64 {
        self.records
    }

    /// Append a batch of records, all or nothing.
    pub fn append_batch(&mut self, records: &[SampleRecord]) -> std::io::Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::with_capacity(records.len() * 160);
        for record in records {
            serde_json::to_writer(&mut buf, record).map_err(std::io::Error::other)?;
            buf.push(b'\n');
        }

        if let Err(e) = self.file.write_all(&buf).and_then(|()| self.file.flush()) {
            // Drop whatever part of the batch reached the file.
            if let Err(rollback) = self.file.set_len(self.committed_len) {
                error!(
                    path = %self.path.display(),
                    committed_len = self.committed_len,
                    "rollback after failed write failed: {rollback}"
                );
                return Err(std::io::Error::new(
                    e.kind(),
                    format!(
                        "{e}; rollback to byte {} failed: {rollback}",
                        self.committed_len
                    ),
                ));
            }
            return Err(e);
        }

        self.committed_len += buf.len() as u64;
        self.records += records.len() as u64;
        Ok(())
    }

    /// Flush to durable storage and close the file.
    pub fn close(mut self) -> std::io::Result<PathBuf> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(self.path)
    }
}

/// Errors reading a data file back.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed record on line {line}: {source}")]
    Malformed {
        line: usize,
        source: serde_json::Error,
    },
}

/// Read every record of a data file in file order.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<SampleRecord>, ReadError> {
    let path = path.as_ref();
    let io_err = |source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    };

    let reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_err)?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| ReadError::Malformed {
            line: index + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}
