//! Append-only durability log for [`MemoryStorage`](crate::MemoryStorage).
//!
//! The log is newline-delimited JSON. A single save is written as one record
//! object per line, a batch save as one JSON array of records per line:
//!
//! ```text
//! {"owner":"user1","handle":"e62e2446","original_url":"https://youtube.com","deleted":false}
//! [{"owner":"user1","handle":"c984d06a","original_url":"https://example.com","deleted":false}]
//! ```
//!
//! The log is only read once, when the backend starts. Soft deletes are never
//! written to it.

use linkstash_core::error::{Result, StorageError};
use linkstash_core::UrlRecord;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum LogError {
    #[error("line {line} is not a valid log entry: {source}")]
    Decode {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("log io failed: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LogError> for StorageError {
    fn from(value: LogError) -> Self {
        match value {
            LogError::Decode { .. } => StorageError::InvalidData(value.to_string()),
            LogError::Io(err) => StorageError::Io(err.to_string()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LogLine {
    Batch(Vec<UrlRecord>),
    Single(UrlRecord),
}

impl LogLine {
    fn into_records(self) -> Vec<UrlRecord> {
        match self {
            LogLine::Batch(records) => records,
            LogLine::Single(record) => vec![record],
        }
    }
}

/// Encodes a single save as one log line, newline included.
pub fn encode_record(record: &UrlRecord) -> serde_json::Result<Vec<u8>> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(line)
}

/// Encodes a batch save as one log line, newline included.
pub fn encode_batch(records: &[UrlRecord]) -> serde_json::Result<Vec<u8>> {
    let mut line = serde_json::to_vec(records)?;
    line.push(b'\n');
    Ok(line)
}

/// Decodes one log line (without its newline) into the records it holds.
pub fn decode_line(line: &str) -> serde_json::Result<Vec<UrlRecord>> {
    serde_json::from_str::<LogLine>(line).map(LogLine::into_records)
}

/// Handle on the log file. Appends are serialized.
#[derive(Debug)]
pub struct DurabilityLog {
    path: PathBuf,
    writer: Mutex<()>,
}

impl DurabilityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    /// Reads every record written so far, in write order.
    ///
    /// A missing or unreadable file yields no records. Reading stops at the
    /// first line that cannot be decoded; everything before it is kept.
    pub async fn replay(&self) -> Vec<UrlRecord> {
        let file = match File::open(&self.path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "durability log does not exist yet");
                return Vec::new();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cannot open durability log, starting empty");
                return Vec::new();
            }
        };

        let mut records = Vec::new();
        match Self::read_lines(file, &mut records).await {
            Ok(lines) => {
                info!(path = %self.path.display(), lines, records = records.len(), "replayed durability log");
            }
            Err(err) => {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    records = records.len(),
                    "stopped replaying durability log"
                );
            }
        }

        records
    }

    async fn read_lines(
        file: File,
        records: &mut Vec<UrlRecord>,
    ) -> std::result::Result<usize, LogError> {
        let mut lines = BufReader::new(file).lines();
        let mut line_no = 0;

        while let Some(line) = lines.next_line().await? {
            line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let decoded = decode_line(&line).map_err(|source| LogError::Decode {
                line: line_no,
                source,
            })?;
            records.extend(decoded);
        }

        Ok(line_no)
    }

    /// Takes the exclusive right to append. Holding the writer orders any
    /// in-memory change made meanwhile with its log line.
    pub async fn writer(&self) -> LogWriter<'_> {
        LogWriter {
            log: self,
            _guard: self.writer.lock().await,
        }
    }

    /// Appends one saved record.
    pub async fn append(&self, record: &UrlRecord) -> Result<()> {
        self.writer().await.append(record).await
    }

    /// Appends a batch of saved records as a single line.
    pub async fn append_batch(&self, records: &[UrlRecord]) -> Result<()> {
        self.writer().await.append_batch(records).await
    }
}

/// Exclusive append access to a [`DurabilityLog`].
pub struct LogWriter<'a> {
    log: &'a DurabilityLog,
    _guard: MutexGuard<'a, ()>,
}

impl LogWriter<'_> {
    pub async fn append(&mut self, record: &UrlRecord) -> Result<()> {
        let line = encode_record(record).map_err(|e| StorageError::InvalidData(e.to_string()))?;
        self.append_line(&line).await
    }

    pub async fn append_batch(&mut self, records: &[UrlRecord]) -> Result<()> {
        let line = encode_batch(records).map_err(|e| StorageError::InvalidData(e.to_string()))?;
        self.append_line(&line).await
    }

    async fn append_line(&mut self, line: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log.path)
            .await
            .map_err(LogError::from)?;
        file.write_all(line).await.map_err(LogError::from)?;
        file.flush().await.map_err(LogError::from)?;

        Ok(())
    }
}
