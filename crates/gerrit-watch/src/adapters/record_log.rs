//! Append-only NDJSON record of every event the watcher delivered.
//!
//! The file is replayed once at startup so the table is warm before the live
//! stream catches up. Lines that fail to decode or parse are skipped.

use std::path::PathBuf;

use serde_json::Value;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Split};
use tracing::{debug, warn};

use crate::domain::{EventRecord, RecordLogError};

/// Record file handle. The write side is opened lazily on first append.
#[derive(Debug)]
pub struct RecordLog {
    path: PathBuf,
    writer: Option<File>,
}

impl RecordLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    /// Open the file for replay. A missing file replays as empty.
    pub async fn replay(&self) -> Result<Replay, RecordLogError> {
        let lines = match File::open(&self.path).await {
            Ok(file) => Some(BufReader::new(file).split(b'\n')),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(source) => {
                return Err(RecordLogError::Open {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        Ok(Replay {
            path: self.path.clone(),
            lines,
            line_no: 0,
            skipped: 0,
        })
    }

    /// Append one event as a single compact JSON line.
    pub async fn append(&mut self, event: &Value) -> Result<(), RecordLogError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let result = match self.writer.as_mut() {
            Some(file) => write_line(file, &line).await,
            None => {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await
                    .map_err(|source| RecordLogError::Open {
                        path: self.path.clone(),
                        source,
                    })?;
                let written = write_line(&mut file, &line).await;
                self.writer = Some(file);
                written
            }
        };

        result.map_err(|source| {
            // Reopen on the next append.
            self.writer = None;
            RecordLogError::Write {
                path: self.path.clone(),
                source,
            }
        })
    }
}

async fn write_line(file: &mut File, line: &str) -> std::io::Result<()> {
    file.write_all(line.as_bytes()).await?;
    file.flush().await
}

/// Streaming reader over a record file.
#[derive(Debug)]
pub struct Replay {
    path: PathBuf,
    lines: Option<Split<BufReader<File>>>,
    line_no: usize,
    skipped: usize,
}

impl Replay {
    /// Next valid record, or `None` at end of file.
    ///
    /// Lines that are not UTF-8 are skipped like any other bad line. An I/O
    /// error ends the replay early; it is logged, not returned.
    pub async fn next_record(&mut self) -> Option<EventRecord> {
        loop {
            let raw = match self.lines.as_mut()?.next_segment().await {
                Ok(Some(raw)) => raw,
                Ok(None) => return None,
                Err(source) => {
                    let err = RecordLogError::Read {
                        path: self.path.clone(),
                        source,
                    };
                    warn!(error = %err, "Replay cut short");
                    self.lines = None;
                    return None;
                }
            };
            self.line_no += 1;
            let line = match String::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    self.skipped += 1;
                    debug!(line = self.line_no, error = %e, "Skipping undecodable record line");
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match EventRecord::from_line(&line) {
                Ok(record) => return Some(record),
                Err(e) => {
                    self.skipped += 1;
                    debug!(line = self.line_no, error = %e, "Skipping record line");
                }
            }
        }
    }

    /// Lines rejected so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
