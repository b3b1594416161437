// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Append-only commit log with an explicit durability barrier.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::types::Timestamp;

use super::error::WalError;
use super::record::LogRecord;

/// The durable decision log owned by the persistence stage.
///
/// `append` buffers a record into the OS; nothing is guaranteed durable
/// until `sync` returns. The persistence stage batches many appends behind
/// one barrier.
pub trait CommitLog: Send {
    /// Appends one record to the log.
    fn append(&mut self, record: &LogRecord) -> Result<(), WalError>;

    /// Durability barrier: returns once every previously appended record
    /// would survive a crash.
    fn sync(&mut self) -> Result<(), WalError>;
}

/// State reconstructed by replaying a commit log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogRecovery {
    /// Highest durable low-watermark, 0 if none was recorded.
    pub low_watermark: Timestamp,
    /// Number of intact records scanned.
    pub records: u64,
    /// Length of the intact prefix, in bytes.
    pub valid_bytes: u64,
}

/// File-backed commit log.
pub struct FileCommitLog {
    path: PathBuf,
    file: File,
    buf: Vec<u8>,
}

impl FileCommitLog {
    /// Opens the log for appending, creating it if missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WalError> {
        let path = path.into();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file,
            buf: Vec::with_capacity(4096),
        })
    }

    /// Returns the path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scans the log forward and reconstructs the recovered state.
    ///
    /// A missing file is an empty log. A torn or corrupt record ends the
    /// scan: everything before it is trusted, everything after is ignored
    /// (an interrupted final append is expected after a crash).
    pub fn replay(path: impl AsRef<Path>) -> Result<LogRecovery, WalError> {
        let path = path.as_ref();
        let mut bytes = Vec::new();
        match File::open(path) {
            Ok(mut file) => {
                file.read_to_end(&mut bytes)?;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LogRecovery::default());
            }
            Err(err) => return Err(err.into()),
        }

        let mut recovery = LogRecovery::default();
        let mut at = 0usize;
        while at < bytes.len() {
            let Some(record) = next_record(&bytes, &mut at) else {
                warn!(
                    path = %path.display(),
                    offset = at,
                    "torn record at commit log tail; ignoring remainder"
                );
                break;
            };
            if let LogRecord::LowWatermark { lw } = record {
                recovery.low_watermark = recovery.low_watermark.max(lw);
            }
            recovery.records += 1;
            recovery.valid_bytes = at as u64;
        }

        info!(
            path = %path.display(),
            records = recovery.records,
            low_watermark = recovery.low_watermark,
            "replayed commit log"
        );
        Ok(recovery)
    }

    /// Scans the log forward and returns every intact record in order.
    ///
    /// Stops at a torn or corrupt record, like `replay`. Useful for log
    /// inspection and recovery tooling; the server itself only needs the
    /// summarised [`LogRecovery`].
    pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<LogRecord>, WalError> {
        let mut bytes = Vec::new();
        match File::open(path.as_ref()) {
            Ok(mut file) => {
                file.read_to_end(&mut bytes)?;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        }

        let mut records = Vec::new();
        let mut at = 0usize;
        while at < bytes.len() {
            let Some(record) = next_record(&bytes, &mut at) else {
                break;
            };
            records.push(record);
        }
        Ok(records)
    }

    /// Replays the log, discards any torn tail, and reopens it for
    /// appending. New records land directly after the last intact one, so
    /// later replays see them.
    pub fn recover(path: impl Into<PathBuf>) -> Result<(LogRecovery, Self), WalError> {
        let path = path.into();
        let recovery = Self::replay(&path)?;

        match OpenOptions::new().write(true).open(&path) {
            Ok(file) => {
                file.set_len(recovery.valid_bytes)?;
                file.sync_all()?;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let log = Self::open(path)?;
        Ok((recovery, log))
    }
}

/// Parses one framed record at `*at`, advancing the offset. Returns `None`
/// on a torn or corrupt frame.
fn next_record(bytes: &[u8], at: &mut usize) -> Option<LogRecord> {
    let len_bytes = bytes.get(*at..*at + 4)?;
    let body_len = u32::from_le_bytes(len_bytes.try_into().ok()?) as usize;
    let body = bytes.get(*at + 4..*at + 4 + body_len)?;
    let crc_bytes = bytes.get(*at + 4 + body_len..*at + 8 + body_len)?;
    let crc = u32::from_le_bytes(crc_bytes.try_into().ok()?);

    if crc32fast::hash(body) != crc {
        return None;
    }
    let record = LogRecord::decode(body).ok()?;
    *at += 8 + body_len;
    Some(record)
}

impl CommitLog for FileCommitLog {
    fn append(&mut self, record: &LogRecord) -> Result<(), WalError> {
        self.buf.clear();
        record.encode(&mut self.buf);
        self.file.write_all(&self.buf)?;
        Ok(())
    }

    fn sync(&mut self) -> Result<(), WalError> {
        self.file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn append_all(log: &mut FileCommitLog, records: &[LogRecord]) {
        for record in records {
            log.append(record).unwrap();
        }
        log.sync().unwrap();
    }

    #[test]
    fn test_replay_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let recovery = FileCommitLog::replay(dir.path().join("commit.log")).unwrap();
        assert_eq!(recovery.low_watermark, 0);
        assert_eq!(recovery.records, 0);
    }

    #[test]
    fn test_replay_recovers_highest_low_watermark() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commit.log");

        let mut log = FileCommitLog::open(&path).unwrap();
        append_all(
            &mut log,
            &[
                LogRecord::Timestamp { ts: 1 },
                LogRecord::LowWatermark { lw: 5 },
                LogRecord::Commit {
                    start_ts: 2,
                    commit_ts: 6,
                },
                LogRecord::LowWatermark { lw: 9 },
                LogRecord::Abort {
                    start_ts: 3,
                    is_retry: false,
                },
            ],
        );
        drop(log);

        let recovery = FileCommitLog::replay(&path).unwrap();
        assert_eq!(recovery.low_watermark, 9);
        assert_eq!(recovery.records, 5);
    }

    #[test]
    fn test_replay_tolerates_torn_tail() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commit.log");

        let mut log = FileCommitLog::open(&path).unwrap();
        append_all(
            &mut log,
            &[
                LogRecord::LowWatermark { lw: 4 },
                LogRecord::Commit {
                    start_ts: 1,
                    commit_ts: 5,
                },
            ],
        );
        drop(log);

        // Chop the last record mid-frame.
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        let recovery = FileCommitLog::replay(&path).unwrap();
        assert_eq!(recovery.records, 1);
        assert_eq!(recovery.low_watermark, 4);
    }

    #[test]
    fn test_replay_stops_at_corrupt_record() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commit.log");

        let mut log = FileCommitLog::open(&path).unwrap();
        append_all(
            &mut log,
            &[
                LogRecord::LowWatermark { lw: 7 },
                LogRecord::LowWatermark { lw: 8 },
            ],
        );
        drop(log);

        // Flip a payload byte inside the second record.
        let mut bytes = std::fs::read(&path).unwrap();
        let second_payload = bytes.len() - 6;
        bytes[second_payload] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let recovery = FileCommitLog::replay(&path).unwrap();
        assert_eq!(recovery.records, 1);
        assert_eq!(recovery.low_watermark, 7);
    }

    #[test]
    fn test_read_records_returns_intact_prefix_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commit.log");
        let records = [
            LogRecord::Timestamp { ts: 1 },
            LogRecord::Commit {
                start_ts: 1,
                commit_ts: 2,
            },
            LogRecord::LowWatermark { lw: 2 },
        ];

        let mut log = FileCommitLog::open(&path).unwrap();
        append_all(&mut log, &records);
        drop(log);

        assert_eq!(FileCommitLog::read_records(&path).unwrap(), records);

        // A torn tail ends the scan at the last intact record.
        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 2]).unwrap();
        assert_eq!(FileCommitLog::read_records(&path).unwrap(), &records[..2]);
    }

    #[test]
    fn test_recover_truncates_torn_tail_before_appending() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commit.log");

        let mut log = FileCommitLog::open(&path).unwrap();
        append_all(&mut log, &[LogRecord::LowWatermark { lw: 4 }]);
        drop(log);

        // Leave half a frame behind, as a crash mid-append would.
        let mut bytes = std::fs::read(&path).unwrap();
        let intact = bytes.len();
        bytes.extend_from_slice(&[0x11, 0x00, 0x00, 0x00, 0x02]);
        std::fs::write(&path, &bytes).unwrap();

        let (recovery, mut log) = FileCommitLog::recover(&path).unwrap();
        assert_eq!(recovery.records, 1);
        assert_eq!(recovery.valid_bytes, intact as u64);

        append_all(&mut log, &[LogRecord::LowWatermark { lw: 12 }]);
        drop(log);

        // The record written after recovery is reachable by a later replay.
        let recovery = FileCommitLog::replay(&path).unwrap();
        assert_eq!(recovery.records, 2);
        assert_eq!(recovery.low_watermark, 12);
    }

    #[test]
    fn test_append_after_reopen_extends_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commit.log");

        let mut log = FileCommitLog::open(&path).unwrap();
        append_all(&mut log, &[LogRecord::LowWatermark { lw: 3 }]);
        drop(log);

        let mut log = FileCommitLog::open(&path).unwrap();
        append_all(&mut log, &[LogRecord::LowWatermark { lw: 11 }]);
        drop(log);

        let recovery = FileCommitLog::replay(&path).unwrap();
        assert_eq!(recovery.records, 2);
        assert_eq!(recovery.low_watermark, 11);
    }
}
