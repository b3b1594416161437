// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! File-backed timestamp storage.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::PathBuf;

use crate::types::Timestamp;

use super::error::OracleError;
use super::storage::TimestampStorage;

/// Ceiling storage backed by a single file on the local filesystem.
///
/// The ceiling is stored as one big-endian 64-bit integer, the same record
/// layout a coordination-service node would carry. Updates go through a
/// temporary file followed by an atomic rename, so a crash mid-write leaves
/// either the old or the new ceiling, never a torn one.
pub struct FileTimestampStorage {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl FileTimestampStorage {
    /// Opens ceiling storage at the given path. The file need not exist yet;
    /// a missing file reads as ceiling 0.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut tmp_path = path.clone();
        tmp_path.set_extension("tmp");
        Self { path, tmp_path }
    }

    /// Returns the path of the ceiling file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl TimestampStorage for FileTimestampStorage {
    fn load_ceiling(&self) -> Result<Timestamp, OracleError> {
        let mut file = match File::open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        let mut buf = Vec::with_capacity(8);
        file.read_to_end(&mut buf)?;
        let bytes: [u8; 8] = buf
            .as_slice()
            .try_into()
            .map_err(|_| OracleError::CorruptCeiling(buf.len()))?;

        Ok(u64::from_be_bytes(bytes))
    }

    fn store_ceiling(&self, ceiling: Timestamp) -> Result<(), OracleError> {
        let mut tmp = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.tmp_path)?;
        tmp.write_all(&ceiling.to_be_bytes())?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&self.tmp_path, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_reads_zero() {
        let dir = TempDir::new().unwrap();
        let store = FileTimestampStorage::open(dir.path().join("ceiling"));
        assert_eq!(store.load_ceiling().unwrap(), 0);
    }

    #[test]
    fn test_store_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ceiling");

        let store = FileTimestampStorage::open(&path);
        store.store_ceiling(1_000_000).unwrap();
        assert_eq!(store.load_ceiling().unwrap(), 1_000_000);

        // A fresh handle over the same file sees the persisted value.
        let reopened = FileTimestampStorage::open(&path);
        assert_eq!(reopened.load_ceiling().unwrap(), 1_000_000);
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let dir = TempDir::new().unwrap();
        let store = FileTimestampStorage::open(dir.path().join("ceiling"));

        store.store_ceiling(10).unwrap();
        store.store_ceiling(20).unwrap();
        assert_eq!(store.load_ceiling().unwrap(), 20);
    }

    #[test]
    fn test_corrupt_file_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ceiling");
        fs::write(&path, b"short").unwrap();

        let store = FileTimestampStorage::open(&path);
        assert!(matches!(
            store.load_ceiling(),
            Err(OracleError::CorruptCeiling(5))
        ));
    }
}
