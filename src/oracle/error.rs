// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Error types for the timestamp oracle.

/// Errors that can occur while allocating or persisting timestamps.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("timestamp storage I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("timestamp storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("corrupt ceiling record: expected 8 bytes, found {0}")]
    CorruptCeiling(usize),

    #[error("timestamp space exhausted")]
    Exhausted,
}
