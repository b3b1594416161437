// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Server error types.

use crate::oracle::OracleError;
use crate::wal::WalError;

/// Errors that can occur while wiring or running the server stages.
///
/// Inside a running stage these are fatal: the stage logs the error and
/// panics its thread so cluster coordination can fail the node over.
#[derive(Debug, thiserror::Error)]
pub enum TsoError {
    #[error("timestamp oracle: {0}")]
    Oracle(#[from] OracleError),

    #[error("commit log: {0}")]
    CommitLog(#[from] WalError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
