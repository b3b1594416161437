// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Error types for the commit log.

/// Errors that can occur while appending to or replaying the commit log.
#[derive(Debug, thiserror::Error)]
pub enum WalError {
    #[error("commit log I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt commit log record: {0}")]
    Corruption(String),
}
