// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Durable commit log.
//!
//! Every commit/abort decision and low-watermark advance is appended here
//! and made durable before the corresponding reply becomes visible to a
//! client. Records are length-prefixed, tagged by kind, and carry a CRC32
//! trailer; replay at startup scans forward, tolerates a torn final record,
//! and reconstructs the highest durable low-watermark.

mod error;
mod log;
mod record;

pub use error::WalError;
pub use log::{CommitLog, FileCommitLog, LogRecovery};
pub use record::LogRecord;
