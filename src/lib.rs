// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! CesiumTSO: a timestamp oracle and conflict-detection server providing
//! snapshot-isolation commit arbitration for a wide-column store.
//!
//! Clients open transactions by requesting a monotonically increasing start
//! timestamp, read at that snapshot against the underlying store, then ask
//! the server to commit a write-set. The server either assigns a commit
//! timestamp strictly greater than every previous commit, or aborts the
//! transaction because some cell it wrote was modified by a concurrent
//! committed transaction.

pub mod oracle;
pub mod ring;
pub mod tso;
pub mod types;
pub mod wal;

pub use oracle::{
    BatchedTimestampOracle, FileTimestampStorage, InMemoryTimestampStorage, OracleError,
    TimestampStorage,
};
pub use ring::{RingBuffer, RingConsumer, WaitStrategy};
pub use tso::{
    ClientHandle, CommitHashMap, MpscReplyChannel, Reply, ReplyChannel, RequestHandle,
    TimestampStoreKind, TsoConfig, TsoError, TsoMetrics, TsoServer,
};
pub use types::{RowFingerprint, Timestamp};
pub use wal::{CommitLog, FileCommitLog, LogRecord, LogRecovery, WalError};
