// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Timestamp oracle and conflict-detection server.
//!
//! The server is a staged pipeline of three cooperating parts, each owning
//! exactly one thread's worth of mutable state:
//!
//! - the **timestamp oracle** hands out strictly monotonic timestamps from
//!   durably reserved batches (co-located with the request stage);
//! - the **request stage** drains decoded client requests from a ring,
//!   decides commit/abort against the conflict map, and maintains the
//!   low-watermark;
//! - the **persistence stage** batches decisions into the commit log and
//!   releases replies only after the durability barrier.
//!
//! All hand-off between stages goes through bounded MPSC rings; network
//! worker threads produce into the request ring through [`RequestHandle`]
//! and never touch stage state directly.
//!
//! # Key Concepts
//!
//! ## Snapshot validation
//!
//! A transaction reads at its start timestamp and asks the server to commit
//! a set of row fingerprints. The server commits it at a fresh timestamp if
//! no fingerprint was committed at or after the transaction's snapshot;
//! otherwise the transaction aborts and the client retries.
//!
//! ## Low-watermark
//!
//! The conflict map is lossy: inserting over an occupied slot evicts the
//! previous entry and folds its timestamp into the low-watermark. Any
//! transaction whose snapshot is at or below the watermark can no longer be
//! validated and must abort.
//!
//! # Example
//!
//! ```no_run
//! use cesiumtso::tso::{MpscReplyChannel, TsoConfig, TsoServer};
//!
//! # fn main() -> Result<(), cesiumtso::tso::TsoError> {
//! let server = TsoServer::start(TsoConfig::new("/var/lib/tso"))?;
//! let handle = server.handle();
//!
//! let (client, replies) = MpscReplyChannel::new();
//! handle.timestamp_request(client);
//! println!("start timestamp: {:?}", replies.recv());
//! # Ok(())
//! # }
//! ```

mod config;
mod conflict;
mod error;
mod event;
mod metrics;
mod persist;
mod reply;
mod request;

pub use config::{TimestampStoreKind, TsoConfig};
pub use conflict::CommitHashMap;
pub use error::TsoError;
pub use metrics::TsoMetrics;
pub use reply::{ClientHandle, MpscReplyChannel, Reply, ReplyChannel};
pub use request::RequestHandle;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::{error, info};

use crate::oracle::{BatchedTimestampOracle, FileTimestampStorage, TimestampStorage};
use crate::ring::RingBuffer;
use crate::wal::FileCommitLog;

use persist::{PersistHandle, PersistenceProcessor};
use request::RequestProcessor;

/// A running TSO pipeline.
///
/// The stages and the oracle are constructed once from a [`TsoConfig`] and
/// wired through explicit ring references; there is no process-wide mutable
/// state beyond this value. Dropping the server drains both rings and joins
/// the stage threads.
pub struct TsoServer {
    handle: RequestHandle,
    metrics: Arc<TsoMetrics>,
    request_shutdown: Arc<AtomicBool>,
    persist_shutdown: Arc<AtomicBool>,
    request_thread: Option<JoinHandle<()>>,
    persist_thread: Option<JoinHandle<()>>,
}

impl TsoServer {
    /// Starts a server, selecting the ceiling backend named by
    /// `config.timestamp_store`.
    ///
    /// The coordination-service selection is served by the big-endian
    /// record under the data directory, which carries the same layout the
    /// service node would. The column-store selection has no local stand-in:
    /// that backend is owned by the column-store integration and must be
    /// handed in through [`TsoServer::start_with_storage`].
    pub fn start(config: TsoConfig) -> Result<Self, TsoError> {
        config.validate()?;
        config.ensure_dirs()?;
        match config.timestamp_store {
            TimestampStoreKind::Coordination => {
                let storage = FileTimestampStorage::open(config.ceiling_path());
                Self::start_with_storage(config, storage)
            }
            TimestampStoreKind::ColumnStore => Err(TsoError::InvalidConfig(
                "column-store ceiling storage must be supplied via start_with_storage"
                    .to_string(),
            )),
        }
    }

    /// Starts a server over a caller-provided ceiling storage backend
    /// (coordination service, column store, or in-memory for tests).
    pub fn start_with_storage<S>(config: TsoConfig, storage: S) -> Result<Self, TsoError>
    where
        S: TimestampStorage + 'static,
    {
        config.validate()?;
        config.ensure_dirs()?;

        let (recovery, log) = FileCommitLog::recover(config.commit_log_path())?;
        let oracle = BatchedTimestampOracle::new(storage, config.timestamp_batch_size)?;

        // The conflict map is empty after a restart, so nothing issued
        // before the last persisted ceiling can be validated: the initial
        // watermark must cover the pre-restart epoch as well as the highest
        // durable watermark in the log.
        let initial_lw = recovery.low_watermark.max(oracle.last());

        let metrics = Arc::new(TsoMetrics::new());
        let (request_ring, request_consumer) =
            RingBuffer::mpsc(config.request_ring_size, config.request_wait);
        let (persist_ring, persist_consumer) =
            RingBuffer::mpsc(config.persist_ring_size, config.persist_wait);

        let persist_handle = PersistHandle::new(persist_ring);
        persist_handle.persist_low_watermark(initial_lw);

        let request_shutdown = Arc::new(AtomicBool::new(false));
        let persist_shutdown = Arc::new(AtomicBool::new(false));

        let request_processor = RequestProcessor::new(
            request_consumer,
            oracle,
            CommitHashMap::new(config.max_items),
            initial_lw,
            persist_handle,
            Arc::clone(&metrics),
            config.request_wait,
            Arc::clone(&request_shutdown),
        );
        let persistence_processor = PersistenceProcessor::new(
            persist_consumer,
            log,
            config.persist_batch_size,
            config.persist_batch_timeout,
            Arc::clone(&metrics),
            config.persist_wait,
            Arc::clone(&persist_shutdown),
        );

        info!(
            port = config.port,
            interface = %config.network_interface,
            store = ?config.timestamp_store,
            max_items = config.max_items,
            low_watermark = initial_lw,
            "starting tso pipeline"
        );

        let persist_thread = std::thread::Builder::new()
            .name("tso-persist".to_string())
            .spawn(move || {
                if let Err(err) = persistence_processor.run() {
                    error!(%err, "persistence processor failed; terminating stage");
                    panic!("persistence processor failed: {err}");
                }
            })?;
        let request_thread = std::thread::Builder::new()
            .name("tso-request".to_string())
            .spawn(move || {
                if let Err(err) = request_processor.run() {
                    error!(%err, "request processor failed; terminating stage");
                    panic!("request processor failed: {err}");
                }
            })?;

        Ok(Self {
            handle: RequestHandle::new(request_ring, metrics.clone()),
            metrics,
            request_shutdown,
            persist_shutdown,
            request_thread: Some(request_thread),
            persist_thread: Some(persist_thread),
        })
    }

    /// Producer handle for the network front-end. Cheap to clone; one per
    /// worker thread.
    pub fn handle(&self) -> RequestHandle {
        self.handle.clone()
    }

    /// Shared pipeline metrics.
    pub fn metrics(&self) -> Arc<TsoMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Drains both rings and joins the stage threads. Every request already
    /// enqueued is decided and made durable before this returns.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // The request stage must stop producing before the persistence
        // stage is allowed to see an empty ring as final.
        self.request_shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.request_thread.take() {
            let _ = thread.join();
        }
        self.persist_shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.persist_thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for TsoServer {
    fn drop(&mut self) {
        self.stop();
    }
}
