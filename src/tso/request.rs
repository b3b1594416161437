// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Request processing stage.
//!
//! A single consumer thread drains the request ring, obtains timestamps from
//! the oracle, and decides commit/abort against the conflict map. The map,
//! the low-watermark, and the oracle are owned by this thread alone, so the
//! decision path takes no locks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::error;

use crate::oracle::{BatchedTimestampOracle, TimestampStorage};
use crate::ring::{RingBuffer, RingConsumer, WaitStrategy};
use crate::types::{RowFingerprint, Timestamp};

use super::conflict::CommitHashMap;
use super::error::TsoError;
use super::event::{RequestEvent, RequestKind};
use super::metrics::TsoMetrics;
use super::persist::PersistHandle;
use super::reply::ClientHandle;

/// Events handled per drain before re-checking the shutdown flag.
const DRAIN_BATCH: usize = 128;

/// Producer side of the request stage, held by the network front-end.
///
/// Both operations park an event in the request ring and return; if the ring
/// is full they wait according to the ring's strategy, so backpressure
/// propagates to the callers instead of dropping requests.
#[derive(Clone)]
pub struct RequestHandle {
    ring: Arc<RingBuffer<RequestEvent>>,
    metrics: Arc<TsoMetrics>,
}

impl RequestHandle {
    pub(crate) fn new(ring: Arc<RingBuffer<RequestEvent>>, metrics: Arc<TsoMetrics>) -> Self {
        Self { ring, metrics }
    }

    /// Requests a fresh start timestamp for `client`.
    pub fn timestamp_request(&self, client: ClientHandle) {
        self.metrics.record_timestamp_request();
        self.ring
            .publish(|event| event.set_timestamp_request(client));
    }

    /// Requests validation and commit of a write-set.
    ///
    /// `rows` may be empty and may contain duplicates; duplicates are
    /// processed as-is.
    pub fn commit_request(
        &self,
        start_ts: Timestamp,
        rows: &[RowFingerprint],
        is_retry: bool,
        client: ClientHandle,
    ) {
        self.metrics.record_commit_request();
        self.ring
            .publish(|event| event.set_commit_request(start_ts, rows, is_retry, client));
    }
}

/// Decision state owned by the request thread.
struct RequestHandler<S: TimestampStorage> {
    oracle: BatchedTimestampOracle<S>,
    conflict_map: CommitHashMap,
    low_watermark: Timestamp,
    persist: PersistHandle,
    metrics: Arc<TsoMetrics>,
}

impl<S: TimestampStorage> RequestHandler<S> {
    fn handle_event(&mut self, event: &mut RequestEvent) -> Result<(), TsoError> {
        match event.kind() {
            RequestKind::Timestamp => {
                let client = event.take_client();
                self.handle_timestamp(client);
                Ok(())
            }
            RequestKind::Commit => {
                let client = event.take_client();
                self.handle_commit(event.start_ts(), event.rows(), event.is_retry(), client)
            }
        }
    }

    fn handle_timestamp(&mut self, client: Option<ClientHandle>) {
        match self.oracle.next() {
            Ok(ts) => self.persist.persist_timestamp(ts, client),
            Err(err) => {
                // The client will retry; no reply is emitted for this request.
                error!(%err, "dropping timestamp request: oracle allocation failed");
            }
        }
    }

    fn handle_commit(
        &mut self,
        start_ts: Timestamp,
        rows: &[RowFingerprint],
        is_retry: bool,
        client: Option<ClientHandle>,
    ) -> Result<(), TsoError> {
        // A snapshot at or below the low-watermark is older than the horizon
        // of remembered conflicts and cannot be validated.
        let mut committed = start_ts > self.low_watermark;

        if committed {
            for &row in rows {
                if let Some(last_commit) = self.conflict_map.latest_write_for_row(row) {
                    if last_commit >= start_ts {
                        committed = false;
                        break;
                    }
                }
            }
        }

        if !committed {
            self.metrics.record_abort();
            self.persist.persist_abort(start_ts, is_retry, client);
            return Ok(());
        }

        // The transaction has passed validation; an allocation failure
        // here is fatal.
        let commit_ts = self.oracle.next()?;

        if !rows.is_empty() {
            let mut new_lw = self.low_watermark;
            let mut evictions = 0;
            for &row in rows {
                if let Some(evicted) = self.conflict_map.record_write(row, commit_ts) {
                    new_lw = new_lw.max(evicted);
                    evictions += 1;
                }
            }
            self.metrics.record_evictions(evictions);
            if new_lw > self.low_watermark {
                self.low_watermark = new_lw;
                self.metrics.record_lw_advance();
                self.persist.persist_low_watermark(new_lw);
            }
        }

        self.metrics.record_commit();
        self.persist.persist_commit(start_ts, commit_ts, client);
        Ok(())
    }
}

/// The request stage: a ring consumer plus the decision state.
pub struct RequestProcessor<S: TimestampStorage> {
    consumer: RingConsumer<RequestEvent>,
    handler: RequestHandler<S>,
    wait: WaitStrategy,
    shutdown: Arc<AtomicBool>,
}

impl<S: TimestampStorage> RequestProcessor<S> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        consumer: RingConsumer<RequestEvent>,
        oracle: BatchedTimestampOracle<S>,
        conflict_map: CommitHashMap,
        initial_lw: Timestamp,
        persist: PersistHandle,
        metrics: Arc<TsoMetrics>,
        wait: WaitStrategy,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            consumer,
            handler: RequestHandler {
                oracle,
                conflict_map,
                low_watermark: initial_lw,
                persist,
                metrics,
            },
            wait,
            shutdown,
        }
    }

    /// Consumes requests until shutdown is signalled and the ring is empty.
    ///
    /// Returns an error only on a fatal condition; the caller panics the
    /// stage thread with it.
    pub(crate) fn run(self) -> Result<(), TsoError> {
        let RequestProcessor {
            mut consumer,
            mut handler,
            wait,
            shutdown,
        } = self;

        loop {
            let mut fatal: Option<TsoError> = None;
            let drained = consumer.drain(DRAIN_BATCH, |event| {
                if fatal.is_none() {
                    if let Err(err) = handler.handle_event(event) {
                        fatal = Some(err);
                    }
                }
            });
            if let Some(err) = fatal {
                return Err(err);
            }

            if drained == 0 {
                if shutdown.load(Ordering::Acquire) {
                    return Ok(());
                }
                wait.idle();
            } else {
                handler
                    .metrics
                    .set_oracle_batch_persists(handler.oracle.batch_persists());
            }
        }
    }
}
