// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Persistence stage.
//!
//! A single consumer thread drains decisions from the persistence ring,
//! appends them to the commit log in batches, issues one durability barrier
//! per batch, and only then releases the buffered replies to their clients.
//! A commit is never visible to a client before it is durable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::ring::{RingBuffer, RingConsumer, WaitStrategy};
use crate::types::Timestamp;
use crate::wal::{CommitLog, LogRecord};

use super::error::TsoError;
use super::event::{PersistEvent, PersistKind};
use super::metrics::TsoMetrics;
use super::reply::{ClientHandle, Reply};

/// Producer side of the persistence stage; called by the request stage only.
#[derive(Clone)]
pub struct PersistHandle {
    ring: Arc<RingBuffer<PersistEvent>>,
}

impl PersistHandle {
    pub(crate) fn new(ring: Arc<RingBuffer<PersistEvent>>) -> Self {
        Self { ring }
    }

    pub fn persist_timestamp(&self, ts: Timestamp, client: Option<ClientHandle>) {
        self.ring.publish(|event| event.set_timestamp(ts, client));
    }

    pub fn persist_commit(
        &self,
        start_ts: Timestamp,
        commit_ts: Timestamp,
        client: Option<ClientHandle>,
    ) {
        self.ring
            .publish(|event| event.set_commit(start_ts, commit_ts, client));
    }

    pub fn persist_abort(
        &self,
        start_ts: Timestamp,
        is_retry: bool,
        client: Option<ClientHandle>,
    ) {
        self.ring
            .publish(|event| event.set_abort(start_ts, is_retry, client));
    }

    pub fn persist_low_watermark(&self, lw: Timestamp) {
        self.ring.publish(|event| event.set_low_watermark(lw));
    }
}

/// Batch state owned by the persistence thread.
struct BatchState<L: CommitLog> {
    log: L,
    batch_size: usize,
    batch_timeout: Duration,
    pending: Vec<(Option<ClientHandle>, Reply)>,
    batch_lw: Option<Timestamp>,
    buffered: usize,
    batch_started: Option<Instant>,
    metrics: Arc<TsoMetrics>,
}

impl<L: CommitLog> BatchState<L> {
    /// Appends the event's log record and stashes its reply. Low-watermark
    /// events are coalesced: only the batch maximum is written, at flush.
    fn buffer_event(&mut self, event: &mut PersistEvent) -> Result<(), TsoError> {
        match event.kind() {
            PersistKind::Timestamp => {
                let ts = event.ts();
                self.log.append(&LogRecord::Timestamp { ts })?;
                self.pending.push((event.take_client(), Reply::Timestamp { ts }));
            }
            PersistKind::Commit => {
                let start_ts = event.start_ts();
                let commit_ts = event.commit_ts();
                self.log.append(&LogRecord::Commit {
                    start_ts,
                    commit_ts,
                })?;
                self.pending.push((
                    event.take_client(),
                    Reply::Commit {
                        start_ts,
                        commit_ts,
                    },
                ));
            }
            PersistKind::Abort => {
                let start_ts = event.start_ts();
                let is_retry = event.is_retry();
                self.log.append(&LogRecord::Abort { start_ts, is_retry })?;
                self.pending.push((
                    event.take_client(),
                    Reply::Abort { start_ts, is_retry },
                ));
            }
            PersistKind::LowWatermark => {
                let lw = event.low_watermark();
                self.batch_lw = Some(self.batch_lw.map_or(lw, |cur| cur.max(lw)));
            }
        }

        if self.buffered == 0 {
            self.batch_started = Some(Instant::now());
        }
        self.buffered += 1;
        Ok(())
    }

    fn deadline_passed(&self) -> bool {
        self.batch_started
            .is_some_and(|started| started.elapsed() >= self.batch_timeout)
    }

    /// Durability barrier followed by reply release. Replies are emitted in
    /// the order their events entered the ring, so per-client issue order is
    /// preserved.
    fn flush(&mut self) -> Result<(), TsoError> {
        if self.buffered == 0 {
            return Ok(());
        }

        if let Some(lw) = self.batch_lw.take() {
            self.log.append(&LogRecord::LowWatermark { lw })?;
        }
        let barrier_start = Instant::now();
        self.log.sync()?;
        self.metrics
            .record_persist_batch(self.buffered as u64, barrier_start.elapsed().as_nanos() as u64);

        for (client, reply) in self.pending.drain(..) {
            if let Some(client) = client {
                if !client.send_reply(reply) {
                    self.metrics.record_dropped_reply();
                    debug!("client channel closed; dropping reply");
                }
            }
        }

        self.buffered = 0;
        self.batch_started = None;
        Ok(())
    }
}

/// The persistence stage: a ring consumer plus the batch state.
pub struct PersistenceProcessor<L: CommitLog> {
    consumer: RingConsumer<PersistEvent>,
    state: BatchState<L>,
    wait: WaitStrategy,
    shutdown: Arc<AtomicBool>,
}

impl<L: CommitLog> PersistenceProcessor<L> {
    pub(crate) fn new(
        consumer: RingConsumer<PersistEvent>,
        log: L,
        batch_size: usize,
        batch_timeout: Duration,
        metrics: Arc<TsoMetrics>,
        wait: WaitStrategy,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self {
            consumer,
            state: BatchState {
                log,
                batch_size,
                batch_timeout,
                pending: Vec::with_capacity(batch_size),
                batch_lw: None,
                buffered: 0,
                batch_started: None,
                metrics,
            },
            wait,
            shutdown,
        }
    }

    /// Consumes decisions until shutdown is signalled and everything
    /// buffered has been made durable.
    ///
    /// The shutdown flag must only be raised after the request stage has
    /// stopped producing; the final empty drain then proves the ring is
    /// fully consumed.
    pub(crate) fn run(self) -> Result<(), TsoError> {
        let PersistenceProcessor {
            mut consumer,
            mut state,
            wait,
            shutdown,
        } = self;

        loop {
            if state.buffered >= state.batch_size {
                state.flush()?;
            }

            let room = state.batch_size - state.buffered;
            let mut fatal: Option<TsoError> = None;
            let drained = consumer.drain(room, |event| {
                if fatal.is_none() {
                    if let Err(err) = state.buffer_event(event) {
                        fatal = Some(err);
                    }
                }
            });
            if let Some(err) = fatal {
                return Err(err);
            }

            if drained == 0 {
                if shutdown.load(Ordering::Acquire) {
                    state.flush()?;
                    return Ok(());
                }
                if state.buffered > 0 && state.deadline_passed() {
                    state.flush()?;
                } else {
                    wait.idle();
                }
            }
        }
    }
}
