// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Server metrics and observability.
//!
//! Lock-free atomic counters shared by all stages. Counters use
//! `Ordering::Relaxed`: they provide eventual consistency for observability,
//! not synchronization.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Atomic operation counters for the TSO pipeline.
#[derive(Debug)]
pub struct TsoMetrics {
    /// Timestamp requests received.
    pub timestamp_requests: AtomicU64,
    /// Commit requests received.
    pub commit_requests: AtomicU64,
    /// Commit decisions.
    pub commits: AtomicU64,
    /// Abort decisions.
    pub aborts: AtomicU64,
    /// Conflict map evictions (low-watermark folds).
    pub evictions: AtomicU64,
    /// Low-watermark advance events.
    pub lw_advances: AtomicU64,
    /// Durable ceiling bumps performed by the oracle.
    pub oracle_batch_persists: AtomicU64,
    /// Durability barriers issued by the persistence stage.
    pub persist_batches: AtomicU64,
    /// Records written by the persistence stage.
    pub persist_records: AtomicU64,
    /// Largest batch released by a single barrier.
    pub max_persist_batch: AtomicU64,
    /// Cumulative time spent inside durability barriers, in nanoseconds.
    pub persist_barrier_nanos: AtomicU64,
    /// Replies dropped because the client channel was closed.
    pub dropped_replies: AtomicU64,
    started: Instant,
}

impl TsoMetrics {
    /// Creates a metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self {
            timestamp_requests: AtomicU64::new(0),
            commit_requests: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            aborts: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            lw_advances: AtomicU64::new(0),
            oracle_batch_persists: AtomicU64::new(0),
            persist_batches: AtomicU64::new(0),
            persist_records: AtomicU64::new(0),
            max_persist_batch: AtomicU64::new(0),
            persist_barrier_nanos: AtomicU64::new(0),
            dropped_replies: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn record_timestamp_request(&self) {
        self.timestamp_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit_request(&self) {
        self.commit_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_abort(&self) {
        self.aborts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        if count > 0 {
            self.evictions.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn record_lw_advance(&self) {
        self.lw_advances.fetch_add(1, Ordering::Relaxed);
    }

    /// Publishes the oracle's cumulative ceiling-persist count.
    pub fn set_oracle_batch_persists(&self, count: u64) {
        self.oracle_batch_persists.store(count, Ordering::Relaxed);
    }

    /// Records one durability barrier releasing `records` log records after
    /// `barrier_nanos` spent waiting for durability.
    pub fn record_persist_batch(&self, records: u64, barrier_nanos: u64) {
        self.persist_batches.fetch_add(1, Ordering::Relaxed);
        self.persist_records.fetch_add(records, Ordering::Relaxed);
        self.max_persist_batch.fetch_max(records, Ordering::Relaxed);
        self.persist_barrier_nanos
            .fetch_add(barrier_nanos, Ordering::Relaxed);
    }

    pub fn record_dropped_reply(&self) {
        self.dropped_replies.fetch_add(1, Ordering::Relaxed);
    }

    /// Server uptime in seconds.
    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Formats the counters as a human-readable report.
    pub fn report(&self) -> String {
        format!(
            "═══ TSO Metrics ═══\n\
             Requests:\n\
               timestamps: {}\n\
               commits:    {}\n\
             Decisions:\n\
               committed:  {}\n\
               aborted:    {}\n\
             Conflict map:\n\
               evictions:   {}\n\
               lw advances: {}\n\
             Oracle:\n\
               batch persists: {}\n\
             Persistence:\n\
               barriers:    {}\n\
               records:     {}\n\
               max batch:   {}\n\
               avg barrier: {:.1} µs\n\
               dropped:     {}\n\
             Uptime: {:.2}s",
            self.timestamp_requests.load(Ordering::Relaxed),
            self.commit_requests.load(Ordering::Relaxed),
            self.commits.load(Ordering::Relaxed),
            self.aborts.load(Ordering::Relaxed),
            self.evictions.load(Ordering::Relaxed),
            self.lw_advances.load(Ordering::Relaxed),
            self.oracle_batch_persists.load(Ordering::Relaxed),
            self.persist_batches.load(Ordering::Relaxed),
            self.persist_records.load(Ordering::Relaxed),
            self.max_persist_batch.load(Ordering::Relaxed),
            self.avg_barrier_micros(),
            self.dropped_replies.load(Ordering::Relaxed),
            self.uptime_secs(),
        )
    }

    /// Mean durability barrier latency in microseconds.
    pub fn avg_barrier_micros(&self) -> f64 {
        let batches = self.persist_batches.load(Ordering::Relaxed);
        if batches == 0 {
            return 0.0;
        }
        self.persist_barrier_nanos.load(Ordering::Relaxed) as f64 / batches as f64 / 1000.0
    }
}

impl Default for TsoMetrics {
    fn default() -> Self {
        Self::new()
    }
}
