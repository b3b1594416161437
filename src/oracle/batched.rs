// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Batched timestamp allocation.

use tracing::{debug, info};

use crate::types::Timestamp;

use super::error::OracleError;
use super::storage::TimestampStorage;

/// Strictly monotonic timestamp oracle with durable batch allocation.
///
/// The oracle keeps an in-memory counter `cur` and a durably persisted
/// `ceiling`. Values are handed out by incrementing `cur`; before `cur` gets
/// within `threshold` of the ceiling, a new ceiling of `cur + batch` is
/// persisted. On restart `cur` resumes from the persisted ceiling, so no
/// timestamp is ever issued twice even though up to one batch of values is
/// skipped.
///
/// `next()` is called from exactly one thread (the request stage); it may
/// block briefly on the backing store when it crosses a batch boundary.
pub struct BatchedTimestampOracle<S: TimestampStorage> {
    storage: S,
    cur: Timestamp,
    ceiling: Timestamp,
    batch: u64,
    threshold: u64,
    batch_persists: u64,
}

impl<S: TimestampStorage> BatchedTimestampOracle<S> {
    /// Creates an oracle over the given storage, reading the persisted
    /// ceiling as the starting point. `batch` is the number of timestamps
    /// reserved per ceiling bump.
    pub fn new(storage: S, batch: u64) -> Result<Self, OracleError> {
        let ceiling = storage.load_ceiling()?;
        let threshold = (batch / 10).max(1);
        info!(ceiling, batch, "timestamp oracle recovered allocation ceiling");

        Ok(Self {
            storage,
            cur: ceiling,
            ceiling,
            batch,
            threshold,
            batch_persists: 0,
        })
    }

    /// Returns a timestamp strictly greater than every previously returned
    /// value across all epochs. The first value after a fresh initialization
    /// (persisted ceiling 0) is 1.
    pub fn next(&mut self) -> Result<Timestamp, OracleError> {
        if self.cur.saturating_add(self.threshold) >= self.ceiling {
            let new_ceiling = self
                .cur
                .checked_add(self.batch)
                .ok_or(OracleError::Exhausted)?;
            self.storage.store_ceiling(new_ceiling)?;
            self.ceiling = new_ceiling;
            self.batch_persists += 1;
            debug!(ceiling = new_ceiling, "persisted new allocation ceiling");
        }

        self.cur += 1;
        Ok(self.cur)
    }

    /// The most recent timestamp returned by `next()`; after recovery this
    /// is the persisted ceiling, an upper bound on everything issued before
    /// the restart.
    pub fn last(&self) -> Timestamp {
        self.cur
    }

    /// Number of ceiling persists performed by this oracle instance.
    pub fn batch_persists(&self) -> u64 {
        self.batch_persists
    }
}
