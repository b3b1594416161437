// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! In-memory timestamp storage.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::types::Timestamp;

use super::error::OracleError;
use super::storage::TimestampStorage;

/// Volatile ceiling storage for embedded use and tests.
///
/// Offers the oracle's interface without durability. The store can be marked
/// unavailable to exercise the allocation-failure paths of the stages above.
pub struct InMemoryTimestampStorage {
    ceiling: AtomicU64,
    unavailable: AtomicBool,
    stores: AtomicU64,
}

impl InMemoryTimestampStorage {
    /// Creates a store holding the given initial ceiling.
    pub fn new(initial: Timestamp) -> Self {
        Self {
            ceiling: AtomicU64::new(initial),
            unavailable: AtomicBool::new(false),
            stores: AtomicU64::new(0),
        }
    }

    /// Marks the store unavailable; subsequent `store_ceiling` calls fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::Release);
    }

    /// Number of successful `store_ceiling` calls so far.
    pub fn store_count(&self) -> u64 {
        self.stores.load(Ordering::Acquire)
    }

    /// Current ceiling value.
    pub fn ceiling(&self) -> Timestamp {
        self.ceiling.load(Ordering::Acquire)
    }
}

impl TimestampStorage for InMemoryTimestampStorage {
    fn load_ceiling(&self) -> Result<Timestamp, OracleError> {
        Ok(self.ceiling.load(Ordering::Acquire))
    }

    fn store_ceiling(&self, ceiling: Timestamp) -> Result<(), OracleError> {
        if self.unavailable.load(Ordering::Acquire) {
            return Err(OracleError::StorageUnavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        self.ceiling.store(ceiling, Ordering::Release);
        self.stores.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
