// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Timestamp storage trait definition.

use crate::types::Timestamp;

use super::error::OracleError;

/// Durable backing store for the oracle's allocation ceiling.
///
/// The backend holds a single 64-bit value: the highest timestamp the oracle
/// is allowed to hand out. Deployments back this with a coordination-service
/// node or a cell in the underlying column store; both live behind this
/// trait. The oracle calls `store_ceiling` before handing out any timestamp
/// above the previously stored value, so a crash can never revisit an
/// already-issued timestamp.
pub trait TimestampStorage: Send {
    /// Reads the persisted ceiling. Returns 0 when no ceiling has ever been
    /// stored (fresh cluster).
    fn load_ceiling(&self) -> Result<Timestamp, OracleError>;

    /// Durably replaces the ceiling. Must not return until the new value
    /// would survive a crash.
    fn store_ceiling(&self, ceiling: Timestamp) -> Result<(), OracleError>;
}

impl<S: TimestampStorage + Sync> TimestampStorage for std::sync::Arc<S> {
    fn load_ceiling(&self) -> Result<Timestamp, OracleError> {
        (**self).load_ceiling()
    }

    fn store_ceiling(&self, ceiling: Timestamp) -> Result<(), OracleError> {
        (**self).store_ceiling(ceiling)
    }
}
