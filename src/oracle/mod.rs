// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Batched timestamp oracle.
//!
//! The oracle produces a lazy, infinite, strictly increasing sequence of
//! 64-bit timestamps that survives process restarts. Durability comes from
//! persisting an allocation *ceiling* ahead of demand: the in-memory counter
//! may hand out values freely below the ceiling, and must durably raise the
//! ceiling before crossing it. After a crash the counter restarts at the last
//! persisted ceiling, skipping at most one allocation batch; monotonicity is
//! preserved at the cost of gaps in the sequence.
//!
//! # Example
//!
//! ```
//! use cesiumtso::oracle::{BatchedTimestampOracle, InMemoryTimestampStorage};
//!
//! let storage = InMemoryTimestampStorage::new(0);
//! let mut oracle = BatchedTimestampOracle::new(storage, 1_000_000).unwrap();
//! let t1 = oracle.next().unwrap();
//! let t2 = oracle.next().unwrap();
//! assert!(t2 > t1);
//! ```

mod batched;
mod error;
mod file;
mod memory;
mod storage;

pub use batched::BatchedTimestampOracle;
pub use error::OracleError;
pub use file::FileTimestampStorage;
pub use memory::InMemoryTimestampStorage;
pub use storage::TimestampStorage;
