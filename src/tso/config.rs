// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Server configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::ring::WaitStrategy;

use super::error::TsoError;

/// Which backend holds the oracle's allocation ceiling.
///
/// `TsoServer::start` selects the backend from this value: the coordination
/// selection is served by the big-endian record under the data directory,
/// while the column-store selection must be handed in by the store
/// integration through `TsoServer::start_with_storage`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampStoreKind {
    /// A coordination-service node (big-endian u64, conditional set).
    #[default]
    Coordination,
    /// A single cell in the underlying column store, owned by the store
    /// integration.
    ColumnStore,
}

/// Configuration for a TSO server instance.
#[derive(Debug, Clone)]
pub struct TsoConfig {
    /// Base directory for local durable state (ceiling record, commit log).
    pub data_dir: PathBuf,

    /// Capacity of the conflict map, in entries.
    pub max_items: usize,

    /// Timestamps reserved per durable ceiling bump.
    pub timestamp_batch_size: u64,

    /// Maximum persistence events per durability barrier.
    pub persist_batch_size: usize,

    /// Maximum time a buffered decision waits for the next barrier.
    pub persist_batch_timeout: Duration,

    /// Request ring capacity; must be a power of two.
    pub request_ring_size: usize,

    /// Persistence ring capacity; must be a power of two.
    pub persist_ring_size: usize,

    /// Wait strategy of the request stage and its producers.
    pub request_wait: WaitStrategy,

    /// Wait strategy of the persistence stage and its producers.
    pub persist_wait: WaitStrategy,

    /// Backend for the oracle's allocation ceiling.
    pub timestamp_store: TimestampStoreKind,

    /// Interface the front-end binds; informational to the core.
    pub network_interface: String,

    /// Port the front-end binds; informational to the core.
    pub port: u16,
}

impl Default for TsoConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            max_items: 1_000_000,
            timestamp_batch_size: 10_000_000,
            persist_batch_size: 1024,
            persist_batch_timeout: Duration::from_millis(1),
            request_ring_size: 1 << 12,
            persist_ring_size: 1 << 12,
            request_wait: WaitStrategy::BusySpin,
            persist_wait: WaitStrategy::BusySpin,
            timestamp_store: TimestampStoreKind::default(),
            network_interface: "eth0".to_string(),
            port: 54758,
        }
    }
}

impl TsoConfig {
    /// Creates a configuration rooted at a custom data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Sets the conflict map capacity.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    /// Sets the oracle allocation batch size.
    pub fn with_timestamp_batch_size(mut self, batch: u64) -> Self {
        self.timestamp_batch_size = batch;
        self
    }

    /// Sets the persistence batch size.
    pub fn with_persist_batch_size(mut self, batch: usize) -> Self {
        self.persist_batch_size = batch;
        self
    }

    /// Sets the persistence batch timeout.
    pub fn with_persist_batch_timeout(mut self, timeout: Duration) -> Self {
        self.persist_batch_timeout = timeout;
        self
    }

    /// Sets the wait strategy for both stages.
    pub fn with_wait_strategy(mut self, wait: WaitStrategy) -> Self {
        self.request_wait = wait;
        self.persist_wait = wait;
        self
    }

    /// Path of the oracle's ceiling record.
    pub fn ceiling_path(&self) -> PathBuf {
        self.data_dir.join("timestamp.ceiling")
    }

    /// Path of the commit log.
    pub fn commit_log_path(&self) -> PathBuf {
        self.data_dir.join("commit.log")
    }

    /// Ensures the data directory exists.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), TsoError> {
        if self.max_items == 0 {
            return Err(TsoError::InvalidConfig(
                "max_items must be non-zero".to_string(),
            ));
        }
        if self.timestamp_batch_size == 0 {
            return Err(TsoError::InvalidConfig(
                "timestamp_batch_size must be non-zero".to_string(),
            ));
        }
        if self.persist_batch_size == 0 {
            return Err(TsoError::InvalidConfig(
                "persist_batch_size must be non-zero".to_string(),
            ));
        }
        for (name, size) in [
            ("request_ring_size", self.request_ring_size),
            ("persist_ring_size", self.persist_ring_size),
        ] {
            if size == 0 || !size.is_power_of_two() {
                return Err(TsoError::InvalidConfig(format!(
                    "{name} must be a non-zero power of two, got {size}"
                )));
            }
        }
        if self.timestamp_batch_size < 1_000_000 {
            warn!(
                batch = self.timestamp_batch_size,
                "small timestamp batch: every batch crossing blocks the request stage on storage"
            );
        }
        Ok(())
    }
}
