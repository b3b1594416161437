// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Wait strategies for ring producers and consumers.

use std::time::Duration;

/// How a thread waits when a ring is full (producer side) or empty
/// (consumer side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitStrategy {
    /// Spin without yielding. Lowest latency, burns a core.
    #[default]
    BusySpin,
    /// Yield the time slice between checks.
    Yield,
    /// Sleep briefly between checks. Highest latency, lowest CPU.
    Park,
}

impl WaitStrategy {
    /// Performs one idle step of the strategy.
    #[inline]
    pub fn idle(&self) {
        match self {
            WaitStrategy::BusySpin => std::hint::spin_loop(),
            WaitStrategy::Yield => std::thread::yield_now(),
            WaitStrategy::Park => std::thread::sleep(Duration::from_micros(50)),
        }
    }
}
