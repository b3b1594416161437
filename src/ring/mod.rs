// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Bounded multi-producer/single-consumer ring buffers.
//!
//! All hand-off between pipeline stages goes through these rings. Event
//! slots are preallocated at construction and mutated in place, so the hot
//! path performs no allocation: a producer claims a sequence number, fills
//! the slot at `seq mod capacity` through a closure, and publishes it by
//! releasing the slot's sequence marker. The single consumer observes
//! sequences strictly in order.
//!
//! A full ring applies backpressure: producers wait according to the ring's
//! [`WaitStrategy`] and never drop an event.

mod buffer;
mod wait;

pub use buffer::{RingBuffer, RingConsumer};
pub use wait::WaitStrategy;
