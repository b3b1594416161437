// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Multi-producer/single-consumer ring buffer with preallocated slots.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::wait::WaitStrategy;

/// Pads a value out to its own cache line to keep the producer cursor off
/// the consumer's lines.
#[repr(align(64))]
struct CachePadded<T>(T);

/// One ring slot. `seq` encodes the slot's state relative to the ring
/// cursors: `seq == pos` means claimable for sequence `pos`, `seq == pos + 1`
/// means published and readable, `seq == pos + capacity` means consumed and
/// claimable for the next lap.
struct Slot<T> {
    seq: AtomicU64,
    event: UnsafeCell<T>,
}

/// Bounded MPSC ring. Producers share the buffer through an `Arc`; the
/// unique [`RingConsumer`] is handed out once at construction.
pub struct RingBuffer<T> {
    slots: Box<[Slot<T>]>,
    mask: u64,
    tail: CachePadded<AtomicU64>,
    wait: WaitStrategy,
}

// SAFETY: slots are accessed under the claim/publish protocol below; a slot
// is owned by exactly one thread between a successful claim and the
// corresponding release store on its sequence.
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T: Default> RingBuffer<T> {
    /// Creates a ring with `capacity` preallocated slots and hands back the
    /// producer side plus the unique consumer.
    ///
    /// `capacity` must be a power of two.
    pub fn mpsc(capacity: usize, wait: WaitStrategy) -> (Arc<RingBuffer<T>>, RingConsumer<T>) {
        assert!(
            capacity.is_power_of_two() && capacity > 0,
            "ring capacity must be a power of two"
        );

        let slots = (0..capacity)
            .map(|i| Slot {
                seq: AtomicU64::new(i as u64),
                event: UnsafeCell::new(T::default()),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let ring = Arc::new(RingBuffer {
            slots,
            mask: (capacity - 1) as u64,
            tail: CachePadded(AtomicU64::new(0)),
            wait,
        });
        let consumer = RingConsumer {
            ring: Arc::clone(&ring),
            head: 0,
        };

        (ring, consumer)
    }
}

impl<T> RingBuffer<T> {
    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Claims the next sequence, fills the slot in place, and publishes it.
    ///
    /// Blocks (per the ring's wait strategy) while the ring is full; events
    /// are never dropped. May be called from any number of threads.
    pub fn publish<F: FnOnce(&mut T)>(&self, fill: F) {
        let pos = loop {
            let pos = self.tail.0.load(Ordering::Relaxed);
            let slot = &self.slots[(pos & self.mask) as usize];
            let seq = slot.seq.load(Ordering::Acquire);
            let dif = seq.wrapping_sub(pos) as i64;

            if dif == 0 {
                if self
                    .tail
                    .0
                    .compare_exchange_weak(pos, pos + 1, Ordering::Relaxed, Ordering::Relaxed)
                    .is_ok()
                {
                    break pos;
                }
            } else if dif < 0 {
                // Ring full: the consumer has not released this slot yet.
                self.wait.idle();
            }
            // dif > 0: another producer claimed this sequence; reload.
        };

        let slot = &self.slots[(pos & self.mask) as usize];
        // SAFETY: the successful CAS on `tail` made this thread the unique
        // owner of the slot until the release store below.
        unsafe { fill(&mut *slot.event.get()) };
        slot.seq.store(pos + 1, Ordering::Release);
    }
}

/// The single consumer of a ring. Observes published events strictly in
/// sequence order.
pub struct RingConsumer<T> {
    ring: Arc<RingBuffer<T>>,
    head: u64,
}

impl<T> RingConsumer<T> {
    /// Drains up to `max` published events, handing each to `f` in order.
    /// Returns the number of events handled.
    ///
    /// The handler receives the slot contents by mutable reference and may
    /// take ownership of its parts; the slot itself is recycled, not
    /// deallocated.
    pub fn drain<F: FnMut(&mut T)>(&mut self, max: usize, mut f: F) -> usize {
        let mut handled = 0;

        while handled < max {
            let pos = self.head;
            let slot = &self.ring.slots[(pos & self.ring.mask) as usize];
            if slot.seq.load(Ordering::Acquire) != pos + 1 {
                break;
            }

            // SAFETY: the sequence check above proves the producer published
            // this slot, and there is exactly one consumer; the slot is ours
            // until the release store below hands it back for the next lap.
            unsafe { f(&mut *slot.event.get()) };
            slot.seq.store(pos + self.ring.mask + 1, Ordering::Release);
            self.head = pos + 1;
            handled += 1;
        }

        handled
    }

    /// The ring this consumer drains.
    pub fn ring(&self) -> &Arc<RingBuffer<T>> {
        &self.ring
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_publish_then_drain_in_order() {
        let (ring, mut consumer) = RingBuffer::<u64>::mpsc(8, WaitStrategy::BusySpin);

        for i in 1..=5 {
            ring.publish(|slot| *slot = i);
        }

        let mut seen = Vec::new();
        let n = consumer.drain(16, |slot| seen.push(*slot));
        assert_eq!(n, 5);
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_drain_respects_max() {
        let (ring, mut consumer) = RingBuffer::<u64>::mpsc(8, WaitStrategy::BusySpin);
        for i in 0..6 {
            ring.publish(|slot| *slot = i);
        }

        assert_eq!(consumer.drain(4, |_| {}), 4);
        assert_eq!(consumer.drain(4, |_| {}), 2);
        assert_eq!(consumer.drain(4, |_| {}), 0);
    }

    #[test]
    fn test_slots_are_reused_across_laps() {
        let (ring, mut consumer) = RingBuffer::<Vec<u64>>::mpsc(4, WaitStrategy::BusySpin);

        for lap in 0..3u64 {
            for i in 0..4u64 {
                ring.publish(|slot| {
                    slot.clear();
                    slot.push(lap * 4 + i);
                });
            }
            let mut seen = Vec::new();
            consumer.drain(4, |slot| seen.push(slot[0]));
            assert_eq!(seen, (lap * 4..lap * 4 + 4).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_full_ring_backpressure() {
        let (ring, mut consumer) = RingBuffer::<u64>::mpsc(4, WaitStrategy::Yield);
        for i in 0..4 {
            ring.publish(|slot| *slot = i);
        }

        // A fifth publish must wait until the consumer frees a slot.
        let producer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || ring.publish(|slot| *slot = 99))
        };

        thread::sleep(std::time::Duration::from_millis(20));
        assert!(!producer.is_finished());

        let mut first = None;
        consumer.drain(1, |slot| first = Some(*slot));
        assert_eq!(first, Some(0));

        producer.join().unwrap();
        let mut seen = Vec::new();
        consumer.drain(8, |slot| seen.push(*slot));
        assert_eq!(seen, vec![1, 2, 3, 99]);
    }

    #[test]
    fn stress_multi_producer_no_loss() {
        const PRODUCERS: u64 = 4;
        const PER_PRODUCER: u64 = 10_000;

        let (ring, mut consumer) = RingBuffer::<u64>::mpsc(256, WaitStrategy::Yield);

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        let value = p * PER_PRODUCER + i;
                        ring.publish(|slot| *slot = value);
                    }
                })
            })
            .collect();

        let mut per_producer_last: Vec<Option<u64>> = vec![None; PRODUCERS as usize];
        let mut total = 0u64;
        while total < PRODUCERS * PER_PRODUCER {
            total += consumer.drain(64, |slot| {
                let p = (*slot / PER_PRODUCER) as usize;
                let i = *slot % PER_PRODUCER;
                // Per-producer order is preserved end to end.
                if let Some(prev) = per_producer_last[p] {
                    assert!(i > prev);
                }
                per_producer_last[p] = Some(i);
            }) as u64;
        }

        for handle in producers {
            handle.join().unwrap();
        }
        assert_eq!(total, PRODUCERS * PER_PRODUCER);
    }
}
