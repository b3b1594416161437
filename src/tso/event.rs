// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Reusable ring events.
//!
//! Events live inside ring slots for the lifetime of the server and are
//! rewritten in place on every occupancy. The commit arm keeps its row
//! fingerprints in a fixed inline buffer for the common case and spills to a
//! `Vec` (whose capacity is also reused) only for oversized write-sets, so
//! steady-state request traffic allocates nothing.

use crate::types::{RowFingerprint, Timestamp};

use super::reply::ClientHandle;

/// Write-sets up to this size are stored inline in the ring slot.
pub const MAX_INLINE_ROWS: usize = 40;

/// Discriminant of a request event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestKind {
    /// Request for a fresh start timestamp.
    #[default]
    Timestamp,
    /// Request to validate and commit a write-set.
    Commit,
}

/// A decoded client request, parked in the request ring.
pub struct RequestEvent {
    kind: RequestKind,
    start_ts: Timestamp,
    is_retry: bool,
    num_rows: usize,
    inline_rows: [RowFingerprint; MAX_INLINE_ROWS],
    spilled_rows: Vec<RowFingerprint>,
    client: Option<ClientHandle>,
}

impl Default for RequestEvent {
    fn default() -> Self {
        Self {
            kind: RequestKind::default(),
            start_ts: 0,
            is_retry: false,
            num_rows: 0,
            inline_rows: [0; MAX_INLINE_ROWS],
            spilled_rows: Vec::new(),
            client: None,
        }
    }
}

impl RequestEvent {
    /// Rewrites this slot as a timestamp request.
    pub fn set_timestamp_request(&mut self, client: ClientHandle) {
        self.kind = RequestKind::Timestamp;
        self.client = Some(client);
    }

    /// Rewrites this slot as a commit request. Rows beyond the inline
    /// window go to the spill buffer, reusing its capacity.
    pub fn set_commit_request(
        &mut self,
        start_ts: Timestamp,
        rows: &[RowFingerprint],
        is_retry: bool,
        client: ClientHandle,
    ) {
        self.kind = RequestKind::Commit;
        self.start_ts = start_ts;
        self.is_retry = is_retry;
        self.num_rows = rows.len();
        self.spilled_rows.clear();
        if rows.len() <= MAX_INLINE_ROWS {
            self.inline_rows[..rows.len()].copy_from_slice(rows);
        } else {
            self.spilled_rows.extend_from_slice(rows);
        }
        self.client = Some(client);
    }

    /// The event's discriminant.
    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    /// Start timestamp of the commit arm.
    pub fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    /// Retry flag of the commit arm.
    pub fn is_retry(&self) -> bool {
        self.is_retry
    }

    /// The write-set of the commit arm, in request order.
    pub fn rows(&self) -> &[RowFingerprint] {
        if self.num_rows > MAX_INLINE_ROWS {
            &self.spilled_rows
        } else {
            &self.inline_rows[..self.num_rows]
        }
    }

    /// Takes the client handle out of the slot, leaving it empty for reuse.
    pub fn take_client(&mut self) -> Option<ClientHandle> {
        self.client.take()
    }
}

/// Discriminant of a persistence event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistKind {
    /// Log a handed-out start timestamp and reply to the client.
    #[default]
    Timestamp,
    /// Log a commit decision and reply to the client.
    Commit,
    /// Log an abort decision and reply to the client.
    Abort,
    /// Log a low-watermark advance; carries no client.
    LowWatermark,
}

/// A decision flowing from the request stage to the persistence stage.
#[derive(Default)]
pub struct PersistEvent {
    kind: PersistKind,
    ts: Timestamp,
    start_ts: Timestamp,
    commit_ts: Timestamp,
    lw: Timestamp,
    is_retry: bool,
    client: Option<ClientHandle>,
}

impl PersistEvent {
    /// Rewrites this slot as a timestamp decision.
    pub fn set_timestamp(&mut self, ts: Timestamp, client: Option<ClientHandle>) {
        self.kind = PersistKind::Timestamp;
        self.ts = ts;
        self.client = client;
    }

    /// Rewrites this slot as a commit decision.
    pub fn set_commit(
        &mut self,
        start_ts: Timestamp,
        commit_ts: Timestamp,
        client: Option<ClientHandle>,
    ) {
        self.kind = PersistKind::Commit;
        self.start_ts = start_ts;
        self.commit_ts = commit_ts;
        self.client = client;
    }

    /// Rewrites this slot as an abort decision.
    pub fn set_abort(
        &mut self,
        start_ts: Timestamp,
        is_retry: bool,
        client: Option<ClientHandle>,
    ) {
        self.kind = PersistKind::Abort;
        self.start_ts = start_ts;
        self.is_retry = is_retry;
        self.client = client;
    }

    /// Rewrites this slot as a low-watermark advance.
    pub fn set_low_watermark(&mut self, lw: Timestamp) {
        self.kind = PersistKind::LowWatermark;
        self.lw = lw;
        self.client = None;
    }

    pub fn kind(&self) -> PersistKind {
        self.kind
    }

    pub fn ts(&self) -> Timestamp {
        self.ts
    }

    pub fn start_ts(&self) -> Timestamp {
        self.start_ts
    }

    pub fn commit_ts(&self) -> Timestamp {
        self.commit_ts
    }

    pub fn low_watermark(&self) -> Timestamp {
        self.lw
    }

    pub fn is_retry(&self) -> bool {
        self.is_retry
    }

    /// Takes the client handle out of the slot, leaving it empty for reuse.
    pub fn take_client(&mut self) -> Option<ClientHandle> {
        self.client.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tso::reply::MpscReplyChannel;

    #[test]
    fn test_inline_rows() {
        let (client, _rx) = MpscReplyChannel::new();
        let mut event = RequestEvent::default();
        event.set_commit_request(5, &[0xA, 0xB, 0xA], false, client);

        assert_eq!(event.kind(), RequestKind::Commit);
        assert_eq!(event.start_ts(), 5);
        assert_eq!(event.rows(), &[0xA, 0xB, 0xA]);
        assert!(event.take_client().is_some());
        assert!(event.take_client().is_none());
    }

    #[test]
    fn test_spilled_rows() {
        let (client, _rx) = MpscReplyChannel::new();
        let rows: Vec<u64> = (0..100).collect();

        let mut event = RequestEvent::default();
        event.set_commit_request(1, &rows, true, client);

        assert_eq!(event.rows(), rows.as_slice());
        assert!(event.is_retry());
    }

    #[test]
    fn test_slot_reuse_clears_previous_occupancy() {
        let (client1, _rx1) = MpscReplyChannel::new();
        let (client2, _rx2) = MpscReplyChannel::new();

        let mut event = RequestEvent::default();
        let rows: Vec<u64> = (0..64).collect();
        event.set_commit_request(9, &rows, true, client1);
        event.take_client();

        // Reoccupy with a small write-set: the spill buffer must not leak
        // into the new occupancy.
        event.set_commit_request(10, &[7], false, client2);
        assert_eq!(event.rows(), &[7]);
        assert!(!event.is_retry());
        assert!(event.take_client().is_some());
    }

    #[test]
    fn test_empty_write_set() {
        let (client, _rx) = MpscReplyChannel::new();
        let mut event = RequestEvent::default();
        event.set_commit_request(3, &[], false, client);
        assert!(event.rows().is_empty());
    }

    #[test]
    fn test_persist_event_arms() {
        let (client, _rx) = MpscReplyChannel::new();
        let mut event = PersistEvent::default();

        event.set_commit(2, 7, Some(client));
        assert_eq!(event.kind(), PersistKind::Commit);
        assert_eq!(event.start_ts(), 2);
        assert_eq!(event.commit_ts(), 7);
        assert!(event.take_client().is_some());

        event.set_low_watermark(42);
        assert_eq!(event.kind(), PersistKind::LowWatermark);
        assert_eq!(event.low_watermark(), 42);
        assert!(event.take_client().is_none());
    }
}
