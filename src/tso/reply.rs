// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Client reply channel seam.

use std::sync::mpsc;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::types::Timestamp;

/// A message delivered back to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Response to a timestamp request.
    Timestamp { ts: Timestamp },
    /// The transaction committed.
    Commit {
        start_ts: Timestamp,
        commit_ts: Timestamp,
    },
    /// The transaction aborted.
    Abort { start_ts: Timestamp, is_retry: bool },
}

/// Write side of a client connection, implemented by the network front-end.
///
/// The core holds one handle per in-flight request and calls `send_reply`
/// exactly once, from the persistence stage, after the decision is durable.
pub trait ReplyChannel: Send + Sync {
    /// Delivers a reply. Returns false when the channel is closed; the
    /// caller drops the reply silently.
    fn send_reply(&self, reply: Reply) -> bool;
}

/// Shared handle to a client's reply channel.
pub type ClientHandle = Arc<dyn ReplyChannel>;

/// In-process reply channel over a std mpsc queue, for embedded clients,
/// tests, and the validation binary.
pub struct MpscReplyChannel {
    tx: Mutex<mpsc::Sender<Reply>>,
}

impl MpscReplyChannel {
    /// Creates a channel, returning the handle given to the core and the
    /// receiver the client reads replies from.
    pub fn new() -> (ClientHandle, mpsc::Receiver<Reply>) {
        let (tx, rx) = mpsc::channel();
        let handle: ClientHandle = Arc::new(Self { tx: Mutex::new(tx) });
        (handle, rx)
    }
}

impl ReplyChannel for MpscReplyChannel {
    fn send_reply(&self, reply: Reply) -> bool {
        self.tx.lock().send(reply).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_and_receive() {
        let (handle, rx) = MpscReplyChannel::new();
        assert!(handle.send_reply(Reply::Timestamp { ts: 3 }));
        assert_eq!(rx.recv().unwrap(), Reply::Timestamp { ts: 3 });
    }

    #[test]
    fn test_closed_channel_reports_false() {
        let (handle, rx) = MpscReplyChannel::new();
        drop(rx);
        assert!(!handle.send_reply(Reply::Timestamp { ts: 1 }));
    }

    #[test]
    fn test_replies_arrive_in_send_order() {
        let (handle, rx) = MpscReplyChannel::new();
        handle.send_reply(Reply::Timestamp { ts: 1 });
        handle.send_reply(Reply::Commit {
            start_ts: 1,
            commit_ts: 2,
        });

        assert_eq!(rx.recv().unwrap(), Reply::Timestamp { ts: 1 });
        assert_eq!(
            rx.recv().unwrap(),
            Reply::Commit {
                start_ts: 1,
                commit_ts: 2
            }
        );
    }
}
