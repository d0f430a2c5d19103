//! Single-slot pending-request correlation table.
//!
//! Maps an outstanding `msg_id` to exactly one waiting receiver. A duplicate
//! RESPONSE for an already-satisfied or already-timed-out `msg_id` finds no
//! slot and is dropped on the floor, matching the "at most one delivery"
//! invariant.

use std::collections::HashMap;

use homeconnect_proto::Message;
use tokio::sync::{Mutex, oneshot};

/// Correlation table from `msg_id` to a one-shot delivery slot.
#[derive(Default)]
pub struct PendingTable {
    slots: Mutex<HashMap<i64, oneshot::Sender<Message>>>,
}

impl PendingTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a slot for `msg_id`, returning the receiving half.
    ///
    /// If a slot already exists for this id (should not happen given
    /// monotonic allocation, but is not this table's job to prevent), it is
    /// silently replaced; the old receiver will observe a dropped sender.
    pub async fn register(&self, msg_id: i64) -> oneshot::Receiver<Message> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().await.insert(msg_id, tx);
        rx
    }

    /// Remove a slot without completing it.
    ///
    /// Called on every `send_sync` exit path (timeout, transport error) to
    /// guarantee the slot does not linger.
    pub async fn deregister(&self, msg_id: i64) {
        self.slots.lock().await.remove(&msg_id);
    }

    /// Complete the slot for `msg_id`, if one is registered.
    ///
    /// Returns `true` if a waiting slot was found and handed the message,
    /// `false` if it was dropped (no such slot, or the receiver already
    /// gave up).
    pub async fn complete(&self, msg_id: i64, message: Message) -> bool {
        let Some(tx) = self.slots.lock().await.remove(&msg_id) else { return false };
        tx.send(message).is_ok()
    }

    /// Number of slots currently awaiting delivery. Exposed for tests.
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}
