//! Realtime push of inserted messages.
//!
//! Every successful insert is broadcast to all live [`Subscription`]s; each
//! subscription only yields rows addressed to its receiver. Delivery is best
//! effort: a subscriber that falls more than [`PUSH_CHANNEL_CAPACITY`] events
//! behind loses the overflow and is told so through a log line, nothing more.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use lebled_shared::constants::PUSH_CHANNEL_CAPACITY;
use lebled_shared::UserId;

use crate::models::MessageRecord;

#[derive(Debug, Clone)]
pub struct RealtimeHub {
    tx: broadcast::Sender<Arc<MessageRecord>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(PUSH_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub(crate) fn publish(&self, record: &MessageRecord) {
        let _no_receivers = self.tx.send(Arc::new(record.clone()));
    }

    /// Subscribe to "message inserted where receiver = `receiver`".
    ///
    /// Dropping the returned [`Subscription`] releases it.
    pub fn subscribe_inserts(&self, receiver: UserId) -> Subscription {
        tracing::debug!(receiver = %receiver, "realtime subscription opened");
        Subscription {
            receiver,
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for RealtimeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// A live, receiver-filtered view of the insert stream.
#[derive(Debug)]
pub struct Subscription {
    receiver: UserId,
    rx: broadcast::Receiver<Arc<MessageRecord>>,
}

impl Subscription {
    pub fn receiver(&self) -> UserId {
        self.receiver
    }

    /// Wait for the next message addressed to this subscription's receiver.
    ///
    /// Returns `None` once the hub is gone. Cancel safe.
    pub async fn recv(&mut self) -> Option<MessageRecord> {
        loop {
            match self.rx.recv().await {
                Ok(record) if record.receiver_id == self.receiver => {
                    return Some(MessageRecord::clone(&record));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        receiver = %self.receiver,
                        skipped,
                        "realtime subscription lagged, events dropped"
                    );
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
