use serde::Serialize;
use tokio::sync::broadcast;

use lebled_shared::{ConversationId, UserId};

/// Notifications sent *from* the session so a UI can re-render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessengerEvent {
    /// The summary list changed (refresh, send, read, delete).
    ConversationsUpdated { total_unread: usize },
    /// The open thread changed or was closed.
    ThreadUpdated {
        conversation_id: Option<ConversationId>,
    },
    /// A message addressed to the current user was pushed.
    ///
    /// `toast` is set when the message is not for the open thread.
    Incoming {
        conversation_id: ConversationId,
        sender_id: UserId,
        preview: String,
        toast: Option<String>,
    },
    ConversationDeleted { conversation_id: ConversationId },
    /// A conversation list query started (`true`) or finished (`false`).
    Loading { loading: bool },
}

pub fn emit_event(events: &broadcast::Sender<MessengerEvent>, event: MessengerEvent) {
    if events.send(event).is_err() {
        tracing::trace!("no event listeners");
    }
}
