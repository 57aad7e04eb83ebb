//! State owned by a messaging session.
//!
//! [`SessionState`] is only ever touched by the session task, so it needs no
//! locking. Callers see it through [`MessengerSnapshot`] copies.

use serde::Serialize;

use lebled_shared::{ConversationId, UserId};
use lebled_store::MessageRecord;

use crate::aggregator::{self, ConversationSummary};

/// The open-thread state machine.
///
/// `Closed -> Open(a) -> Open(b)` re-fetches on every switch; nothing is
/// cached across threads. Deleting or closing the open conversation returns
/// to `Closed`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ThreadState {
    #[default]
    Closed,
    Open {
        conversation_id: ConversationId,
        /// Oldest first.
        messages: Vec<MessageRecord>,
    },
}

impl ThreadState {
    pub fn conversation_id(&self) -> Option<ConversationId> {
        match self {
            ThreadState::Closed => None,
            ThreadState::Open {
                conversation_id, ..
            } => Some(*conversation_id),
        }
    }

    pub fn messages(&self) -> &[MessageRecord] {
        match self {
            ThreadState::Closed => &[],
            ThreadState::Open { messages, .. } => messages,
        }
    }
}

/// Central session state.
#[derive(Debug, Default)]
pub struct SessionState {
    user: Option<UserId>,
    conversations: Vec<ConversationSummary>,
    thread: ThreadState,
}

impl SessionState {
    pub fn new(user: Option<UserId>) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }

    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    pub fn active(&self) -> Option<ConversationId> {
        self.thread.conversation_id()
    }

    pub fn conversations(&self) -> &[ConversationSummary] {
        &self.conversations
    }

    pub fn thread(&self) -> &ThreadState {
        &self.thread
    }

    pub fn replace_conversations(&mut self, conversations: Vec<ConversationSummary>) {
        self.conversations = conversations;
    }

    /// Switch to `conversation_id` with an empty thread, dropping whatever was
    /// open before.
    pub fn open_thread(&mut self, conversation_id: ConversationId) {
        self.thread = ThreadState::Open {
            conversation_id,
            messages: Vec::new(),
        };
    }

    /// Install fetched messages if `conversation_id` is still the open one.
    pub fn set_thread_messages(
        &mut self,
        conversation_id: ConversationId,
        fetched: Vec<MessageRecord>,
    ) -> bool {
        match &mut self.thread {
            ThreadState::Open {
                conversation_id: open,
                messages,
            } if *open == conversation_id => {
                *messages = fetched;
                true
            }
            _ => false,
        }
    }

    /// Append to the open thread if the message belongs to it.
    pub fn append_to_thread(&mut self, message: MessageRecord) -> bool {
        match &mut self.thread {
            ThreadState::Open {
                conversation_id,
                messages,
            } if *conversation_id == message.conversation_id => {
                if messages.iter().all(|m| m.id != message.id) {
                    messages.push(message);
                }
                true
            }
            _ => false,
        }
    }

    pub fn close_thread(&mut self) {
        self.thread = ThreadState::Closed;
    }

    /// Drop the conversation's summary and close it if it was open. Returns
    /// whether a summary was removed.
    pub fn remove_conversation(&mut self, conversation_id: ConversationId) -> bool {
        let before = self.conversations.len();
        self.conversations
            .retain(|c| c.conversation_id != conversation_id);
        if self.active() == Some(conversation_id) {
            self.close_thread();
        }
        self.conversations.len() != before
    }

    /// Local zeroing after a successful mark-as-read; the next refresh
    /// reconciles with the store.
    pub fn zero_unread(&mut self, conversation_id: ConversationId) -> bool {
        match self
            .conversations
            .iter_mut()
            .find(|c| c.conversation_id == conversation_id)
        {
            Some(summary) if summary.unread_count > 0 => {
                summary.unread_count = 0;
                true
            }
            _ => false,
        }
    }

    /// Fold a message the current user just sent into the summary list.
    pub fn record_sent(&mut self, message: &MessageRecord) {
        let Some(user) = self.user else {
            return;
        };
        match self
            .conversations
            .iter_mut()
            .find(|c| c.conversation_id == message.conversation_id)
        {
            Some(summary) => {
                if message.created_at >= summary.last_message_time {
                    summary.last_message = message.content.clone();
                    summary.last_message_time = message.created_at;
                }
            }
            None => self
                .conversations
                .push(aggregator::summary_from_message(message, user)),
        }
        aggregator::sort_by_recency(&mut self.conversations);
    }

    pub fn snapshot(&self) -> MessengerSnapshot {
        MessengerSnapshot {
            user: self.user,
            conversations: self.conversations.clone(),
            active_conversation: self.active(),
            thread: self.thread.messages().to_vec(),
            total_unread: aggregator::total_unread(&self.conversations),
        }
    }
}

/// A copy of the session state handed to callers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MessengerSnapshot {
    pub user: Option<UserId>,
    /// Most recent first.
    pub conversations: Vec<ConversationSummary>,
    pub active_conversation: Option<ConversationId>,
    /// Oldest first. Empty when no conversation is open.
    pub thread: Vec<MessageRecord>,
    pub total_unread: usize,
}

impl MessengerSnapshot {
    pub fn conversation(&self, conversation_id: ConversationId) -> Option<&ConversationSummary> {
        self.conversations
            .iter()
            .find(|c| c.conversation_id == conversation_id)
    }

    /// The most recent conversation with `peer`, used to continue a thread
    /// instead of minting a new conversation id.
    pub fn conversation_with(&self, peer: UserId) -> Option<&ConversationSummary> {
        self.conversations.iter().find(|c| c.other_user_id == peer)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::aggregator::tests::record;

    #[test]
    fn switching_threads_discards_previous_messages() {
        let (u, x) = (UserId::new(), UserId::new());
        let (a, b) = (ConversationId::new(), ConversationId::new());
        let mut state = SessionState::new(Some(u));

        state.open_thread(a);
        assert!(state.set_thread_messages(a, vec![record(a, x, u, "a1", false, Utc::now())]));
        assert_eq!(state.thread().messages().len(), 1);

        state.close_thread();
        assert_eq!(state.thread(), &ThreadState::Closed);

        state.open_thread(b);
        assert!(state.thread().messages().is_empty());
        assert_eq!(state.active(), Some(b));
    }

    #[test]
    fn stale_fetch_is_ignored() {
        let u = UserId::new();
        let (a, b) = (ConversationId::new(), ConversationId::new());
        let mut state = SessionState::new(Some(u));

        state.open_thread(b);
        assert!(!state.set_thread_messages(a, vec![record(a, u, u, "x", false, Utc::now())]));
        assert!(state.thread().messages().is_empty());
    }

    #[test]
    fn append_only_to_matching_thread_and_only_once() {
        let (u, x) = (UserId::new(), UserId::new());
        let (a, c) = (ConversationId::new(), ConversationId::new());
        let mut state = SessionState::new(Some(u));
        state.open_thread(a);

        let m = record(a, x, u, "hi", false, Utc::now());
        assert!(state.append_to_thread(m.clone()));
        assert!(state.append_to_thread(m));
        assert!(!state.append_to_thread(record(c, x, u, "other", false, Utc::now())));
        assert_eq!(state.thread().messages().len(), 1);
    }

    #[test]
    fn record_sent_updates_or_creates_and_resorts() {
        let (u, x, y) = (UserId::new(), UserId::new(), UserId::new());
        let (a, b) = (ConversationId::new(), ConversationId::new());
        let t0 = Utc::now();
        let mut state = SessionState::new(Some(u));
        state.replace_conversations(crate::aggregator::summarize(
            &[
                record(b, y, u, "b1", false, t0 + Duration::seconds(2)),
                record(a, x, u, "a1", false, t0),
            ],
            u,
        ));

        state.record_sent(&record(a, u, x, "a2", false, t0 + Duration::seconds(5)));
        let snap = state.snapshot();
        assert_eq!(snap.conversations[0].conversation_id, a);
        assert_eq!(snap.conversations[0].last_message, "a2");
        assert_eq!(snap.conversations[0].unread_count, 1);

        let fresh = ConversationId::new();
        state.record_sent(&record(fresh, u, y, "new", false, t0 + Duration::seconds(9)));
        let snap = state.snapshot();
        assert_eq!(snap.conversations.len(), 3);
        assert_eq!(snap.conversations[0].conversation_id, fresh);
        assert_eq!(snap.conversations[0].unread_count, 0);
        assert_eq!(snap.conversation_with(y).unwrap().conversation_id, fresh);
    }

    #[test]
    fn removing_open_conversation_closes_thread() {
        let (u, x) = (UserId::new(), UserId::new());
        let a = ConversationId::new();
        let mut state = SessionState::new(Some(u));
        state.replace_conversations(crate::aggregator::summarize(
            &[record(a, x, u, "a1", false, Utc::now())],
            u,
        ));
        state.open_thread(a);

        assert!(state.remove_conversation(a));
        assert_eq!(state.active(), None);
        assert!(!state.remove_conversation(a));
    }

    #[test]
    fn zero_unread_reports_change() {
        let (u, x) = (UserId::new(), UserId::new());
        let a = ConversationId::new();
        let mut state = SessionState::new(Some(u));
        state.replace_conversations(crate::aggregator::summarize(
            &[record(a, x, u, "a1", false, Utc::now())],
            u,
        ));

        assert_eq!(state.snapshot().total_unread, 1);
        assert!(state.zero_unread(a));
        assert!(!state.zero_unread(a));
        assert_eq!(state.snapshot().total_unread, 0);
    }
}
