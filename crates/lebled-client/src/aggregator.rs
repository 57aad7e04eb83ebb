//! Grouping of flat message rows into per-conversation summaries.
//!
//! Everything here is pure: the session feeds in whatever the store returned
//! and replaces its summary list with the result.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lebled_shared::{ConversationId, UserId};
use lebled_store::{MessageRecord, ProfileRef};

/// One row of the conversation list. Derived, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSummary {
    pub conversation_id: ConversationId,
    pub other_user_id: UserId,
    pub other_user_name: String,
    pub other_user_email: String,
    pub last_message: String,
    pub last_message_time: DateTime<Utc>,
    /// Messages addressed to the current user that are still unread.
    pub unread_count: usize,
}

/// The participant of `message` that is not `self_id`.
///
/// Sender and receiver swap from one message to the next inside a
/// conversation, so this has to be evaluated per message.
pub fn other_participant(message: &MessageRecord, self_id: UserId) -> UserId {
    if message.sender_id == self_id {
        message.receiver_id
    } else {
        message.sender_id
    }
}

/// The joined profile of [`other_participant`].
pub fn peer_profile(message: &MessageRecord, self_id: UserId) -> Option<&ProfileRef> {
    if message.sender_id == self_id {
        message.receiver.as_ref()
    } else {
        message.sender.as_ref()
    }
}

/// Summary seeded from a single message: peer identity and preview both come
/// from it.
pub fn summary_from_message(message: &MessageRecord, self_id: UserId) -> ConversationSummary {
    let profile = peer_profile(message, self_id);
    ConversationSummary {
        conversation_id: message.conversation_id,
        other_user_id: other_participant(message, self_id),
        other_user_name: ProfileRef::display_name(profile),
        other_user_email: ProfileRef::display_email(profile),
        last_message: message.content.clone(),
        last_message_time: message.created_at,
        unread_count: usize::from(is_unread_for(message, self_id)),
    }
}

pub fn is_unread_for(message: &MessageRecord, self_id: UserId) -> bool {
    message.receiver_id == self_id && !message.read
}

/// Build one summary per distinct conversation id in `rows`.
///
/// `rows` is expected newest first (the store query orders it that way); the
/// peer identity is taken from the first row seen for each conversation. The
/// preview still tracks the maximum timestamp so an out-of-order row cannot
/// leave a stale preview behind.
pub fn summarize(rows: &[MessageRecord], self_id: UserId) -> Vec<ConversationSummary> {
    let mut by_conversation: HashMap<ConversationId, ConversationSummary> = HashMap::new();

    for message in rows {
        match by_conversation.get_mut(&message.conversation_id) {
            None => {
                by_conversation.insert(
                    message.conversation_id,
                    summary_from_message(message, self_id),
                );
            }
            Some(summary) => {
                if message.created_at > summary.last_message_time {
                    summary.last_message = message.content.clone();
                    summary.last_message_time = message.created_at;
                }
                if is_unread_for(message, self_id) {
                    summary.unread_count += 1;
                }
            }
        }
    }

    let mut summaries: Vec<_> = by_conversation.into_values().collect();
    sort_by_recency(&mut summaries);
    summaries
}

/// Most recent conversation first. Equal times fall back to the id so the
/// order is stable across refreshes.
pub fn sort_by_recency(summaries: &mut [ConversationSummary]) {
    summaries.sort_by(|a, b| {
        b.last_message_time
            .cmp(&a.last_message_time)
            .then_with(|| a.conversation_id.cmp(&b.conversation_id))
    });
}

/// Sum of unread counts, shown as the header badge.
pub fn total_unread(summaries: &[ConversationSummary]) -> usize {
    summaries.iter().map(|s| s.unread_count).sum()
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{Duration, TimeZone};
    use lebled_shared::MessageId;

    use super::*;

    pub(crate) fn record(
        conversation_id: ConversationId,
        from: UserId,
        to: UserId,
        content: &str,
        read: bool,
        at: DateTime<Utc>,
    ) -> MessageRecord {
        MessageRecord {
            id: MessageId::new(),
            conversation_id,
            sender_id: from,
            receiver_id: to,
            content: content.to_string(),
            read,
            created_at: at,
            sender: None,
            receiver: None,
        }
    }

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + Duration::seconds(secs)
    }

    #[test]
    fn other_participant_flips_with_roles() {
        let (u, x) = (UserId::new(), UserId::new());
        let conv = ConversationId::new();

        let sent = record(conv, u, x, "a", false, t(0));
        let received = record(conv, x, u, "b", false, t(1));

        assert_eq!(other_participant(&sent, u), x);
        assert_eq!(other_participant(&received, u), x);
        assert_eq!(other_participant(&received, x), u);
    }

    #[test]
    fn peer_profile_picks_the_other_side() {
        let (u, x) = (UserId::new(), UserId::new());
        let mut message = record(ConversationId::new(), u, x, "a", false, t(0));
        message.receiver = Some(ProfileRef {
            full_name: Some("Amine".into()),
            email: None,
        });

        let summary = summary_from_message(&message, u);
        assert_eq!(summary.other_user_name, "Amine");
        assert_eq!(summary.other_user_email, "");
        assert!(peer_profile(&message, x).is_none());
    }

    #[test]
    fn two_conversations_three_messages() {
        let (u, x, y) = (UserId::new(), UserId::new(), UserId::new());
        let (a, b) = (ConversationId::new(), ConversationId::new());

        // newest first, as the store returns them
        let rows = vec![
            record(b, u, y, "b1", true, t(3)),
            record(a, x, u, "a2", false, t(2)),
            record(a, u, x, "a1", false, t(1)),
        ];

        let summaries = summarize(&rows, u);
        assert_eq!(summaries.len(), 2);

        assert_eq!(summaries[0].conversation_id, b);
        assert_eq!(summaries[0].last_message_time, t(3));
        assert_eq!(summaries[0].unread_count, 0);
        assert_eq!(summaries[0].other_user_id, y);

        assert_eq!(summaries[1].conversation_id, a);
        assert_eq!(summaries[1].last_message, "a2");
        assert_eq!(summaries[1].unread_count, 1);
        assert_eq!(summaries[1].other_user_id, x);
    }

    #[test]
    fn older_third_conversation_ranks_below() {
        let (u, x, y) = (UserId::new(), UserId::new(), UserId::new());
        let (a, b) = (ConversationId::new(), ConversationId::new());

        let rows = vec![
            record(a, x, u, "a2", false, t(5)),
            record(a, u, x, "a1", false, t(1)),
            record(b, u, y, "b1", true, t(3)),
        ];

        let summaries = summarize(&rows, u);
        assert_eq!(summaries[0].conversation_id, a);
        assert_eq!(summaries[1].conversation_id, b);
    }

    #[test]
    fn properties_hold_for_a_mixed_inbox() {
        let me = UserId::new();
        let peers: Vec<UserId> = (0..4).map(|_| UserId::new()).collect();
        let conversations: Vec<ConversationId> = (0..4).map(|_| ConversationId::new()).collect();

        let mut rows = Vec::new();
        for i in 0..24i64 {
            let idx = (i as usize * 7) % 4;
            let (from, to) = if i % 3 == 0 {
                (me, peers[idx])
            } else {
                (peers[idx], me)
            };
            rows.push(record(conversations[idx], from, to, &format!("m{i}"), i % 2 == 0, t(i * 13 % 17)));
        }
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let summaries = summarize(&rows, me);

        let distinct: std::collections::HashSet<_> =
            rows.iter().map(|m| m.conversation_id).collect();
        assert_eq!(summaries.len(), distinct.len());

        for pair in summaries.windows(2) {
            assert!(pair[0].last_message_time >= pair[1].last_message_time);
        }

        for summary in &summaries {
            let in_conv: Vec<_> = rows
                .iter()
                .filter(|m| m.conversation_id == summary.conversation_id)
                .collect();
            let newest = in_conv.iter().map(|m| m.created_at).max().unwrap();
            let unread = in_conv.iter().filter(|m| is_unread_for(m, me)).count();
            assert_eq!(summary.last_message_time, newest);
            assert_eq!(summary.unread_count, unread);
        }

        assert_eq!(
            total_unread(&summaries),
            rows.iter().filter(|m| is_unread_for(m, me)).count()
        );
    }

    #[test]
    fn empty_input_gives_empty_list() {
        assert!(summarize(&[], UserId::new()).is_empty());
    }
}
