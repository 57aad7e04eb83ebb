//! Domain model structs persisted in the local database.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be handed
//! directly to the UI layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lebled_shared::constants::UNKNOWN_PEER_NAME;
use lebled_shared::{ConversationId, MessageId, UserId};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A user profile as exposed by the auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub full_name: Option<String>,
    pub email: Option<String>,
    /// When the profile row was created locally.
    pub created_at: DateTime<Utc>,
}

/// The profile columns joined into a message row for one participant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileRef {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

impl ProfileRef {
    /// Full name, else email, else [`UNKNOWN_PEER_NAME`].
    pub fn display_name(profile: Option<&Self>) -> String {
        profile
            .and_then(|p| {
                non_empty(p.full_name.as_deref()).or_else(|| non_empty(p.email.as_deref()))
            })
            .unwrap_or(UNKNOWN_PEER_NAME)
            .to_string()
    }

    pub fn display_email(profile: Option<&Self>) -> String {
        profile
            .and_then(|p| non_empty(p.email.as_deref()))
            .unwrap_or_default()
            .to_string()
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// The columns a client supplies when inserting a message. The store assigns
/// the id and the timestamp, and always starts with `read = false`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewMessage {
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
}

/// A stored message row with the sender and receiver profiles joined in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    /// Flipped only by the receiver's client once the message was viewed.
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub sender: Option<ProfileRef>,
    pub receiver: Option<ProfileRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_email_then_unknown() {
        let named = ProfileRef {
            full_name: Some("Amine Khelifi".into()),
            email: Some("amine@example.dz".into()),
        };
        let email_only = ProfileRef {
            full_name: Some(String::new()),
            email: Some("sarah@example.dz".into()),
        };

        assert_eq!(ProfileRef::display_name(Some(&named)), "Amine Khelifi");
        assert_eq!(ProfileRef::display_name(Some(&email_only)), "sarah@example.dz");
        assert_eq!(ProfileRef::display_name(None), UNKNOWN_PEER_NAME);
        assert_eq!(ProfileRef::display_email(None), "");
    }
}
