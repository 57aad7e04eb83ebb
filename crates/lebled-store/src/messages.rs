//! CRUD operations for [`MessageRecord`] rows.
//!
//! Every read joins the sender and receiver profiles. Timestamps are stored
//! as fixed-width RFC 3339 strings in UTC so that ordering the text column
//! orders by time; rows with equal timestamps fall back to insertion order.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;
use uuid::Uuid;

use lebled_shared::{ConversationId, MessageId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{MessageRecord, NewMessage, ProfileRef};

const SELECT_MESSAGE: &str = "
    SELECT m.id, m.conversation_id, m.sender_id, m.receiver_id, m.content, m.read, m.created_at,
           s.id, s.full_name, s.email,
           r.id, r.full_name, r.email
    FROM messages m
    LEFT JOIN profiles s ON s.id = m.sender_id
    LEFT JOIN profiles r ON r.id = m.receiver_id";

impl Database {
    /// Insert a message stamped with the current time and publish it on the
    /// realtime hub.
    pub fn insert_message(&self, message: &NewMessage) -> Result<MessageRecord> {
        self.insert_message_at(message, Utc::now())
    }

    /// Insert a message with an explicit creation time.
    pub fn insert_message_at(
        &self,
        message: &NewMessage,
        created_at: DateTime<Utc>,
    ) -> Result<MessageRecord> {
        let id = MessageId::new();

        self.conn().execute(
            "INSERT INTO messages (id, conversation_id, sender_id, receiver_id, content, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
            params![
                id.to_string(),
                message.conversation_id.to_string(),
                message.sender_id.to_string(),
                message.receiver_id.to_string(),
                message.content,
                format_timestamp(created_at),
            ],
        )?;

        let record = self.get_message(id)?;
        tracing::debug!(
            msg_id = %record.id,
            conversation = %record.conversation_id,
            "message inserted"
        );
        self.realtime().publish(&record);

        Ok(record)
    }

    pub fn get_message(&self, id: MessageId) -> Result<MessageRecord> {
        self.conn()
            .query_row(
                &format!("{SELECT_MESSAGE} WHERE m.id = ?1"),
                params![id.to_string()],
                row_to_message,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// All messages the user sent or received, newest first.
    pub fn messages_for_user(&self, user: UserId) -> Result<Vec<MessageRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_MESSAGE}
             WHERE m.sender_id = ?1 OR m.receiver_id = ?1
             ORDER BY m.created_at DESC, m.rowid DESC"
        ))?;

        let rows = stmt.query_map(params![user.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// All messages of one conversation, oldest first.
    pub fn messages_in_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<MessageRecord>> {
        let mut stmt = self.conn().prepare(&format!(
            "{SELECT_MESSAGE}
             WHERE m.conversation_id = ?1
             ORDER BY m.created_at ASC, m.rowid ASC"
        ))?;

        let rows = stmt.query_map(params![conversation_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Mark every unread message addressed to `receiver` in the conversation
    /// as read. Returns the number of rows changed.
    pub fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        receiver: UserId,
    ) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE messages SET read = 1
             WHERE conversation_id = ?1 AND receiver_id = ?2 AND read = 0",
            params![conversation_id.to_string(), receiver.to_string()],
        )?;
        Ok(affected)
    }

    pub fn mark_message_read(&self, id: MessageId) -> Result<bool> {
        let affected = self.conn().execute(
            "UPDATE messages SET read = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(affected > 0)
    }

    /// Remove every message of the conversation. Returns the number of rows
    /// deleted; zero for an unknown conversation.
    pub fn delete_conversation(&self, conversation_id: ConversationId) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            params![conversation_id.to_string()],
        )?;
        Ok(affected)
    }
}

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_uuid(idx: usize, s: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub(crate) fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn joined_profile(row: &rusqlite::Row<'_>, first: usize) -> rusqlite::Result<Option<ProfileRef>> {
    let id: Option<String> = row.get(first)?;
    if id.is_none() {
        return Ok(None);
    }
    Ok(Some(ProfileRef {
        full_name: row.get(first + 1)?,
        email: row.get(first + 2)?,
    }))
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRecord> {
    let id_str: String = row.get(0)?;
    let conversation_str: String = row.get(1)?;
    let sender_str: String = row.get(2)?;
    let receiver_str: String = row.get(3)?;
    let content: String = row.get(4)?;
    let read: bool = row.get(5)?;
    let ts_str: String = row.get(6)?;

    Ok(MessageRecord {
        id: MessageId(parse_uuid(0, &id_str)?),
        conversation_id: ConversationId(parse_uuid(1, &conversation_str)?),
        sender_id: UserId(parse_uuid(2, &sender_str)?),
        receiver_id: UserId(parse_uuid(3, &receiver_str)?),
        content,
        read,
        created_at: parse_timestamp(6, &ts_str)?,
        sender: joined_profile(row, 7)?,
        receiver: joined_profile(row, 10)?,
    })
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn new_message(conversation_id: ConversationId, from: UserId, to: UserId, text: &str) -> NewMessage {
        NewMessage {
            conversation_id,
            sender_id: from,
            receiver_id: to,
            content: text.to_string(),
        }
    }

    #[test]
    fn insert_assigns_id_time_and_unread() {
        let db = Database::open_in_memory().unwrap();
        let (u, x) = (UserId::new(), UserId::new());
        let conv = ConversationId::new();

        let stored = db.insert_message(&new_message(conv, u, x, "Salam")).unwrap();

        assert!(!stored.read);
        assert_eq!(stored.conversation_id, conv);
        assert_eq!(db.get_message(stored.id).unwrap(), stored);
    }

    #[test]
    fn joins_profiles_when_present() {
        let db = Database::open_in_memory().unwrap();
        let (u, x) = (UserId::new(), UserId::new());
        db.upsert_profile(u, Some("Sarah Benali"), Some("sarah@example.dz"))
            .unwrap();

        let stored = db
            .insert_message(&new_message(ConversationId::new(), u, x, "Bonjour"))
            .unwrap();

        assert_eq!(
            stored.sender.and_then(|p| p.full_name).as_deref(),
            Some("Sarah Benali")
        );
        assert!(stored.receiver.is_none());
    }

    #[test]
    fn user_query_is_newest_first_and_scoped() {
        let db = Database::open_in_memory().unwrap();
        let (u, x, y) = (UserId::new(), UserId::new(), UserId::new());
        let t0 = Utc::now();

        db.insert_message_at(&new_message(ConversationId::new(), u, x, "first"), t0)
            .unwrap();
        db.insert_message_at(
            &new_message(ConversationId::new(), y, u, "second"),
            t0 + Duration::seconds(5),
        )
        .unwrap();
        db.insert_message_at(&new_message(ConversationId::new(), x, y, "not mine"), t0)
            .unwrap();

        let rows = db.messages_for_user(u).unwrap();
        let contents: Vec<_> = rows.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["second", "first"]);
    }

    #[test]
    fn conversation_query_is_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        let (u, x) = (UserId::new(), UserId::new());
        let conv = ConversationId::new();
        let t0 = Utc::now();

        db.insert_message_at(&new_message(conv, x, u, "later"), t0 + Duration::minutes(1))
            .unwrap();
        db.insert_message_at(&new_message(conv, u, x, "earlier"), t0)
            .unwrap();

        let rows = db.messages_in_conversation(conv).unwrap();
        assert_eq!(rows[0].content, "earlier");
        assert_eq!(rows[1].content, "later");
        assert!(db.messages_in_conversation(ConversationId::new()).unwrap().is_empty());
    }

    #[test]
    fn mark_read_only_touches_receiver_side() {
        let db = Database::open_in_memory().unwrap();
        let (u, x) = (UserId::new(), UserId::new());
        let conv = ConversationId::new();

        db.insert_message(&new_message(conv, u, x, "to x")).unwrap();
        db.insert_message(&new_message(conv, x, u, "to u")).unwrap();
        db.insert_message(&new_message(conv, x, u, "to u again")).unwrap();

        assert_eq!(db.mark_conversation_read(conv, u).unwrap(), 2);
        assert_eq!(db.mark_conversation_read(conv, u).unwrap(), 0);

        let rows = db.messages_in_conversation(conv).unwrap();
        let to_x = rows.iter().find(|m| m.receiver_id == x).unwrap();
        assert!(!to_x.read);
    }

    #[test]
    fn mark_single_message_read() {
        let db = Database::open_in_memory().unwrap();
        let stored = db
            .insert_message(&new_message(ConversationId::new(), UserId::new(), UserId::new(), "hi"))
            .unwrap();

        assert!(db.mark_message_read(stored.id).unwrap());
        assert!(db.get_message(stored.id).unwrap().read);
        assert!(!db.mark_message_read(MessageId::new()).unwrap());
    }

    #[test]
    fn delete_conversation_removes_all_rows() {
        let db = Database::open_in_memory().unwrap();
        let (u, x) = (UserId::new(), UserId::new());
        let conv = ConversationId::new();
        let other = ConversationId::new();

        db.insert_message(&new_message(conv, u, x, "a")).unwrap();
        db.insert_message(&new_message(conv, x, u, "b")).unwrap();
        db.insert_message(&new_message(other, x, u, "c")).unwrap();

        assert_eq!(db.delete_conversation(conv).unwrap(), 2);
        assert_eq!(db.delete_conversation(conv).unwrap(), 0);
        assert_eq!(db.messages_for_user(u).unwrap().len(), 1);
    }
}
