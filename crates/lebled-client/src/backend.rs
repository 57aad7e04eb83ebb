//! The store the session talks to.
//!
//! [`MessageBackend`] is the row-oriented query/insert/update/delete surface
//! plus the insert push subscription. [`SqliteBackend`] serves it from a local
//! [`Database`]; a hosted backend would implement the same trait.

use std::sync::{Arc, Mutex};

use lebled_shared::{ConversationId, MessageId, UserId};
use lebled_store::{Database, MessageRecord, NewMessage, RealtimeHub, StoreError, Subscription};

use crate::config::MessengerConfig;

pub type BackendResult<T> = std::result::Result<T, StoreError>;

#[allow(async_fn_in_trait)]
#[trait_variant::make(Send)]
pub trait MessageBackend {
    /// Every message where `user` is sender or receiver, newest first.
    async fn messages_for_user(&self, user: UserId) -> BackendResult<Vec<MessageRecord>>;

    /// Every message of the conversation, oldest first.
    async fn messages_in_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> BackendResult<Vec<MessageRecord>>;

    /// Store a new unread message; the backend assigns id and timestamp.
    async fn insert_message(&self, message: NewMessage) -> BackendResult<MessageRecord>;

    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        receiver: UserId,
    ) -> BackendResult<usize>;

    async fn mark_message_read(&self, id: MessageId) -> BackendResult<bool>;

    async fn delete_conversation(&self, conversation_id: ConversationId) -> BackendResult<usize>;

    /// Push stream of rows inserted with `receiver_id = receiver`.
    fn subscribe_inserts(&self, receiver: UserId) -> Subscription;
}

/// [`MessageBackend`] over a local SQLite [`Database`].
#[derive(Clone)]
pub struct SqliteBackend {
    db: Arc<Mutex<Database>>,
    hub: RealtimeHub,
}

impl SqliteBackend {
    pub fn new(db: Database) -> Self {
        let hub = db.realtime().clone();
        Self {
            db: Arc::new(Mutex::new(db)),
            hub,
        }
    }

    /// Open the database named by the config, or the platform default.
    pub fn open(config: &MessengerConfig) -> BackendResult<Self> {
        let db = match &config.db_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                tracing::info!(path = %path.display(), "opening database");
                Database::open_at(path)?
            }
            None => Database::new()?,
        };
        Ok(Self::new(db))
    }

    /// Shared handle to the underlying database.
    pub fn database(&self) -> Arc<Mutex<Database>> {
        self.db.clone()
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> BackendResult<T>) -> BackendResult<T> {
        let guard = self
            .db
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("Lock poisoned: {e}")))?;
        f(&guard)
    }
}

impl MessageBackend for SqliteBackend {
    async fn messages_for_user(&self, user: UserId) -> BackendResult<Vec<MessageRecord>> {
        self.with_db(|db| db.messages_for_user(user))
    }

    async fn messages_in_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> BackendResult<Vec<MessageRecord>> {
        self.with_db(|db| db.messages_in_conversation(conversation_id))
    }

    async fn insert_message(&self, message: NewMessage) -> BackendResult<MessageRecord> {
        self.with_db(|db| db.insert_message(&message))
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: ConversationId,
        receiver: UserId,
    ) -> BackendResult<usize> {
        self.with_db(|db| db.mark_conversation_read(conversation_id, receiver))
    }

    async fn mark_message_read(&self, id: MessageId) -> BackendResult<bool> {
        self.with_db(|db| db.mark_message_read(id))
    }

    async fn delete_conversation(&self, conversation_id: ConversationId) -> BackendResult<usize> {
        self.with_db(|db| db.delete_conversation(conversation_id))
    }

    fn subscribe_inserts(&self, receiver: UserId) -> Subscription {
        self.hub.subscribe_inserts(receiver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = MessengerConfig {
            db_path: Some(dir.path().join("nested").join("lebled.db")),
            ..MessengerConfig::default()
        };

        let backend = SqliteBackend::open(&config).unwrap();
        let (u, x) = (UserId::new(), UserId::new());
        backend
            .insert_message(NewMessage {
                conversation_id: ConversationId::new(),
                sender_id: u,
                receiver_id: x,
                content: "Salam".into(),
            })
            .await
            .unwrap();

        assert_eq!(backend.messages_for_user(x).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn inserts_reach_subscribers_through_the_backend() {
        let backend = SqliteBackend::new(Database::open_in_memory().unwrap());
        let (u, x) = (UserId::new(), UserId::new());
        let mut sub = backend.subscribe_inserts(x);

        let sent = backend
            .insert_message(NewMessage {
                conversation_id: ConversationId::new(),
                sender_id: u,
                receiver_id: x,
                content: "Price is negotiable.".into(),
            })
            .await
            .unwrap();

        assert_eq!(sub.recv().await.unwrap().id, sent.id);
    }
}
