//! The messaging session task.
//!
//! One tokio task owns the [`SessionState`] and applies, strictly one at a
//! time, the commands sent through a [`MessengerHandle`], the realtime pushes
//! of the current user's subscription and the optional reconciliation ticks.
//! Since nothing else writes the state, a refresh can never complete "under"
//! a send and erase it.
//!
//! Store failures are logged and leave the state as it was; the only failure
//! a caller observes is the `None` returned by a failed send.

use std::future::pending;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use lebled_shared::{ConversationId, UserId};
use lebled_store::{MessageRecord, NewMessage, Subscription};

use crate::aggregator;
use crate::backend::MessageBackend;
use crate::compose::Draft;
use crate::config::MessengerConfig;
use crate::error::{MessengerError, Result};
use crate::events::{emit_event, MessengerEvent};
use crate::notifications;
use crate::state::{MessengerSnapshot, SessionState};

// ---------------------------------------------------------------------------
// Command types
// ---------------------------------------------------------------------------

/// Commands sent *into* the session task.
#[derive(Debug)]
pub enum MessengerCommand {
    /// Switch the signed-in user; `None` signs out.
    SetUser(Option<UserId>, oneshot::Sender<()>),
    Refresh(oneshot::Sender<()>),
    Open(ConversationId, oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
    Send {
        receiver: UserId,
        draft: Draft,
        conversation_id: Option<ConversationId>,
        reply: oneshot::Sender<Option<SentMessage>>,
    },
    Delete(ConversationId, oneshot::Sender<bool>),
    Snapshot(oneshot::Sender<MessengerSnapshot>),
    Shutdown,
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SentMessage {
    pub conversation_id: ConversationId,
    pub message: MessageRecord,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Cloneable front door to a running session.
#[derive(Debug, Clone)]
pub struct MessengerHandle {
    cmd_tx: mpsc::Sender<MessengerCommand>,
    events: broadcast::Sender<MessengerEvent>,
}

impl MessengerHandle {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> MessengerCommand,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| MessengerError::SessionClosed)?;
        rx.await.map_err(|_| MessengerError::SessionClosed)
    }

    pub async fn set_user(&self, user: Option<UserId>) -> Result<()> {
        self.request(|tx| MessengerCommand::SetUser(user, tx)).await
    }

    /// Rebuild the conversation list from the store.
    pub async fn refresh(&self) -> Result<()> {
        self.request(MessengerCommand::Refresh).await
    }

    /// Make `conversation_id` the open thread, load it and mark it read.
    pub async fn open_conversation(&self, conversation_id: ConversationId) -> Result<()> {
        self.request(|tx| MessengerCommand::Open(conversation_id, tx))
            .await
    }

    pub async fn close_conversation(&self) -> Result<()> {
        self.request(MessengerCommand::Close).await
    }

    /// Send `draft` to `receiver`. Without a conversation id a new one is
    /// minted and becomes the open thread.
    ///
    /// `Ok(None)` means the store rejected the insert; nothing was retried.
    pub async fn send_message(
        &self,
        receiver: UserId,
        draft: Draft,
        conversation_id: Option<ConversationId>,
    ) -> Result<Option<SentMessage>> {
        self.request(|reply| MessengerCommand::Send {
            receiver,
            draft,
            conversation_id,
            reply,
        })
        .await
    }

    /// Validate raw input and send it. Blank text never reaches the store.
    pub async fn send_text(
        &self,
        receiver: UserId,
        text: &str,
        conversation_id: Option<ConversationId>,
    ) -> Result<Option<SentMessage>> {
        let draft = Draft::new(text)?;
        self.send_message(receiver, draft, conversation_id).await
    }

    /// Delete every message of the conversation. Returns `false` when the
    /// store call failed, in which case nothing changed locally either.
    pub async fn delete_conversation(&self, conversation_id: ConversationId) -> Result<bool> {
        self.request(|tx| MessengerCommand::Delete(conversation_id, tx))
            .await
    }

    pub async fn snapshot(&self) -> Result<MessengerSnapshot> {
        self.request(MessengerCommand::Snapshot).await
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<MessengerEvent> {
        self.events.subscribe()
    }

    /// Stop the session task and release its realtime subscription.
    pub async fn shutdown(&self) {
        let _ = self.cmd_tx.send(MessengerCommand::Shutdown).await;
    }
}

// ---------------------------------------------------------------------------
// Session task
// ---------------------------------------------------------------------------

/// Spawn a session for `user` in a background tokio task.
///
/// The session subscribes to the user's pushes and runs the initial refresh
/// before it handles any command. It stops on [`MessengerHandle::shutdown`]
/// or once every handle is dropped.
pub fn spawn_session<B>(
    backend: Arc<B>,
    user: Option<UserId>,
    config: &MessengerConfig,
) -> MessengerHandle
where
    B: MessageBackend + Send + Sync + 'static,
{
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    let (events, _) = broadcast::channel(config.event_capacity);

    let session = Session {
        backend,
        state: SessionState::new(None),
        subscription: None,
        events: events.clone(),
    };
    let reconcile = config.reconcile_interval.map(|period| {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    });

    tokio::spawn(session.run(user, cmd_rx, reconcile));

    MessengerHandle { cmd_tx, events }
}

struct Session<B> {
    backend: Arc<B>,
    state: SessionState,
    subscription: Option<Subscription>,
    events: broadcast::Sender<MessengerEvent>,
}

impl<B> Session<B>
where
    B: MessageBackend + Send + Sync + 'static,
{
    async fn run(
        mut self,
        user: Option<UserId>,
        mut cmd_rx: mpsc::Receiver<MessengerCommand>,
        mut reconcile: Option<Interval>,
    ) {
        self.set_user(user).await;

        info!("messaging session started");

        loop {
            tokio::select! {
                // Pushes go first so a delivered row is applied before any
                // command queued after it. A sustained push flood delays
                // commands; that is accepted.
                biased;

                push = next_push(&mut self.subscription) => match push {
                    Some(message) => self.handle_push(message).await,
                    None => {
                        warn!("realtime channel closed, pushes stop until the user is set again");
                        self.subscription = None;
                    }
                },

                cmd = cmd_rx.recv() => match cmd {
                    Some(MessengerCommand::Shutdown) | None => break,
                    Some(cmd) => self.handle_command(cmd).await,
                },

                _ = next_tick(&mut reconcile) => {
                    debug!("reconciliation refresh");
                    self.refresh().await;
                }
            }
        }

        info!("messaging session stopped");
    }

    async fn handle_command(&mut self, cmd: MessengerCommand) {
        match cmd {
            MessengerCommand::SetUser(user, reply) => {
                self.set_user(user).await;
                let _ = reply.send(());
            }
            MessengerCommand::Refresh(reply) => {
                self.refresh().await;
                let _ = reply.send(());
            }
            MessengerCommand::Open(conversation_id, reply) => {
                self.open(conversation_id).await;
                let _ = reply.send(());
            }
            MessengerCommand::Close(reply) => {
                self.state.close_thread();
                emit_event(&self.events, MessengerEvent::ThreadUpdated { conversation_id: None });
                let _ = reply.send(());
            }
            MessengerCommand::Send {
                receiver,
                draft,
                conversation_id,
                reply,
            } => {
                let sent = self.send(receiver, draft, conversation_id).await;
                let _ = reply.send(sent);
            }
            MessengerCommand::Delete(conversation_id, reply) => {
                let deleted = self.delete(conversation_id).await;
                let _ = reply.send(deleted);
            }
            MessengerCommand::Snapshot(reply) => {
                let _ = reply.send(self.state.snapshot());
            }
            MessengerCommand::Shutdown => {}
        }
    }

    async fn set_user(&mut self, user: Option<UserId>) {
        if user.is_some() && user == self.state.user() && self.subscription.is_some() {
            return;
        }

        // Dropping the old subscription unsubscribes it.
        if let Some(old) = self.subscription.take() {
            debug!(user = %old.receiver(), "releasing realtime subscription");
        }
        self.state = SessionState::new(user);

        if let Some(user) = user {
            debug!(user = %user, "subscribing to incoming messages");
            self.subscription = Some(self.backend.subscribe_inserts(user));
            self.refresh().await;
        } else {
            emit_event(&self.events, MessengerEvent::ConversationsUpdated { total_unread: 0 });
        }
        emit_event(&self.events, MessengerEvent::ThreadUpdated { conversation_id: None });
    }

    async fn refresh(&mut self) {
        let Some(user) = self.state.user() else {
            return;
        };

        emit_event(&self.events, MessengerEvent::Loading { loading: true });

        match self.backend.messages_for_user(user).await {
            Ok(rows) => {
                let conversations = aggregator::summarize(&rows, user);
                debug!(
                    rows = rows.len(),
                    conversations = conversations.len(),
                    "conversations refreshed"
                );
                let total_unread = aggregator::total_unread(&conversations);
                self.state.replace_conversations(conversations);
                emit_event(&self.events, MessengerEvent::ConversationsUpdated { total_unread });
            }
            Err(e) => {
                warn!(error = %e, "failed to fetch conversations, keeping previous list");
            }
        }
        emit_event(&self.events, MessengerEvent::Loading { loading: false });
    }

    async fn open(&mut self, conversation_id: ConversationId) {
        let Some(user) = self.state.user() else {
            debug!(conversation = %conversation_id, "open ignored without a user");
            return;
        };

        self.state.open_thread(conversation_id);

        match self.backend.messages_in_conversation(conversation_id).await {
            Ok(messages) => {
                debug!(conversation = %conversation_id, count = messages.len(), "thread loaded");
                self.state.set_thread_messages(conversation_id, messages);
            }
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "failed to fetch messages");
                emit_event(
                    &self.events,
                    MessengerEvent::ThreadUpdated {
                        conversation_id: Some(conversation_id),
                    },
                );
                return;
            }
        }
        emit_event(
            &self.events,
            MessengerEvent::ThreadUpdated {
                conversation_id: Some(conversation_id),
            },
        );

        // The thread above was fetched first, so its incoming rows may still
        // show read = false.
        match self
            .backend
            .mark_conversation_read(conversation_id, user)
            .await
        {
            Ok(marked) => {
                debug!(conversation = %conversation_id, marked, "conversation marked read");
                if self.state.zero_unread(conversation_id) {
                    let total_unread = aggregator::total_unread(self.state.conversations());
                    emit_event(&self.events, MessengerEvent::ConversationsUpdated { total_unread });
                }
            }
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "failed to mark conversation read");
            }
        }
    }

    async fn send(
        &mut self,
        receiver: UserId,
        draft: Draft,
        conversation_id: Option<ConversationId>,
    ) -> Option<SentMessage> {
        let Some(user) = self.state.user() else {
            warn!("send ignored without a user");
            return None;
        };

        let (conversation_id, is_new) = match conversation_id {
            Some(id) => (id, false),
            None => (ConversationId::new(), true),
        };

        let new_message = NewMessage {
            conversation_id,
            sender_id: user,
            receiver_id: receiver,
            content: draft.into_inner(),
        };

        let message = match self.backend.insert_message(new_message).await {
            Ok(message) => message,
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "failed to send message");
                return None;
            }
        };

        if is_new {
            self.state.open_thread(conversation_id);
        }
        if self.state.append_to_thread(message.clone()) {
            emit_event(
                &self.events,
                MessengerEvent::ThreadUpdated {
                    conversation_id: Some(conversation_id),
                },
            );
        }
        self.state.record_sent(&message);
        let total_unread = aggregator::total_unread(self.state.conversations());
        emit_event(&self.events, MessengerEvent::ConversationsUpdated { total_unread });

        info!(msg_id = %message.id, conversation = %conversation_id, new = is_new, "message sent");

        Some(SentMessage {
            conversation_id,
            message,
        })
    }

    async fn delete(&mut self, conversation_id: ConversationId) -> bool {
        match self.backend.delete_conversation(conversation_id).await {
            Ok(deleted) => {
                let was_open = self.state.active() == Some(conversation_id);
                let removed = self.state.remove_conversation(conversation_id);
                info!(conversation = %conversation_id, deleted, "conversation deleted");

                if removed || deleted > 0 {
                    emit_event(&self.events, MessengerEvent::ConversationDeleted { conversation_id });
                }
                if was_open {
                    emit_event(&self.events, MessengerEvent::ThreadUpdated { conversation_id: None });
                }
                true
            }
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "failed to delete conversation");
                false
            }
        }
    }

    async fn handle_push(&mut self, mut message: MessageRecord) {
        let conversation_id = message.conversation_id;
        let in_open_thread = self.state.active() == Some(conversation_id);

        debug!(msg_id = %message.id, conversation = %conversation_id, in_open_thread, "push received");

        emit_event(
            &self.events,
            MessengerEvent::Incoming {
                conversation_id,
                sender_id: message.sender_id,
                preview: notifications::preview(&message.content),
                toast: (!in_open_thread).then(|| notifications::toast_text(&message.content)),
            },
        );

        if in_open_thread {
            match self.backend.mark_message_read(message.id).await {
                Ok(_) => message.read = true,
                Err(e) => warn!(msg_id = %message.id, error = %e, "failed to mark pushed message read"),
            }
            self.state.append_to_thread(message);
            emit_event(
                &self.events,
                MessengerEvent::ThreadUpdated {
                    conversation_id: Some(conversation_id),
                },
            );
        }

        self.refresh().await;
    }
}

async fn next_push(subscription: &mut Option<Subscription>) -> Option<MessageRecord> {
    match subscription {
        Some(subscription) => subscription.recv().await,
        None => pending().await,
    }
}

async fn next_tick(reconcile: &mut Option<Interval>) {
    match reconcile {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}
