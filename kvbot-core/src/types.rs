//! Core types: user, chat, message, update, outgoing reply, and the Handler trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Sender identity (id, username, names).
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl User {
    /// Placeholder for messages without a sender (e.g. channel posts).
    pub fn unknown() -> Self {
        Self {
            id: 0,
            username: None,
            first_name: None,
            last_name: None,
        }
    }
}

/// Chat (channel, group or private) identity.
#[derive(Debug, Clone)]
pub struct Chat {
    pub id: i64,
    pub chat_type: String,
}

/// A single inbound message. `id` is the transport message id; `0` means unknown.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: i32,
    pub user: User,
    pub chat: Chat,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Inbound event from the transport. `message` is `None` for non-message updates
/// (edits, callbacks, membership changes), which the listener discards.
#[derive(Debug, Clone)]
pub struct Update {
    pub id: i32,
    pub message: Option<Message>,
}

impl Update {
    /// Offset to request next so this update is not delivered again.
    pub fn next_offset(&self) -> i32 {
        self.id.saturating_add(1)
    }
}

/// Reply sent back through the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    pub reply_to_message_id: Option<i32>,
    /// Render `text` as Markdown.
    pub markdown: bool,
}

impl OutgoingMessage {
    /// Builds a Markdown reply into the message's chat, threaded to it when its id is known.
    pub fn reply_to(message: &Message, text: impl Into<String>) -> Self {
        Self {
            chat_id: message.chat.id,
            text: text.into(),
            reply_to_message_id: (message.id != 0).then_some(message.id),
            markdown: true,
        }
    }
}

/// Handler result. `Reply(text)` is sent back to the originating chat by the listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerResponse {
    /// Nothing to send.
    Ignore,
    /// Send `text` as a reply to the message.
    Reply(String),
}

/// Converts a transport-specific user type to core [`User`].
pub trait ToCoreUser: Send + Sync {
    fn to_core(&self) -> User;
}

/// Converts a transport-specific message type to core [`Message`].
pub trait ToCoreMessage: Send + Sync {
    fn to_core(&self) -> Message;
}

/// Converts a transport-specific update type to core [`Update`].
pub trait ToCoreUpdate: Send + Sync {
    fn to_core(&self) -> Update;
}

/// Processes one message matched by the command table.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, message: &Message) -> crate::error::Result<HandlerResponse>;
}
