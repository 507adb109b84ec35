//! Prefix command table and the fixed-reply handler used for `start` and `help`.

use std::sync::Arc;

use async_trait::async_trait;
use kvbot_core::{Handler, HandlerError, HandlerResponse, Message, Result};
use tracing::debug;

/// Replies with a configured text. An empty text is a handler error; the listener logs it
/// and sends nothing.
pub struct ReplyHandler {
    command: String,
    text: String,
}

impl ReplyHandler {
    pub fn new(command: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            text: text.into(),
        }
    }
}

#[async_trait]
impl Handler for ReplyHandler {
    async fn handle(&self, message: &Message) -> Result<HandlerResponse> {
        debug!(
            command = %self.command,
            user_id = message.user.id,
            chat_id = message.chat.id,
            "Got command request"
        );
        if self.text.is_empty() {
            return Err(HandlerError::EmptyReply(self.command.clone()).into());
        }
        Ok(HandlerResponse::Reply(self.text.clone()))
    }
}

/// Ordered `(prefix, handler)` pairs. A message goes to the first entry whose prefix starts
/// its text; later entries are never consulted for it.
#[derive(Clone, Default)]
pub struct CommandTable {
    entries: Vec<(String, Arc<dyn Handler>)>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a command. Registration order is match order.
    pub fn add_command(mut self, prefix: impl Into<String>, handler: Arc<dyn Handler>) -> Self {
        self.entries.push((prefix.into(), handler));
        self
    }

    /// First command whose prefix starts `text`, with its handler.
    pub fn route(&self, text: &str) -> Option<(&str, Arc<dyn Handler>)> {
        self.entries
            .iter()
            .find(|(prefix, _)| text.starts_with(prefix.as_str()))
            .map(|(prefix, handler)| (prefix.as_str(), Arc::clone(handler)))
    }

    pub fn prefixes(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(prefix, _)| prefix.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
