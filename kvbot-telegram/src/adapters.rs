//! Adapters from Telegram (teloxide) types to kvbot_core types.
//! Depends only on teloxide and kvbot_core type definitions.

use kvbot_core::{Chat, Message, ToCoreMessage, ToCoreUpdate, ToCoreUser, Update, User};
use teloxide::types::UpdateKind;

/// Wraps a teloxide User for conversion to core [`User`].
pub struct TelegramUserWrapper<'a>(pub &'a teloxide::types::User);

impl<'a> ToCoreUser for TelegramUserWrapper<'a> {
    fn to_core(&self) -> User {
        User {
            id: self.0.id.0 as i64,
            username: self.0.username.clone(),
            first_name: Some(self.0.first_name.clone()),
            last_name: self.0.last_name.clone(),
        }
    }
}

/// Wraps a teloxide Message for conversion to core [`Message`].
pub struct TelegramMessageWrapper<'a>(pub &'a teloxide::types::Message);

impl<'a> ToCoreMessage for TelegramMessageWrapper<'a> {
    fn to_core(&self) -> Message {
        Message {
            id: self.0.id.0,
            user: self
                .0
                .from
                .as_ref()
                .map(|u| TelegramUserWrapper(u).to_core())
                .unwrap_or_else(User::unknown),
            chat: Chat {
                id: self.0.chat.id.0,
                chat_type: self.chat_type().to_string(),
            },
            content: self.0.text().unwrap_or("").to_string(),
            created_at: self.0.date,
        }
    }
}

impl<'a> TelegramMessageWrapper<'a> {
    fn chat_type(&self) -> &'static str {
        let chat = &self.0.chat;
        if chat.is_private() {
            "private"
        } else if chat.is_group() {
            "group"
        } else if chat.is_supergroup() {
            "supergroup"
        } else if chat.is_channel() {
            "channel"
        } else {
            "unknown"
        }
    }
}

/// Wraps a teloxide Update for conversion to core [`Update`]. Only new messages carry a
/// message body; every other update kind converts with `message: None`.
pub struct TelegramUpdateWrapper<'a>(pub &'a teloxide::types::Update);

impl<'a> ToCoreUpdate for TelegramUpdateWrapper<'a> {
    fn to_core(&self) -> Update {
        let message = match &self.0.kind {
            UpdateKind::Message(msg) => Some(TelegramMessageWrapper(msg).to_core()),
            _ => None,
        };
        Update {
            id: self.0.id.0 as i32,
            message,
        }
    }
}
