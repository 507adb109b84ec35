#![allow(dead_code)]

pub mod mock_transport;

use chrono::Utc;
use kvbot_core::{Chat, Message, Update, User};

/// Message update from user 7 in chat 42.
pub fn text_update(update_id: i32, message_id: i32, text: &str) -> Update {
    Update {
        id: update_id,
        message: Some(Message {
            id: message_id,
            user: User {
                id: 7,
                username: Some("ann".to_string()),
                first_name: Some("Ann".to_string()),
                last_name: None,
            },
            chat: Chat {
                id: 42,
                chat_type: "private".to_string(),
            },
            content: text.to_string(),
            created_at: Utc::now(),
        }),
    }
}

/// Update without a message body (edit, callback, membership change).
pub fn non_message_update(update_id: i32) -> Update {
    Update {
        id: update_id,
        message: None,
    }
}
