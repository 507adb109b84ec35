//! # kvbot-telegram
//!
//! Telegram side of the bot: adapters from teloxide types, the [`TelegramTransport`] long-poll
//! feed, the prefix [`CommandTable`], and the [`UpdateListener`] that ties them together.

mod adapters;
mod commands;
mod config;
mod listener;
mod transport;

pub use adapters::{TelegramMessageWrapper, TelegramUpdateWrapper, TelegramUserWrapper};
pub use commands::{CommandTable, ReplyHandler};
pub use config::{TelegramConfig, DEFAULT_POLL_TIMEOUT};
pub use listener::{load_last_offset, UpdateListener, DEFAULT_LAST_OFFSET, LAST_OFFSET_KEY};
pub use transport::TelegramTransport;
