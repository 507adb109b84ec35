//! # kvbot-core
//!
//! Core types and traits for the bot: [`Transport`], [`Handler`], [`Component`], message and update
//! types, the [`ShutdownCoordinator`], and tracing initialization. Transport-agnostic; used by
//! `storage`, `kvbot-telegram` and `kvbot-cli`.

pub mod component;
pub mod error;
pub mod logger;
pub mod shutdown;
pub mod transport;
pub mod types;

pub use component::{close_within, CloseTimedOut, Component};
pub use error::{BotError, HandlerError, Result};
pub use logger::{init_tracing, parse_level};
pub use shutdown::{
    CloseOutcome, ShutdownCoordinator, ShutdownHandle, ShutdownReport, ShutdownState,
    ShutdownTrigger, DEFAULT_CLOSE_TIMEOUT,
};
pub use transport::{Transport, UpdateFeed};
pub use types::{
    Chat, Handler, HandlerResponse, Message, OutgoingMessage, ToCoreMessage, ToCoreUpdate,
    ToCoreUser, Update, User,
};
