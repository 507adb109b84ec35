//! Chat transport abstraction.
//!
//! [`Transport`] is transport-agnostic; `kvbot-telegram` implements it over the Telegram Bot API.
//! The listener only needs these three operations, so tests can substitute an in-memory transport.

use crate::error::Result;
use crate::types::{OutgoingMessage, Update};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Update feed handed out by [`Transport::subscribe`]. Closed by the transport once it stops receiving.
pub type UpdateFeed = mpsc::Receiver<Update>;

/// Abstraction for receiving updates and sending replies.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Starts delivering updates from `offset` onwards, long-polling with `poll_timeout`.
    async fn subscribe(&self, offset: i32, poll_timeout: Duration) -> Result<UpdateFeed>;
    /// Sends a message (optionally threaded as a reply).
    async fn send(&self, message: &OutgoingMessage) -> Result<()>;
    /// Stops delivering updates; the feed returned by `subscribe` is closed afterwards.
    fn stop_receiving_updates(&self);
}
