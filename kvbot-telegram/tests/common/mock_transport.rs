//! In-memory [`kvbot_core::Transport`] for listener tests.
//!
//! Tests push updates through an inbox sender and read every sent reply from an unbounded
//! receiver, so nothing talks to Telegram.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kvbot_core::{BotError, OutgoingMessage, Result, Transport, Update, UpdateFeed};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Mock transport that forwards inbox updates to the subscriber until stopped.
pub struct MockTransport {
    inbox: Mutex<Option<mpsc::Receiver<Update>>>,
    sent_tx: mpsc::UnboundedSender<OutgoingMessage>,
    /// `(offset, poll_timeout)` passed to the last `subscribe`.
    subscribed_with: Mutex<Option<(i32, Duration)>>,
    stop: CancellationToken,
    stop_calls: AtomicUsize,
    failing_sends: AtomicUsize,
    fail_subscribe: bool,
}

/// Test-side ends of a [`MockTransport`].
pub struct MockHandles {
    pub updates: mpsc::Sender<Update>,
    pub sent: mpsc::UnboundedReceiver<OutgoingMessage>,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, MockHandles) {
        Self::build(false)
    }

    /// A transport whose `subscribe` always fails.
    pub fn unreachable() -> (Arc<Self>, MockHandles) {
        Self::build(true)
    }

    fn build(fail_subscribe: bool) -> (Arc<Self>, MockHandles) {
        let (updates, inbox) = mpsc::channel(16);
        let (sent_tx, sent) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            inbox: Mutex::new(Some(inbox)),
            sent_tx,
            subscribed_with: Mutex::new(None),
            stop: CancellationToken::new(),
            stop_calls: AtomicUsize::new(0),
            failing_sends: AtomicUsize::new(0),
            fail_subscribe,
        });
        (transport, MockHandles { updates, sent })
    }

    /// Makes the next `n` sends fail without recording them.
    pub fn fail_next_sends(&self, n: usize) {
        self.failing_sends.store(n, Ordering::SeqCst);
    }

    pub fn subscribed_with(&self) -> Option<(i32, Duration)> {
        *self.subscribed_with.lock().unwrap()
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn subscribe(&self, offset: i32, poll_timeout: Duration) -> Result<UpdateFeed> {
        if self.fail_subscribe {
            return Err(BotError::Transport("connection refused".to_string()));
        }
        let mut inbox = self
            .inbox
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| BotError::Subscribe("already subscribed".to_string()))?;
        *self.subscribed_with.lock().unwrap() = Some((offset, poll_timeout));

        let (tx, rx) = mpsc::channel(16);
        let stop = self.stop.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    update = inbox.recv() => match update {
                        Some(update) => {
                            if tx.send(update).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });
        Ok(rx)
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let failing = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if failing.is_ok() {
            return Err(BotError::Send("Bad Request: chat not found".to_string()));
        }
        let _ = self.sent_tx.send(message.clone());
        Ok(())
    }

    fn stop_receiving_updates(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.stop.cancel();
    }
}
