//! Update listener: subscribes to the transport, routes each message through the
//! [`CommandTable`] and sends handler replies back. Registered with the shutdown coordinator
//! under the name `bot`.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use kvbot_core::{
    BotError, Component, Handler, HandlerResponse, Message, OutgoingMessage, Result, Transport,
    UpdateFeed,
};
use storage::{KvStore, StorageError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::commands::CommandTable;
use crate::config::DEFAULT_POLL_TIMEOUT;

/// "No update processed yet"; the first subscription then starts at offset 0.
pub const DEFAULT_LAST_OFFSET: i32 = -1;

/// Store key under which the last processed update id is kept between runs.
pub const LAST_OFFSET_KEY: &str = "telegram.last_offset";

pub struct UpdateListener {
    transport: Arc<dyn Transport>,
    commands: Arc<CommandTable>,
    poll_timeout: Duration,
    last_offset: Arc<AtomicI32>,
    limiter: Option<Arc<Semaphore>>,
    offset_store: Option<Arc<KvStore>>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateListener {
    pub const NAME: &'static str = "bot";

    pub fn new(transport: Arc<dyn Transport>, commands: CommandTable) -> Self {
        Self {
            transport,
            commands: Arc::new(commands),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            last_offset: Arc::new(AtomicI32::new(DEFAULT_LAST_OFFSET)),
            limiter: None,
            offset_store: None,
            dispatch: Mutex::new(None),
        }
    }

    pub fn with_poll_timeout(mut self, poll_timeout: Duration) -> Self {
        self.poll_timeout = poll_timeout;
        self
    }

    /// Sets the id of the last processed update. `0` is treated as unset.
    pub fn with_last_offset(self, offset: i32) -> Self {
        let offset = if offset == 0 {
            warn!(offset = DEFAULT_LAST_OFFSET, "Setting default last offset");
            DEFAULT_LAST_OFFSET
        } else {
            offset
        };
        self.last_offset.store(offset, Ordering::SeqCst);
        self
    }

    /// Caps the number of handlers running at once. Dispatch waits for a free slot.
    pub fn with_max_concurrent_handlers(mut self, limit: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(limit)));
        self
    }

    /// Saves the last processed offset under [`LAST_OFFSET_KEY`] on close.
    pub fn with_offset_store(mut self, store: Arc<KvStore>) -> Self {
        self.offset_store = Some(store);
        self
    }

    /// Id of the last update taken off the feed.
    pub fn last_offset(&self) -> i32 {
        self.last_offset.load(Ordering::SeqCst)
    }

    /// Subscribes from `last_offset + 1` and starts dispatching in the background.
    #[instrument(skip(self), fields(poll_timeout = ?self.poll_timeout))]
    pub async fn start(&self) -> Result<()> {
        let offset = self.last_offset().saturating_add(1);
        let feed = self
            .transport
            .subscribe(offset, self.poll_timeout)
            .await
            .map_err(|e| match e {
                BotError::Subscribe(_) => e,
                other => BotError::Subscribe(other.to_string()),
            })?;

        let dispatcher = Dispatcher {
            transport: Arc::clone(&self.transport),
            commands: Arc::clone(&self.commands),
            last_offset: Arc::clone(&self.last_offset),
            limiter: self.limiter.clone(),
        };
        let handle = tokio::spawn(dispatcher.run(feed));
        if let Some(previous) = self
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle)
        {
            previous.abort();
        }

        info!(offset, commands = self.commands.len(), "Update listener started");
        Ok(())
    }

    /// Stops the transport feed and waits for the dispatch loop to drain. Handlers already
    /// spawned are not awaited. Always returns `Ok`.
    pub async fn close(&self) -> Result<()> {
        self.transport.stop_receiving_updates();

        let handle = self
            .dispatch
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "Dispatch loop ended abnormally");
            }
        }

        self.save_offset();
        Ok(())
    }

    fn save_offset(&self) {
        let Some(store) = &self.offset_store else {
            return;
        };
        let offset = self.last_offset();
        if offset == DEFAULT_LAST_OFFSET {
            return;
        }
        match store.put(LAST_OFFSET_KEY, offset.to_string().as_bytes()) {
            Ok(()) => debug!(offset, "Saved last offset"),
            Err(e) => warn!(key = LAST_OFFSET_KEY, error = %e, "Unable to save last offset"),
        }
    }
}

#[async_trait]
impl Component for UpdateListener {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn close(&self) -> anyhow::Result<()> {
        UpdateListener::close(self).await?;
        Ok(())
    }
}

/// Reads the offset saved by a previous run. Missing or unreadable values yield
/// [`DEFAULT_LAST_OFFSET`].
pub fn load_last_offset(store: &KvStore) -> i32 {
    match store.get(LAST_OFFSET_KEY) {
        Ok(bytes) => match std::str::from_utf8(&bytes).ok().and_then(|s| s.parse().ok()) {
            Some(offset) => {
                info!(offset, "Loaded last offset");
                offset
            }
            None => {
                warn!(key = LAST_OFFSET_KEY, "Stored last offset is not a number, ignoring");
                DEFAULT_LAST_OFFSET
            }
        },
        Err(StorageError::NotFound(_)) | Err(StorageError::NilValue(_)) => DEFAULT_LAST_OFFSET,
        Err(e) => {
            warn!(key = LAST_OFFSET_KEY, error = %e, "Unable to load last offset");
            DEFAULT_LAST_OFFSET
        }
    }
}

struct Dispatcher {
    transport: Arc<dyn Transport>,
    commands: Arc<CommandTable>,
    last_offset: Arc<AtomicI32>,
    limiter: Option<Arc<Semaphore>>,
}

impl Dispatcher {
    async fn run(self, mut feed: UpdateFeed) {
        while let Some(update) = feed.recv().await {
            self.last_offset.store(update.id, Ordering::SeqCst);

            let Some(message) = update.message else {
                trace!(update_id = update.id, "Skipping non-message update");
                continue;
            };
            let Some((command, handler)) = self.commands.route(&message.content) else {
                trace!(chat_id = message.chat.id, "No command matched");
                continue;
            };
            let command = command.to_string();

            let permit = match &self.limiter {
                Some(limiter) => Arc::clone(limiter).acquire_owned().await.ok(),
                None => None,
            };
            let transport = Arc::clone(&self.transport);
            tokio::spawn(async move {
                let _permit = permit;
                respond(transport, handler, command, message).await;
            });
        }
        info!("Update feed closed, dispatch loop stopped");
    }
}

async fn respond(
    transport: Arc<dyn Transport>,
    handler: Arc<dyn Handler>,
    command: String,
    message: Message,
) {
    info!(
        command = %command,
        user_id = message.user.id,
        chat_id = message.chat.id,
        message_id = message.id,
        "Processing command"
    );
    let text = match handler.handle(&message).await {
        Ok(HandlerResponse::Reply(text)) => text,
        Ok(HandlerResponse::Ignore) => return,
        Err(e) => {
            error!(error = %e, command = %command, chat_id = message.chat.id, "Handler failed");
            return;
        }
    };

    let reply = OutgoingMessage::reply_to(&message, text);
    if let Err(e) = transport.send(&reply).await {
        error!(error = %e, chat_id = reply.chat_id, "Unable to send the message");
    }
}
