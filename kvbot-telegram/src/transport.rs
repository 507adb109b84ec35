//! Wraps teloxide::Bot and implements [`kvbot_core::Transport`] with a `getUpdates` long-poll loop.
//! Production code talks to the Bot API; tests substitute another Transport impl.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use kvbot_core::{BotError, OutgoingMessage, Result, ToCoreUpdate, Transport, UpdateFeed};
use teloxide::payloads::setters::*;
use teloxide::prelude::*;
use teloxide::requests::Request;
use teloxide::types::{ChatId, MessageId, ParseMode, ReplyParameters};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::adapters::TelegramUpdateWrapper;
use crate::config::TelegramConfig;

/// Capacity of the update feed between the poll loop and the listener.
const UPDATE_BUFFER: usize = 100;

/// Pause before retrying after a failed `getUpdates`.
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(3);

/// Telegram Bot API transport. One subscription per instance.
pub struct TelegramTransport {
    bot: teloxide::Bot,
    username: Option<String>,
    debug: bool,
    stop: CancellationToken,
    subscribed: AtomicBool,
}

impl TelegramTransport {
    /// Builds the API client and checks the token with `getMe`.
    #[instrument(skip(config), fields(debug = config.debug))]
    pub async fn connect(config: &TelegramConfig) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| BotError::Transport(format!("unable to build HTTP client: {}", e)))?;
        let mut bot = teloxide::Bot::with_client(config.bot_token.clone(), client);

        if let Some(url_str) = &config.telegram_api_url {
            let url = reqwest::Url::parse(url_str).map_err(|e| {
                BotError::Config(format!("invalid Telegram API URL '{}': {}", url_str, e))
            })?;
            info!(api_url = %url, "Using custom Telegram API URL");
            bot = bot.set_api_url(url);
        }

        let me = bot
            .get_me()
            .await
            .map_err(|e| BotError::Transport(format!("unable to connect to Telegram: {}", e)))?;
        let username = me.user.username.clone();
        info!(username = ?username, "Authorized on account");

        Ok(Self {
            bot,
            username,
            debug: config.debug,
            stop: CancellationToken::new(),
            subscribed: AtomicBool::new(false),
        })
    }

    /// Bot username reported by `getMe`.
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn subscribe(&self, offset: i32, poll_timeout: Duration) -> Result<UpdateFeed> {
        if self.stop.is_cancelled() {
            return Err(BotError::Subscribe("transport already stopped".to_string()));
        }
        if self.subscribed.swap(true, Ordering::SeqCst) {
            return Err(BotError::Subscribe("already receiving updates".to_string()));
        }

        let (tx, rx) = mpsc::channel(UPDATE_BUFFER);
        let poller = Poller {
            bot: self.bot.clone(),
            tx,
            offset,
            timeout_secs: u32::try_from(poll_timeout.as_secs()).unwrap_or(u32::MAX),
            debug: self.debug,
            stop: self.stop.clone(),
        };
        info!(offset, timeout_secs = poller.timeout_secs, "Receiving updates");
        tokio::spawn(poller.run());
        Ok(rx)
    }

    async fn send(&self, message: &OutgoingMessage) -> Result<()> {
        let mut request = self
            .bot
            .send_message(ChatId(message.chat_id), message.text.clone());
        if let Some(id) = message.reply_to_message_id {
            request = request.reply_parameters(ReplyParameters::new(MessageId(id)));
        }
        if message.markdown {
            request = request.parse_mode(ParseMode::Markdown);
        }
        if self.debug {
            debug!(
                chat_id = message.chat_id,
                reply_to = ?message.reply_to_message_id,
                text = %message.text,
                "Sending message"
            );
        }

        request
            .await
            .map_err(|e| BotError::Send(e.to_string()))?;
        Ok(())
    }

    fn stop_receiving_updates(&self) {
        if !self.stop.is_cancelled() {
            info!("Stopping receiving updates");
        }
        self.stop.cancel();
    }
}

/// Long-poll loop feeding one subscription.
struct Poller {
    bot: teloxide::Bot,
    tx: mpsc::Sender<kvbot_core::Update>,
    offset: i32,
    timeout_secs: u32,
    debug: bool,
    stop: CancellationToken,
}

impl Poller {
    async fn run(mut self) {
        loop {
            let request = self
                .bot
                .get_updates()
                .offset(self.offset)
                .timeout(self.timeout_secs);
            let result = tokio::select! {
                _ = self.stop.cancelled() => break,
                result = request.send() => result,
            };

            match result {
                Ok(updates) => {
                    for update in updates {
                        if self.debug {
                            debug!(update = ?update, "Received update");
                        }
                        let update = TelegramUpdateWrapper(&update).to_core();
                        self.offset = update.next_offset();
                        if self.tx.send(update).await.is_err() {
                            debug!("Update feed dropped");
                            return;
                        }
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to get updates, retrying in 3 seconds");
                    tokio::select! {
                        _ = self.stop.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_PAUSE) => {}
                    }
                }
            }
        }
        info!(offset = self.offset, "Stopped receiving updates");
    }
}
