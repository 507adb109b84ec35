//! Telegram connection settings: token, optional API URL, debug flag, long-poll timeout.

use std::time::Duration;

/// Default long-poll timeout for `getUpdates`.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(60);

/// Minimal Telegram connection config.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub telegram_api_url: Option<String>,
    /// Log raw updates and outgoing requests at debug level.
    pub debug: bool,
    pub poll_timeout: Duration,
}

impl TelegramConfig {
    /// Builds a config with the given token; everything else defaulted.
    pub fn with_token(bot_token: String) -> Self {
        Self {
            bot_token,
            telegram_api_url: None,
            debug: false,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    /// HTTP timeout for the Bot API client. Must exceed the long-poll timeout or every idle
    /// `getUpdates` would fail client-side.
    pub fn http_timeout(&self) -> Duration {
        self.poll_timeout + Duration::from_secs(10)
    }
}
