//! AppConfig: deserialized from TOML, then overridden from the environment and validated.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use kvbot_core::DEFAULT_CLOSE_TIMEOUT;
use kvbot_telegram::TelegramConfig;
use serde::Deserialize;

const CONFIG_EXTENSION: &str = "toml";
const CONFIG_DIR: &str = "config";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub db: DbConfig,
    pub telegram: TelegramSection,
    #[serde(default)]
    pub commands: CommandsConfig,
    pub messages: MessagesConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub path: PathBuf,
    /// File lock wait on open and close bound.
    #[serde(default = "default_db_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramSection {
    /// Bot token; `BOT_TOKEN` overrides it.
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub debug: bool,
    /// Long-poll timeout in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub timeout: u64,
    /// Custom Bot API server; `TELEGRAM_API_URL` / `TELOXIDE_API_URL` override it.
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub max_concurrent_handlers: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommandsConfig {
    #[serde(default = "default_start_command")]
    pub start: String,
    #[serde(default = "default_help_command")]
    pub help: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            start: default_start_command(),
            help: default_help_command(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesConfig {
    pub hello: String,
    pub help: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// Per-component close bound.
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout: default_shutdown_timeout(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Append log lines to this file as well as stdout.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_db_timeout() -> Duration {
    storage::DEFAULT_TIMEOUT
}

fn default_poll_timeout_secs() -> u64 {
    kvbot_telegram::DEFAULT_POLL_TIMEOUT.as_secs()
}

fn default_start_command() -> String {
    "/start".to_string()
}

fn default_help_command() -> String {
    "/help".to_string()
}

fn default_shutdown_timeout() -> Duration {
    DEFAULT_CLOSE_TIMEOUT
}

impl AppConfig {
    /// Resolves `name` (see [`resolve_config_path`]), parses it, applies env overrides and
    /// validates the result.
    pub fn load(name: &str) -> Result<Self> {
        let path = resolve_config_path(name, Path::new("."))
            .with_context(|| format!("Config file not found: {}", name))?;
        Self::load_file(&path)
    }

    /// Parses the file at `path`, applies env overrides and validates.
    pub fn load_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config file {}", path.display()))?;
        let mut config = Self::parse(&contents)
            .with_context(|| format!("Unable to parse config file {}", path.display()))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parses TOML only; no overrides, no validation.
    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(token) = env::var("BOT_TOKEN") {
            if !token.is_empty() {
                self.telegram.token = token;
            }
        }
        if let Ok(url) = env::var("TELEGRAM_API_URL").or_else(|_| env::var("TELOXIDE_API_URL")) {
            self.telegram.api_url = Some(url);
        }
    }

    /// Rejects configs the bot cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.trim().is_empty() {
            anyhow::bail!("telegram.token is empty (set it in the config file or BOT_TOKEN)");
        }
        if self.commands.start.is_empty() || self.commands.help.is_empty() {
            anyhow::bail!("commands.start and commands.help must not be empty");
        }
        if let Some(ref url_str) = self.telegram.api_url {
            if reqwest::Url::parse(url_str).is_err() {
                anyhow::bail!(
                    "telegram.api_url (or TELEGRAM_API_URL / TELOXIDE_API_URL) is not a valid URL: {}",
                    url_str
                );
            }
        }
        if self.telegram.max_concurrent_handlers == Some(0) {
            anyhow::bail!("telegram.max_concurrent_handlers must be greater than 0");
        }
        Ok(())
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.telegram.timeout)
    }

    /// Connection settings for the Telegram transport.
    pub fn telegram_config(&self) -> TelegramConfig {
        TelegramConfig {
            bot_token: self.telegram.token.clone(),
            telegram_api_url: self.telegram.api_url.clone(),
            debug: self.telegram.debug,
            poll_timeout: self.poll_timeout(),
        }
    }
}

/// Finds the config file for `name`: `name` itself if it is a file, otherwise
/// `<base>/<name>.toml`, then `<base>/config/<name>.toml`.
pub fn resolve_config_path(name: &str, base: &Path) -> Option<PathBuf> {
    let direct = PathBuf::from(name);
    if direct.is_file() {
        return Some(direct);
    }

    let file_name = format!("{}.{}", name, CONFIG_EXTENSION);
    [base.join(&file_name), base.join(CONFIG_DIR).join(&file_name)]
        .into_iter()
        .find(|candidate| candidate.is_file())
}
