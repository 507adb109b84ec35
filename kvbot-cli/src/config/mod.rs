//! App configuration: TOML file sections for the DB, Telegram, commands, messages, shutdown and
//! logging, plus environment overrides.

mod app_config;


pub use app_config::{
    resolve_config_path, AppConfig, CommandsConfig, DbConfig, LogConfig, MessagesConfig,
    ShutdownConfig, TelegramSection,
};
