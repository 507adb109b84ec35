//! # kvbot-cli
//!
//! Binary support: argument parsing, config loading, startup wiring.

pub mod cli;
pub mod config;
pub mod runner;

pub use cli::Cli;
pub use config::AppConfig;
pub use runner::{build_commands, run};
