//! kvbot: answers `start` and `help` commands over Telegram long polling; shuts down cleanly on
//! SIGINT/SIGTERM.

use anyhow::Result;
use clap::{CommandFactory, Parser};
use kvbot_cli::{run, AppConfig, Cli};
use kvbot_core::{init_tracing, parse_level};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.config.is_empty() {
        Cli::command().print_help()?;
        std::process::exit(1);
    }

    let level = match parse_level(&cli.log_level) {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Unable to parse log level: {}", e);
            std::process::exit(1);
        }
    };

    // Log file comes from the config, which is not parsed yet; read it first, then set up
    // tracing once.
    let config = AppConfig::load(&cli.config);
    let log_file = config.as_ref().ok().and_then(|c| c.log.file.clone());
    init_tracing(level, log_file.as_deref())?;

    info!("Starting the bot");
    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Unable to parse config");
            std::process::exit(1);
        }
    };
    info!("Config parsed");

    if let Err(e) = run(config).await {
        error!(error = %format!("{:#}", e), "Bot failed");
        std::process::exit(1);
    }
    Ok(())
}
