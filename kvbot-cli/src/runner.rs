//! Startup wiring: store, transport, listener, then block until the shutdown sequence finishes.

use std::sync::Arc;

use anyhow::{Context, Result};
use kvbot_core::{Component, ShutdownCoordinator};
use kvbot_telegram::{load_last_offset, CommandTable, ReplyHandler, TelegramTransport, UpdateListener};
use storage::KvStore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::{AppConfig, DbConfig};

/// Command table for the configured `start` and `help` prefixes, in that order.
pub fn build_commands(config: &AppConfig) -> CommandTable {
    CommandTable::new()
        .add_command(
            config.commands.start.clone(),
            Arc::new(ReplyHandler::new(
                config.commands.start.clone(),
                config.messages.hello.clone(),
            )),
        )
        .add_command(
            config.commands.help.clone(),
            Arc::new(ReplyHandler::new(
                config.commands.help.clone(),
                config.messages.help.clone(),
            )),
        )
}

/// Runs the bot until SIGINT/SIGTERM, then closes the listener and the store in that order.
#[instrument(skip(config), fields(db = %config.db.path.display()))]
pub async fn run(config: AppConfig) -> Result<()> {
    let store = open_store(&config.db).await?;
    let last_offset = load_last_offset(&store);

    let listener = match start_listener(&config, Arc::clone(&store), last_offset).await {
        Ok(listener) => listener,
        Err(e) => {
            if let Err(close_err) = store.close().await {
                warn!(error = %close_err, "Unable to close the DB after failed startup");
            }
            return Err(e);
        }
    };

    debug!("Initiating system signal watcher");
    let components = vec![
        listener as Arc<dyn Component>,
        store as Arc<dyn Component>,
    ];
    let handle = ShutdownCoordinator::new(components)
        .with_close_timeout(config.shutdown.timeout)
        .run(CancellationToken::new())
        .context("Unable to install signal handlers")?;

    let report = handle.wait().await?;
    info!(failures = report.failures(), "Bot stopped");
    Ok(())
}

/// Opens the store on the blocking pool; waiting for a locked DB file must not stall the
/// runtime.
pub async fn open_store(db: &DbConfig) -> Result<Arc<KvStore>> {
    let path = db.path.clone();
    let timeout = db.timeout;
    let store = tokio::task::spawn_blocking(move || KvStore::open(path, timeout))
        .await
        .context("DB open task failed")?
        .context("Unable to init DB")?;
    Ok(Arc::new(store))
}

async fn start_listener(
    config: &AppConfig,
    store: Arc<KvStore>,
    last_offset: i32,
) -> Result<Arc<UpdateListener>> {
    let transport = TelegramTransport::connect(&config.telegram_config())
        .await
        .context("Unable to create bot")?;
    info!(username = ?transport.username(), "Bot created");

    let mut listener = UpdateListener::new(Arc::new(transport), build_commands(config))
        .with_poll_timeout(config.poll_timeout())
        .with_last_offset(last_offset)
        .with_offset_store(store);
    if let Some(limit) = config.telegram.max_concurrent_handlers {
        listener = listener.with_max_concurrent_handlers(limit);
    }

    info!("Starting the bot");
    listener.start().await.context("Unable to start the bot")?;
    Ok(Arc::new(listener))
}
