use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use kana_channel_discord::{DiscordBot, DiscordSink, http_client};
use kana_config::KanaConfig;
use kana_livechart::LiveChartClient;
use kana_reminders::{RefreshPolicy, ReminderService};
use kana_storage::KanaStorage;

/// Resolve the database path and make sure its directory exists.
pub fn prepare_db_path(config: &KanaConfig) -> Result<PathBuf> {
    let path = config.db_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    Ok(path)
}

/// Run the bot until Ctrl-C.
pub async fn run_bot(config_path: Option<PathBuf>) -> Result<()> {
    let config = match config_path {
        Some(path) => kana_config::load_config_from(&path)?,
        None => kana_config::load_config()?,
    };
    let token = config.bot_token().with_context(|| {
        format!(
            "No Discord bot token: set {} or discord.bot_token",
            kana_config::TOKEN_ENV
        )
    })?;

    let storage = Arc::new(
        KanaStorage::open(&prepare_db_path(&config)?)
            .context("Failed to open subscription database")?,
    );
    let source = Arc::new(
        LiveChartClient::new(&config.livechart).context("Failed to build LiveChart client")?,
    );
    let sink = Arc::new(DiscordSink::new(http_client(&token)));
    let service = Arc::new(ReminderService::new(
        source,
        storage,
        sink,
        RefreshPolicy::from(&config.reminders),
    ));

    let bot = DiscordBot::new(token, service);
    bot.start().await?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Shutting down");

    bot.stop().await
}
