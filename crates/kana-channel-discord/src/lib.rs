//! Discord front end for kana reminders.
//!
//! Uses serenity to connect to the Discord Gateway, deliver reminders as DMs
//! and handle the bell button on each reminder.

pub mod components;
pub mod handler;
pub mod sink;

use std::sync::Arc;

use anyhow::{Context, bail};
use serenity::Client;
use serenity::all::{GatewayIntents, Http};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};

use kana_reminders::ReminderService;

pub use sink::DiscordSink;

/// REST client for `bot_token`, usable before the gateway connects.
pub fn http_client(bot_token: &str) -> Arc<Http> {
    Arc::new(Http::new(bot_token))
}

/// Gateway connection driving a [`ReminderService`].
pub struct DiscordBot {
    bot_token: String,
    service: Arc<ReminderService>,
    state: Mutex<BotState>,
}

#[derive(Default)]
struct BotState {
    client_handle: Option<JoinHandle<()>>,
    /// Serenity shard manager for graceful shutdown.
    shard_manager: Option<Arc<serenity::gateway::ShardManager>>,
}

impl DiscordBot {
    pub fn new(bot_token: String, service: Arc<ReminderService>) -> Self {
        Self {
            bot_token,
            service,
            state: Mutex::new(BotState::default()),
        }
    }

    /// Connect to the gateway. The reminder service starts on `ready`.
    pub async fn start(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;
        if state.client_handle.is_some() {
            bail!("Discord bot is already running");
        }

        let intents = GatewayIntents::GUILDS | GatewayIntents::DIRECT_MESSAGES;
        let event_handler = handler::ReminderHandler {
            service: self.service.clone(),
        };

        let mut client = Client::builder(&self.bot_token, intents)
            .event_handler(event_handler)
            .await
            .context("Failed to create Discord client")?;

        let shard_manager = client.shard_manager.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = client.start().await {
                error!("Discord client error: {e}");
            }
        });

        state.shard_manager = Some(shard_manager);
        state.client_handle = Some(handle);

        info!("Discord bot started");
        Ok(())
    }

    /// Disconnect, then stop the reminder service.
    pub async fn stop(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().await;

        if let Some(shard_manager) = state.shard_manager.take() {
            shard_manager.shutdown_all().await;
        }

        if let Some(handle) = state.client_handle.take() {
            join_client(handle).await;
        }

        self.service.shutdown().await;
        info!("Discord bot stopped");

        Ok(())
    }
}

/// Wait for the gateway task. Returns `false` (and logs) if it panicked or
/// was aborted.
async fn join_client(handle: JoinHandle<()>) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            error!("Discord client task failed: {e}");
            false
        }
    }
}
