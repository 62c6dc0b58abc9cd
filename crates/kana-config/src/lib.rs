use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kana_types::RestartTrigger;

/// Environment variable that overrides `discord.bot_token`.
pub const TOKEN_ENV: &str = "KANA_DISCORD_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON5 parse error: {0}")]
    Json5(#[from] json5::Error),
    #[error("Config directory not found")]
    NoDirFound,
}

/// Discord connection settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token. `KANA_DISCORD_TOKEN` takes precedence when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,
}

/// Schedule scraping settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveChartConfig {
    #[serde(default = "default_schedule_url")]
    pub schedule_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attempts made when the site answers 429.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_schedule_url() -> String {
    "https://www.livechart.me/schedule?layout=full".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_user_agent() -> String {
    concat!("kana/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for LiveChartConfig {
    fn default() -> Self {
        Self {
            schedule_url: default_schedule_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            user_agent: default_user_agent(),
        }
    }
}

/// Premiere reminder tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Seconds between schedule refreshes.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Later days are fetched while at most this many upcoming events are known.
    #[serde(default = "default_min_upcoming")]
    pub min_upcoming: usize,
    /// Furthest day offset the fallback fetches (0 = today).
    #[serde(default = "default_max_day_offset")]
    pub max_day_offset: u32,
    /// Which list changes restart the premiere wait.
    #[serde(default)]
    pub restart_trigger: RestartTrigger,
}

fn default_refresh_interval_secs() -> u64 {
    3600
}

fn default_min_upcoming() -> usize {
    3
}

fn default_max_day_offset() -> u32 {
    2
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            min_upcoming: default_min_upcoming(),
            max_day_offset: default_max_day_offset(),
            restart_trigger: RestartTrigger::default(),
        }
    }
}

/// Subscription database settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file. Defaults to `~/.kana/kana.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

/// Top-level kana configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KanaConfig {
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub livechart: LiveChartConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl KanaConfig {
    /// The bot token, preferring the environment over the file.
    pub fn bot_token(&self) -> Option<String> {
        std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.is_empty())
            .or_else(|| self.discord.bot_token.clone())
    }

    /// Resolved database path.
    pub fn db_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.storage.db_path {
            Some(path) => Ok(path.clone()),
            None => Ok(config_dir()?.join("kana.db")),
        }
    }
}

/// Resolve the kana config directory (~/.kana/).
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|h| h.join(".kana"))
        .ok_or(ConfigError::NoDirFound)
}

/// Resolve the config file path (~/.kana/config.json5).
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json5"))
}

/// Load configuration from the default path, falling back to defaults.
pub fn load_config() -> Result<KanaConfig, ConfigError> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let path = config_file_path()?;
    load_config_from(&path)
}

/// Load configuration from a specific path, falling back to defaults if not found.
pub fn load_config_from(path: &Path) -> Result<KanaConfig, ConfigError> {
    if !path.exists() {
        tracing::debug!("Config file not found at {}, using defaults", path.display());
        return Ok(KanaConfig::default());
    }

    let content = std::fs::read_to_string(path)?;
    let config: KanaConfig = json5::from_str(&content)?;
    Ok(config)
}

/// Ensure the config directory exists.
pub fn ensure_config_dir() -> Result<PathBuf, ConfigError> {
    let dir = config_dir()?;
    if !dir.exists() {
        std::fs::create_dir_all(&dir)?;
    }
    Ok(dir)
}

/// Save configuration to the default path.
pub fn save_config(config: &KanaConfig) -> Result<(), ConfigError> {
    let dir = ensure_config_dir()?;
    let path = dir.join("config.json5");
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ConfigError::Io(std::io::Error::other(e)))?;
    std::fs::write(path, content)?;
    Ok(())
}
