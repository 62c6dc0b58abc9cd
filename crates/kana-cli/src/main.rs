mod run;
mod schedule;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use kana_storage::KanaStorage;

#[derive(Parser)]
#[command(name = "kana", about = "Anime premiere reminder bot")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and send premiere reminders
    Run {
        /// Config file (defaults to ~/.kana/config.json5)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Print the titles LiveChart lists for a day
    Schedule {
        /// Days from today (0 = today)
        #[arg(short, long, default_value_t = 0)]
        day: u32,

        /// Include titles that already premiered
        #[arg(long)]
        all: bool,
    },
    /// Flip a user's reminder for an AniList id in the local database
    Toggle {
        /// Discord user id
        #[arg(short, long)]
        user: u64,

        /// AniList id
        #[arg(short, long)]
        anime: i64,
    },
    /// Check configuration
    Health,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run::run_bot(config))?;
        }
        Commands::Schedule { day, all } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(schedule::print_schedule(day, !all))?;
        }
        Commands::Toggle { user, anime } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(async {
                let config = kana_config::load_config()?;
                let storage = KanaStorage::open(&run::prepare_db_path(&config)?)
                    .context("Failed to open subscription database")?;
                if storage.toggle(user, anime).await? {
                    println!("Reminder set for user {user} on AniList id {anime}.");
                } else {
                    println!("Reminder removed for user {user} on AniList id {anime}.");
                }
                anyhow::Ok(())
            })?;
        }
        Commands::Health => {
            println!("kana is healthy");
            let config = kana_config::load_config().unwrap_or_default();
            if let Ok(path) = kana_config::config_file_path() {
                println!("  config file: {}", path.display());
            }
            match config.db_path() {
                Ok(path) => println!("  database: {}", path.display()),
                Err(e) => println!("  database: unresolved ({e})"),
            }
            println!(
                "  bot token: {}",
                if config.bot_token().is_some() {
                    "configured"
                } else {
                    "missing"
                }
            );
            println!("  schedule: {}", config.livechart.schedule_url);
            println!(
                "  refresh interval: {}s",
                config.reminders.refresh_interval_secs
            );
            println!("  restart trigger: {:?}", config.reminders.restart_trigger);
        }
    }

    Ok(())
}
