use anyhow::{Context, Result};

use kana_livechart::LiveChartClient;
use kana_types::Event;

/// Print the titles LiveChart lists `day` days from today.
pub async fn print_schedule(day: u32, ignore_old: bool) -> Result<()> {
    let config = kana_config::load_config()?;
    let client =
        LiveChartClient::new(&config.livechart).context("Failed to build LiveChart client")?;
    let events = client
        .fetch_day(day, ignore_old)
        .await
        .context("Failed to fetch schedule")?;

    if events.is_empty() {
        println!("No titles listed for day {day}.");
        return Ok(());
    }
    for event in &events {
        println!("{}", format_event(event));
    }
    Ok(())
}

fn format_event(event: &Event) -> String {
    let episodes = if event.episodes.is_empty() {
        "-".to_string()
    } else {
        format!("EP{}", event.episodes.join("–"))
    };
    let anilist = event
        .catalog_id
        .map_or_else(|| "-".to_string(), |id| id.to_string());
    format!(
        "{}  {:<8}  {}  (anilist {anilist})",
        event.premiere_at.format("%Y-%m-%d %H:%M UTC"),
        episodes,
        event.title.romaji,
    )
}
