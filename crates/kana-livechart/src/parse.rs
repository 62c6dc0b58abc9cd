//! Extraction of events from the full-layout schedule page.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use kana_types::{Event, EventTitle};

use crate::error::{LiveChartError, Result};

const ANILIST_PREFIX: &str = "https://anilist.co/anime/";
const NO_THUMBNAIL: &str = "N/A";

static DAY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<div\b[^>]*\bdata-controller\s*=\s*"schedule-day"[^>]*>"#).unwrap()
});
static ARTICLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<article\b([^>]*)>(.*?)</article>").unwrap());
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(a|img|div|time)\b([^>]*)>").unwrap());
static SPAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<span\b[^>]*>(.*?)</span>").unwrap());
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][-A-Za-z0-9_:.]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap()
});
static MARKUP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[A-Za-z]+);").unwrap());

/// Events listed for the day `offset` days from today, sorted by premiere.
///
/// A page without any day blocks is malformed. An offset past the last day,
/// or a day without cards, yields an empty list.
pub fn parse_day(html: &str, offset: usize) -> Result<Vec<Event>> {
    let days = day_blocks(html);
    if days.is_empty() {
        return Err(LiveChartError::Malformed("no schedule days found".into()));
    }
    Ok(days.get(offset).copied().map(parse_cards).unwrap_or_default())
}

/// Every day block on the page, in page order.
pub fn parse_schedule(html: &str) -> Result<Vec<Vec<Event>>> {
    let days = day_blocks(html);
    if days.is_empty() {
        return Err(LiveChartError::Malformed("no schedule days found".into()));
    }
    Ok(days.into_iter().map(parse_cards).collect())
}

fn day_blocks(html: &str) -> Vec<&str> {
    let starts: Vec<_> = DAY_RE.find_iter(html).collect();
    starts
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let end = starts.get(i + 1).map_or(html.len(), |next| next.start());
            &html[m.end()..end]
        })
        .collect()
}

fn parse_cards(day: &str) -> Vec<Event> {
    let mut events: Vec<Event> = ARTICLE_RE
        .captures_iter(day)
        .filter_map(|cap| {
            let attrs = attributes(&cap[1]);
            if !has_class(&attrs, "lc-anime")
                || attrs.get("data-controller").map(String::as_str) != Some("anime-card")
            {
                return None;
            }
            let event = parse_card(&attrs, &cap[2]);
            if event.is_none() {
                warn!(
                    anime_id = attrs.get("data-anime-id").map(String::as_str),
                    "Skipping anime card without a usable id"
                );
            }
            event
        })
        .collect();
    events.sort_by_key(|e| e.premiere_at);
    events
}

fn parse_card(attrs: &HashMap<String, String>, body: &str) -> Option<Event> {
    let source_id = attrs.get("data-anime-id")?.trim().parse().ok()?;
    let title = EventTitle {
        native: attrs.get("data-native").cloned().unwrap_or_default(),
        romaji: attrs.get("data-romaji").cloned().unwrap_or_default(),
    };

    let mut catalog_id = None;
    let mut thumbnail = None;
    let mut has_overlay = false;
    let mut premiere_at = None;

    for cap in TAG_RE.captures_iter(body) {
        let tag = attributes(&cap[2]);
        match &cap[1] {
            "a" if catalog_id.is_none()
                && has_class(&tag, "lc-anime-card--related-links--icon")
                && has_class(&tag, "anilist") =>
            {
                catalog_id = tag
                    .get("href")
                    .and_then(|href| href.strip_prefix(ANILIST_PREFIX))
                    .and_then(|id| id.trim_end_matches('/').parse().ok());
            }
            "img" if thumbnail.is_none() => thumbnail = tag.get("src").cloned(),
            "div" if has_class(&tag, "lc-anime-card--poster-overlays") => has_overlay = true,
            "time"
                if premiere_at.is_none()
                    && tag.get("data-controller").map(String::as_str) == Some("countdown") =>
            {
                premiere_at = tag
                    .get("data-timestamp")
                    .and_then(|ts| ts.trim().parse::<i64>().ok())
                    .and_then(|ts| DateTime::from_timestamp(ts, 0));
            }
            _ => {}
        }
    }

    let episodes = if has_overlay {
        SPAN_RE
            .captures(body)
            .map(|cap| episode_labels(&text_content(&cap[1])))
            .unwrap_or_default()
    } else {
        Vec::new()
    };

    Some(Event {
        source_id,
        catalog_id,
        title,
        episodes,
        premiere_at: premiere_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        thumbnail: thumbnail.unwrap_or_else(|| NO_THUMBNAIL.to_string()),
    })
}

/// "EP11–12" becomes ["11", "12"].
fn episode_labels(text: &str) -> Vec<String> {
    let text = text.trim();
    text.strip_prefix("EP")
        .unwrap_or(text)
        .split('–')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn attributes(raw: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(raw)
        .map(|cap| {
            let value = cap.get(2).or_else(|| cap.get(3)).map_or("", |m| m.as_str());
            (cap[1].to_ascii_lowercase(), decode_entities(value))
        })
        .collect()
}

fn has_class(attrs: &HashMap<String, String>, class: &str) -> bool {
    attrs
        .get("class")
        .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
}

fn text_content(html: &str) -> String {
    decode_entities(&MARKUP_RE.replace_all(html, ""))
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |cap: &Captures| {
            let entity = &cap[1];
            let decoded = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse().ok().and_then(char::from_u32)
            } else {
                match entity {
                    "amp" => Some('&'),
                    "lt" => Some('<'),
                    "gt" => Some('>'),
                    "quot" => Some('"'),
                    "apos" => Some('\''),
                    "nbsp" => Some('\u{a0}'),
                    "ndash" => Some('–'),
                    _ => None,
                }
            };
            decoded.map_or_else(|| cap[0].to_string(), String::from)
        })
        .into_owned()
}
