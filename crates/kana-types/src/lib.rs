use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat-platform user identifier.
pub type UserId = u64;

/// Canonical catalog (AniList) identifier of a title.
pub type CatalogId = i64;

pub const BELL: &str = "\u{1f514}";
pub const NO_BELL: &str = "\u{1f515}";

// ──────────────────── Event Types ────────────────────

/// Display name of a title in both scripts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventTitle {
    pub native: String,
    pub romaji: String,
}

/// One scheduled premiere of an episode (or episode range).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Identifier assigned by the schedule source.
    pub source_id: i64,
    /// Catalog id, if the source links the title to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_id: Option<CatalogId>,
    pub title: EventTitle,
    /// Episode labels, e.g. `["12"]` or `["3", "4"]` for a double release.
    #[serde(default)]
    pub episodes: Vec<String>,
    /// Release instant.
    pub premiere_at: DateTime<Utc>,
    /// Poster image URL.
    pub thumbnail: String,
}

impl Event {
    /// Identity used when comparing two event lists.
    pub fn key(&self) -> EventKey {
        match self.catalog_id {
            Some(id) => EventKey::Catalog(id),
            None => EventKey::Title(self.title.romaji.clone()),
        }
    }

    /// Whether the premiere is still ahead of `now`.
    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.premiere_at > now
    }
}

/// Identity of an event: the catalog id when known, the romanized title otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum EventKey {
    Catalog(CatalogId),
    Title(String),
}

impl std::fmt::Display for EventKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKey::Catalog(id) => write!(f, "catalog:{id}"),
            EventKey::Title(title) => write!(f, "title:{title}"),
        }
    }
}

/// How much of a refreshed list must differ before the scheduler restarts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartTrigger {
    /// Any added or removed event, or a premiere moved for a known event.
    #[default]
    Identity,
    /// Only the set of premiere instants matters.
    PremiereTime,
    /// Any field of any event.
    Exact,
}

// ──────────────────── Notification Types ────────────────────

/// What a subscriber receives when an event premieres.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderContent {
    pub catalog_id: CatalogId,
    pub title: EventTitle,
    #[serde(default)]
    pub episodes: Vec<String>,
    pub premiere_at: DateTime<Utc>,
    pub thumbnail: String,
}

impl ReminderContent {
    /// Build the notification for `event`. Events without a catalog id have no
    /// subscribers and therefore no content.
    pub fn for_event(event: &Event) -> Option<Self> {
        Some(Self {
            catalog_id: event.catalog_id?,
            title: event.title.clone(),
            episodes: event.episodes.clone(),
            premiere_at: event.premiere_at,
            thumbnail: event.thumbnail.clone(),
        })
    }

    /// One-line announcement, using a relative timestamp tag for the premiere.
    pub fn headline(&self) -> String {
        let what = if self.episodes.is_empty() {
            "A new episode".to_string()
        } else {
            format!("Episode {}", self.episodes.join(", "))
        };
        format!(
            "{BELL} {what} of {} ({}) has premiered <t:{}:R>!",
            self.title.romaji,
            self.title.native,
            self.premiere_at.timestamp()
        )
    }
}

/// Interactive control attached to each reminder: flips `user_id`'s
/// subscription to `catalog_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleControl {
    pub catalog_id: CatalogId,
    pub user_id: UserId,
}

impl ToggleControl {
    pub const PREFIX: &'static str = "kana:r_";

    pub fn new(catalog_id: CatalogId, user_id: UserId) -> Self {
        Self {
            catalog_id,
            user_id,
        }
    }

    /// Encode as a component custom id: `kana:r_<catalog>_<user>`.
    pub fn custom_id(&self) -> String {
        format!("{}{}_{}", Self::PREFIX, self.catalog_id, self.user_id)
    }

    /// Decode a custom id produced by [`ToggleControl::custom_id`]. Both ids
    /// must be plain decimal digits.
    pub fn parse(custom_id: &str) -> Option<Self> {
        let rest = custom_id.strip_prefix(Self::PREFIX)?;
        let (catalog, user) = rest.split_once('_')?;
        if !is_digits(catalog) || !is_digits(user) {
            return None;
        }
        Some(Self {
            catalog_id: catalog.parse().ok()?,
            user_id: user.parse().ok()?,
        })
    }

    /// Emoji reflecting the subscription state.
    pub fn emoji(active: bool) -> &'static str {
        if active { BELL } else { NO_BELL }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_event(catalog_id: Option<CatalogId>) -> Event {
        Event {
            source_id: 11_882,
            catalog_id,
            title: EventTitle {
                native: "葬送のフリーレン".into(),
                romaji: "Sousou no Frieren".into(),
            },
            episodes: vec!["27".into()],
            premiere_at: Utc.with_ymd_and_hms(2026, 1, 9, 14, 0, 0).unwrap(),
            thumbnail: "https://u.livechart.me/anime/11882/poster.webp".into(),
        }
    }

    #[test]
    fn test_event_key_prefers_catalog_id() {
        assert_eq!(sample_event(Some(154587)).key(), EventKey::Catalog(154587));
        assert_eq!(
            sample_event(None).key(),
            EventKey::Title("Sousou no Frieren".into())
        );
    }

    #[test]
    fn test_is_upcoming() {
        let event = sample_event(None);
        let before = event.premiere_at - chrono::Duration::minutes(1);
        assert!(event.is_upcoming(before));
        assert!(!event.is_upcoming(event.premiere_at));
    }

    #[test]
    fn test_event_serde_omits_missing_catalog_id() {
        let json = serde_json::to_string(&sample_event(None)).unwrap();
        assert!(!json.contains("catalog_id"));
        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample_event(None));
    }

    #[test]
    fn test_restart_trigger_serde() {
        let json = serde_json::to_string(&RestartTrigger::PremiereTime).unwrap();
        assert_eq!(json, "\"premiere_time\"");
        assert_eq!(RestartTrigger::default(), RestartTrigger::Identity);
    }

    #[test]
    fn test_content_requires_catalog_id() {
        assert!(ReminderContent::for_event(&sample_event(None)).is_none());
        let content = ReminderContent::for_event(&sample_event(Some(154587))).unwrap();
        assert_eq!(content.catalog_id, 154587);
    }

    #[test]
    fn test_headline_with_episodes() {
        let mut event = sample_event(Some(1));
        event.episodes = vec!["3".into(), "4".into()];
        let headline = ReminderContent::for_event(&event).unwrap().headline();
        assert_eq!(
            headline,
            format!(
                "{BELL} Episode 3, 4 of Sousou no Frieren (葬送のフリーレン) has premiered <t:{}:R>!",
                event.premiere_at.timestamp()
            )
        );
    }

    #[test]
    fn test_headline_without_episodes() {
        let mut event = sample_event(Some(1));
        event.episodes.clear();
        let headline = ReminderContent::for_event(&event).unwrap().headline();
        assert!(headline.contains("A new episode of Sousou no Frieren"));
    }

    #[test]
    fn test_toggle_control_custom_id() {
        let control = ToggleControl::new(154587, 80351110224678912);
        assert_eq!(control.custom_id(), "kana:r_154587_80351110224678912");
        assert_eq!(ToggleControl::parse(&control.custom_id()), Some(control));
    }

    #[test]
    fn test_toggle_control_rejects_foreign_ids() {
        assert_eq!(ToggleControl::parse("kana:animanga_relations"), None);
        assert_eq!(ToggleControl::parse("kana:r_abc_1"), None);
        assert_eq!(ToggleControl::parse("kana:r_1"), None);
        assert_eq!(ToggleControl::parse("other:r_1_2"), None);
    }

    #[test]
    fn test_toggle_control_rejects_signed_ids() {
        assert_eq!(ToggleControl::parse("kana:r_-5_1"), None);
        assert_eq!(ToggleControl::parse("kana:r_+5_1"), None);
        assert_eq!(ToggleControl::parse("kana:r_5_+1"), None);
        assert_eq!(ToggleControl::parse("kana:r_5_"), None);
        assert_eq!(ToggleControl::parse("kana:r_5_1"), Some(ToggleControl::new(5, 1)));
    }

    #[test]
    fn test_toggle_emoji() {
        assert_eq!(ToggleControl::emoji(true), BELL);
        assert_eq!(ToggleControl::emoji(false), NO_BELL);
    }
}
