//! In-memory collaborators for tests.

use std::collections::{BTreeSet, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::watch;

use kana_types::{CatalogId, Event, EventTitle, ReminderContent, UserId};

use crate::error::{ReminderError, Result};
use crate::source::{EventSource, NotificationSink, SubscriptionStore};

/// Event premiering `minutes` after a fixed reference instant.
pub fn event_at(catalog_id: Option<CatalogId>, title: &str, minutes: i64) -> Event {
    let base = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
    event_from(base, catalog_id, title, minutes)
}

/// Event premiering `minutes` after `base`.
pub fn event_from(
    base: DateTime<Utc>,
    catalog_id: Option<CatalogId>,
    title: &str,
    minutes: i64,
) -> Event {
    Event {
        source_id: catalog_id.unwrap_or(0) + 10_000,
        catalog_id,
        title: EventTitle {
            native: format!("{title} (native)"),
            romaji: title.to_string(),
        },
        episodes: vec!["1".into()],
        premiere_at: base + Duration::minutes(minutes),
        thumbnail: format!("https://example.invalid/{title}.webp"),
    }
}

/// Serves canned days; records which offsets were requested. In whole-page
/// mode every day comes back from one request instead.
#[derive(Default)]
pub struct FakeSource {
    days: Mutex<Vec<Vec<Event>>>,
    calls: Mutex<Vec<u32>>,
    page_fetches: AtomicUsize,
    whole_page: AtomicBool,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl FakeSource {
    pub fn new(days: Vec<Vec<Event>>) -> Self {
        let source = Self::default();
        source.set_days(days);
        source
    }

    pub fn set_days(&self, days: Vec<Vec<Event>>) {
        *self.days.lock().unwrap() = days;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn serve_whole_page(&self, whole: bool) {
        self.whole_page.store(whole, Ordering::SeqCst);
    }

    pub fn page_fetches(&self) -> usize {
        self.page_fetches.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl FakeSource {
    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReminderError::source_unavailable(std::io::Error::other(
                "schedule page returned 503",
            )));
        }
        Ok(())
    }
}

fn upcoming_only(day: Vec<Event>, ignore_old: bool) -> Vec<Event> {
    let now = Utc::now();
    day.into_iter()
        .filter(|e| !ignore_old || e.is_upcoming(now))
        .collect()
}

#[async_trait]
impl EventSource for FakeSource {
    async fn fetch_events_for_day(&self, offset: u32, ignore_old: bool) -> Result<Vec<Event>> {
        self.calls.lock().unwrap().push(offset);
        self.check()?;
        let day = self
            .days
            .lock()
            .unwrap()
            .get(offset as usize)
            .cloned()
            .unwrap_or_default();
        Ok(upcoming_only(day, ignore_old))
    }

    async fn fetch_all_days(&self, ignore_old: bool) -> Result<Option<Vec<Vec<Event>>>> {
        if !self.whole_page.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.page_fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let days = self.days.lock().unwrap().clone();
        Ok(Some(
            days.into_iter()
                .map(|day| upcoming_only(day, ignore_old))
                .collect(),
        ))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Subscription rows held in memory.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<BTreeSet<(CatalogId, UserId)>>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn with_rows(rows: &[(CatalogId, UserId)]) -> Self {
        let store = Self::default();
        store.rows.lock().unwrap().extend(rows.iter().copied());
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReminderError::store(std::io::Error::other(
                "connection pool exhausted",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn toggle(&self, user_id: UserId, catalog_id: CatalogId) -> Result<bool> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.remove(&(catalog_id, user_id)) {
            Ok(false)
        } else {
            rows.insert((catalog_id, user_id));
            Ok(true)
        }
    }

    async fn is_subscribed(&self, user_id: UserId, catalog_id: CatalogId) -> Result<bool> {
        self.check()?;
        Ok(self.rows.lock().unwrap().contains(&(catalog_id, user_id)))
    }

    async fn count_subscribers(&self, catalog_id: CatalogId) -> Result<u64> {
        Ok(self.list_subscriber_ids(catalog_id).await?.len() as u64)
    }

    async fn list_subscriber_ids(&self, catalog_id: CatalogId) -> Result<Vec<UserId>> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| *c == catalog_id)
            .map(|(_, u)| *u)
            .collect())
    }
}

/// One recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub user_id: UserId,
    pub catalog_id: CatalogId,
    /// Paused-clock instant of delivery.
    pub at: tokio::time::Instant,
}

/// Records deliveries; users in the unreachable set fail.
pub struct RecordingSink {
    sent: Mutex<Vec<Sent>>,
    unreachable: Mutex<HashSet<UserId>>,
    delay: Mutex<std::time::Duration>,
    count: watch::Sender<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            unreachable: Mutex::new(HashSet::new()),
            delay: Mutex::new(std::time::Duration::ZERO),
            count: watch::channel(0).0,
        }
    }

    pub fn make_unreachable(&self, user_id: UserId) {
        self.unreachable.lock().unwrap().insert(user_id);
    }

    /// Make every send take `delay`, like a rate-limited chat API.
    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    /// Resolves once at least `n` deliveries have been attempted.
    pub async fn wait_for(&self, n: usize) {
        let mut rx = self.count.subscribe();
        rx.wait_for(|c| *c >= n).await.unwrap();
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, user_id: UserId, content: &ReminderContent) -> Result<()> {
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let result = if self.unreachable.lock().unwrap().contains(&user_id) {
            Err(ReminderError::delivery(
                user_id,
                "Cannot send messages to this user",
            ))
        } else {
            self.sent.lock().unwrap().push(Sent {
                user_id,
                catalog_id: content.catalog_id,
                at: tokio::time::Instant::now(),
            });
            Ok(())
        };
        self.count.send_modify(|c| *c += 1);
        result
    }
}
