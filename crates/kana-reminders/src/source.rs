//! Collaborator interfaces: where events come from, who is subscribed, and
//! how reminders reach a user.

use async_trait::async_trait;

use kana_types::{CatalogId, Event, ReminderContent, UserId};

use crate::error::Result;

/// Time-ordered feed of upcoming premieres, organised by calendar day.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Events for the day `offset` days from today (0 = today), sorted by
    /// premiere. With `ignore_old`, premieres already in the past are dropped.
    /// A day with no events is `Ok(vec![])`, not an error.
    async fn fetch_events_for_day(&self, offset: u32, ignore_old: bool) -> Result<Vec<Event>>;

    /// Every day the source can serve from a single request, today first,
    /// or `None` when it only answers one day at a time.
    async fn fetch_all_days(&self, _ignore_old: bool) -> Result<Option<Vec<Vec<Event>>>> {
        Ok(None)
    }

    /// Release any held session. Called once at shutdown.
    async fn close(&self) {}
}

/// Persistent (user, catalog id) interest pairs.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Flip the subscription and return the new state.
    async fn toggle(&self, user_id: UserId, catalog_id: CatalogId) -> Result<bool>;

    async fn is_subscribed(&self, user_id: UserId, catalog_id: CatalogId) -> Result<bool>;

    async fn count_subscribers(&self, catalog_id: CatalogId) -> Result<u64>;

    async fn list_subscriber_ids(&self, catalog_id: CatalogId) -> Result<Vec<UserId>>;
}

/// Delivers a rendered reminder to one user.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, user_id: UserId, content: &ReminderContent) -> Result<()>;
}
