//! Entry points for command and button handlers.

use std::sync::Arc;

use tracing::info;

use kana_types::{CatalogId, Event, UserId};

use crate::error::Result;
use crate::known::KnownEvents;
use crate::scheduler::{PremiereScheduler, RestartReason, SchedulerState};
use crate::source::SubscriptionStore;

pub struct ReminderFacade {
    store: Arc<dyn SubscriptionStore>,
    known: KnownEvents,
    scheduler: Arc<PremiereScheduler>,
}

impl ReminderFacade {
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        known: KnownEvents,
        scheduler: Arc<PremiereScheduler>,
    ) -> Self {
        Self {
            store,
            known,
            scheduler,
        }
    }

    /// Flip `user_id`'s reminder for `catalog_id` and return the new state.
    ///
    /// Store failures are returned as-is. When the toggle affects what the
    /// scheduler should be waiting on, a restart is requested; this never
    /// waits for a delivery in flight.
    pub async fn toggle_subscription(&self, user_id: UserId, catalog_id: CatalogId) -> Result<bool> {
        let active = self.store.toggle(user_id, catalog_id).await?;
        info!(user_id, catalog_id, active, "Reminder toggled");

        let events = self.known.snapshot();
        if restart_needed(&self.scheduler.state(), &events, catalog_id) {
            self.scheduler
                .restart(RestartReason::SubscriptionToggled(catalog_id));
        }
        Ok(active)
    }

    /// Whether `user_id` currently has a reminder for `catalog_id`.
    pub async fn is_subscribed(&self, user_id: UserId, catalog_id: CatalogId) -> Result<bool> {
        self.store.is_subscribed(user_id, catalog_id).await
    }

    /// The event the scheduler is sleeping toward, if any.
    pub fn current_wait_target(&self) -> Option<Event> {
        self.scheduler.current_wait_target()
    }
}

/// A toggle for `catalog_id` needs a restart when it concerns the event in
/// focus, an event ahead of it, or any listed event while nothing is in focus.
pub fn restart_needed(state: &SchedulerState, events: &[Event], catalog_id: CatalogId) -> bool {
    let mut listed = events.iter().filter(|e| e.catalog_id == Some(catalog_id));
    match state.focus() {
        Some(focus) => {
            focus.catalog_id == Some(catalog_id)
                || listed.any(|e| e.premiere_at < focus.premiere_at)
        }
        None => listed.next().is_some(),
    }
}
