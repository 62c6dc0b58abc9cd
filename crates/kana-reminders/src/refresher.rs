//! Keeps the Known Event List fresh and signals the scheduler on change.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kana_config::ReminderConfig;
use kana_types::{Event, RestartTrigger};

use crate::diff::requires_restart;
use crate::error::Result;
use crate::known::KnownEvents;
use crate::scheduler::{PremiereScheduler, RestartReason};
use crate::source::EventSource;

/// Refresh cadence and fallback tuning.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    pub interval: Duration,
    /// Later days are fetched while at most this many upcoming events are known.
    pub min_upcoming: usize,
    /// Furthest day offset fetched.
    pub max_day_offset: u32,
    pub restart_trigger: RestartTrigger,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::from(&ReminderConfig::default())
    }
}

impl From<&ReminderConfig> for RefreshPolicy {
    fn from(config: &ReminderConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.refresh_interval_secs.max(1)),
            min_upcoming: config.min_upcoming,
            max_day_offset: config.max_day_offset,
            restart_trigger: config.restart_trigger,
        }
    }
}

/// Result of one successful refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshOutcome {
    /// Upcoming events now known.
    pub fetched: usize,
    /// Schedule days the list was built from.
    pub days: u32,
    /// Whether the scheduler was restarted.
    pub changed: bool,
}

pub struct TitleRefresher {
    source: Arc<dyn EventSource>,
    known: KnownEvents,
    scheduler: Arc<PremiereScheduler>,
    policy: RefreshPolicy,
}

impl TitleRefresher {
    pub fn new(
        source: Arc<dyn EventSource>,
        known: KnownEvents,
        scheduler: Arc<PremiereScheduler>,
        policy: RefreshPolicy,
    ) -> Self {
        Self {
            source,
            known,
            scheduler,
            policy,
        }
    }

    /// Gather upcoming events, reaching into later days while too few remain
    /// today. Returns the sorted events and the number of days used.
    ///
    /// A source that serves the whole schedule at once is asked once per
    /// refresh; otherwise later days are requested only when needed.
    pub async fn collect(&self) -> Result<(Vec<Event>, u32)> {
        let now = Utc::now();
        let mut whole = self.source.fetch_all_days(true).await?;
        let mut events: Vec<Event> = Vec::new();
        let mut days = 0;

        for offset in 0..=self.policy.max_day_offset {
            if offset > 0 && events.len() > self.policy.min_upcoming {
                break;
            }
            let day = match whole.as_mut() {
                Some(all) => all
                    .get_mut(offset as usize)
                    .map(std::mem::take)
                    .unwrap_or_default(),
                None => self.source.fetch_events_for_day(offset, true).await?,
            };
            debug!(offset, count = day.len(), "Collected schedule day");
            days += 1;
            events.extend(day.into_iter().filter(|e| e.is_upcoming(now)));
        }

        events.sort_by_key(|e| e.premiere_at);
        Ok((events, days))
    }

    /// Fetch, replace the Known Event List, and restart the scheduler if the
    /// list materially changed. On error the previous list is left untouched.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let (events, days) = self.collect().await?;
        let fetched = events.len();

        let previous = self.known.replace(events);
        let current = self.known.snapshot();
        let changed = requires_restart(&previous, &current, self.policy.restart_trigger);

        info!(days, changed, "Fetched {fetched} titles.");
        if changed {
            self.scheduler.restart(RestartReason::ListChanged);
        }

        Ok(RefreshOutcome {
            fetched,
            days,
            changed,
        })
    }

    /// Refresh immediately, then on every interval until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            interval_secs = self.policy.interval.as_secs(),
            "Title refresher started"
        );
        let mut interval = tokio::time::interval(self.policy.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.refresh() => {
                    if let Err(e) = result {
                        warn!(
                            known = self.known.len(),
                            "Schedule refresh failed, keeping previous list: {e}"
                        );
                    }
                }
            }
        }

        info!("Title refresher stopped");
    }
}
