//! Premiere scheduler: one cancellable pass over the Known Event List that
//! sleeps until each subscribed premiere and delivers the reminders.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use kana_types::{CatalogId, Event, EventKey, ReminderContent};

use crate::error::Result;
use crate::known::KnownEvents;
use crate::source::{NotificationSink, SubscriptionStore};

/// Where the scheduler currently is in its pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SchedulerState {
    /// No pass running.
    #[default]
    Idle,
    /// Looking for the next event with subscribers.
    Scanning,
    /// Sleeping until this event premieres.
    Waiting(Event),
    /// Sending reminders for this event.
    Delivering(Event),
}

impl SchedulerState {
    /// The event being waited on or delivered, if any.
    pub fn focus(&self) -> Option<&Event> {
        match self {
            SchedulerState::Waiting(event) | SchedulerState::Delivering(event) => Some(event),
            SchedulerState::Idle | SchedulerState::Scanning => None,
        }
    }
}

/// Why a restart was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartReason {
    ListChanged,
    SubscriptionToggled(CatalogId),
}

impl std::fmt::Display for RestartReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartReason::ListChanged => write!(f, "known event list changed"),
            RestartReason::SubscriptionToggled(id) => {
                write!(f, "subscription toggled for catalog id {id}")
            }
        }
    }
}

/// Outcome of one event's delivery.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

struct RunningPass {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns the single wait loop. External callers only start, cancel or restart
/// it and read its state.
pub struct PremiereScheduler {
    shared: Arc<Shared>,
    running: Arc<Mutex<Option<RunningPass>>>,
}

struct Shared {
    known: KnownEvents,
    store: Arc<dyn SubscriptionStore>,
    sink: Arc<dyn NotificationSink>,
    state: watch::Sender<SchedulerState>,
    passes: watch::Sender<u64>,
    /// Survives restarts; pruned to the current list at the start of each pass.
    delivered: Mutex<HashSet<(EventKey, DateTime<Utc>)>>,
}

impl PremiereScheduler {
    pub fn new(
        known: KnownEvents,
        store: Arc<dyn SubscriptionStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                known,
                store,
                sink,
                state: watch::channel(SchedulerState::Idle).0,
                passes: watch::channel(0).0,
                delivered: Mutex::new(HashSet::new()),
            }),
            running: Arc::new(Mutex::new(None)),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.state.borrow().clone()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.shared.state.subscribe()
    }

    /// Number of passes that ran to the end of the list.
    pub fn completed_passes(&self) -> watch::Receiver<u64> {
        self.shared.passes.subscribe()
    }

    /// The event the scheduler is sleeping toward, if any.
    pub fn current_wait_target(&self) -> Option<Event> {
        match &*self.shared.state.borrow() {
            SchedulerState::Waiting(event) => Some(event.clone()),
            _ => None,
        }
    }

    pub async fn was_delivered(&self, event: &Event) -> bool {
        self.shared.is_delivered(event).await
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|pass| !pass.handle.is_finished())
    }

    /// Start a pass unless one is already in flight.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|pass| !pass.handle.is_finished()) {
            debug!("premiere watcher already running");
            return;
        }
        *running = Some(spawn_pass(&self.shared));
    }

    /// Abandon the current pass and go idle.
    pub async fn cancel(&self) {
        let mut running = self.running.lock().await;
        stop_pass(running.take()).await;
        self.shared.state.send_replace(SchedulerState::Idle);
    }

    /// Replace the current pass with a new one from the head of the list.
    ///
    /// Returns at once; the swap runs on its own task so it completes even if
    /// the caller is dropped. The old pass is cancelled and awaited (an
    /// in-flight delivery finishes first) before the new one starts, under
    /// the same lock `start` and `cancel` take. A scheduler that was never
    /// started, or has been cancelled, stays idle.
    pub fn restart(&self, reason: RestartReason) -> JoinHandle<()> {
        let shared = self.shared.clone();
        let running = self.running.clone();
        tokio::spawn(async move {
            let mut running = running.lock().await;
            if running.is_none() {
                debug!(%reason, "Premiere watcher not started, restart ignored");
                return;
            }
            info!(%reason, "Restarting premiere watcher");
            stop_pass(running.take()).await;
            *running = Some(spawn_pass(&shared));
        })
    }
}

fn spawn_pass(shared: &Arc<Shared>) -> RunningPass {
    let cancel = CancellationToken::new();
    let shared = shared.clone();
    let token = cancel.clone();
    let handle = tokio::spawn(async move { shared.run_pass(token).await });
    RunningPass { cancel, handle }
}

async fn stop_pass(pass: Option<RunningPass>) {
    let Some(pass) = pass else {
        return;
    };
    pass.cancel.cancel();
    if let Err(e) = pass.handle.await {
        error!("premiere watcher task failed: {e}");
    }
}

impl Shared {
    async fn run_pass(&self, cancel: CancellationToken) {
        let events = self.known.snapshot();
        let clock = PassClock::now();
        self.prune_delivered(&events).await;
        debug!(count = events.len(), "Scanning known events");

        for event in events.iter() {
            if cancel.is_cancelled() {
                return;
            }
            self.state.send_replace(SchedulerState::Scanning);

            if self.is_delivered(event).await {
                debug!(title = %event.title.romaji, "Already delivered, skipping");
                continue;
            }

            let Some(catalog_id) = event.catalog_id else {
                debug!(title = %event.title.romaji, "No catalog id, nobody can subscribe");
                continue;
            };

            info!(
                "Found a new title: {:?}, checking if there are any users interested.",
                event.title.romaji
            );
            let subscribers = match self.store.count_subscribers(catalog_id).await {
                Ok(n) => n,
                Err(e) => {
                    warn!(catalog_id, "Subscriber lookup failed, skipping this pass: {e}");
                    continue;
                }
            };
            if subscribers == 0 {
                info!("No user interested in {:?}.", event.title.romaji);
                continue;
            }

            self.state.send_replace(SchedulerState::Waiting(event.clone()));
            info!(
                title = %event.title.romaji,
                premiere = %event.premiere_at,
                subscribers,
                "Sleeping until premiere"
            );
            if !wait_until(clock.deadline(event.premiere_at), &cancel).await {
                debug!(title = %event.title.romaji, "Wait abandoned");
                return;
            }

            self.state.send_replace(SchedulerState::Delivering(event.clone()));
            match self.deliver(event, catalog_id).await {
                Ok(report) => {
                    self.delivered
                        .lock()
                        .await
                        .insert((event.key(), event.premiere_at));
                    info!(
                        catalog_id,
                        attempted = report.attempted,
                        delivered = report.delivered,
                        failed = report.failed,
                        "Reminders sent"
                    );
                }
                Err(e) => {
                    warn!(catalog_id, "Subscriber lookup failed at delivery time: {e}");
                }
            }
        }

        self.state.send_replace(SchedulerState::Idle);
        self.passes.send_modify(|n| *n += 1);
        info!("Premiere watcher reached the end of the list");
    }

    async fn deliver(&self, event: &Event, catalog_id: CatalogId) -> Result<DeliveryReport> {
        let mut report = DeliveryReport::default();
        let Some(content) = ReminderContent::for_event(event) else {
            return Ok(report);
        };

        let users = self.store.list_subscriber_ids(catalog_id).await?;
        if users.is_empty() {
            return Ok(report);
        }
        info!("Sending reminders to {:?} users about {:?}.", users, event.title.romaji);

        for user_id in users {
            report.attempted += 1;
            let outcome = AssertUnwindSafe(self.sink.notify(user_id, &content))
                .catch_unwind()
                .await;
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    report.failed += 1;
                    warn!(user_id, catalog_id, "Reminder delivery failed: {e}");
                }
                Err(_) => {
                    report.failed += 1;
                    error!(user_id, catalog_id, "Reminder delivery panicked");
                }
            }
        }
        Ok(report)
    }

    async fn is_delivered(&self, event: &Event) -> bool {
        self.delivered
            .lock()
            .await
            .contains(&(event.key(), event.premiere_at))
    }

    async fn prune_delivered(&self, events: &[Event]) {
        let live: HashSet<_> = events.iter().map(|e| (e.key(), e.premiere_at)).collect();
        self.delivered.lock().await.retain(|entry| live.contains(entry));
    }
}

/// Premiere times mapped onto the runtime clock, anchored once per pass.
#[derive(Debug, Clone, Copy)]
struct PassClock {
    started: Instant,
    wall: DateTime<Utc>,
}

impl PassClock {
    fn now() -> Self {
        Self {
            started: Instant::now(),
            wall: Utc::now(),
        }
    }

    /// Runtime instant at which `at` arrives; already-passed times map to
    /// the anchor.
    fn deadline(&self, at: DateTime<Utc>) -> Instant {
        self.started + (at - self.wall).to_std().unwrap_or_default()
    }
}

/// Sleep until `deadline`. Returns `false` if cancelled first.
async fn wait_until(deadline: Instant, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep_until(deadline) => true,
    }
}
