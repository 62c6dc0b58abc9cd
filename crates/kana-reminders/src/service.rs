//! Wires the refresher, scheduler and facade together and owns their
//! lifetime: started once when the bot is ready, stopped at shutdown.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use kana_types::Event;

use crate::facade::ReminderFacade;
use crate::known::KnownEvents;
use crate::refresher::{RefreshPolicy, TitleRefresher};
use crate::scheduler::PremiereScheduler;
use crate::source::{EventSource, NotificationSink, SubscriptionStore};

pub struct ReminderService {
    source: Arc<dyn EventSource>,
    known: KnownEvents,
    scheduler: Arc<PremiereScheduler>,
    refresher: Arc<TitleRefresher>,
    facade: Arc<ReminderFacade>,
    refresh_task: Mutex<Option<(CancellationToken, JoinHandle<()>)>>,
}

impl ReminderService {
    pub fn new(
        source: Arc<dyn EventSource>,
        store: Arc<dyn SubscriptionStore>,
        sink: Arc<dyn NotificationSink>,
        policy: RefreshPolicy,
    ) -> Self {
        let known = KnownEvents::new();
        let scheduler = Arc::new(PremiereScheduler::new(known.clone(), store.clone(), sink));
        let refresher = Arc::new(TitleRefresher::new(
            source.clone(),
            known.clone(),
            scheduler.clone(),
            policy,
        ));
        let facade = Arc::new(ReminderFacade::new(store, known.clone(), scheduler.clone()));

        Self {
            source,
            known,
            scheduler,
            refresher,
            facade,
            refresh_task: Mutex::new(None),
        }
    }

    pub fn facade(&self) -> Arc<ReminderFacade> {
        self.facade.clone()
    }

    pub fn scheduler(&self) -> &Arc<PremiereScheduler> {
        &self.scheduler
    }

    pub fn known_events(&self) -> Arc<Vec<Event>> {
        self.known.snapshot()
    }

    /// Start both background tasks. Later calls are no-ops (the chat client
    /// may report ready again after a reconnect).
    pub async fn start(&self) {
        let mut task = self.refresh_task.lock().await;
        if task.is_some() {
            debug!("Reminder service already started");
            return;
        }

        self.scheduler.start().await;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.refresher.clone().run(cancel.clone()));
        *task = Some((cancel, handle));
        info!("Reminder service started");
    }

    /// Cancel both tasks, wait for them, and release the source's session.
    pub async fn shutdown(&self) {
        let task = self.refresh_task.lock().await.take();
        let refresher = async {
            if let Some((cancel, handle)) = task {
                cancel.cancel();
                if let Err(e) = handle.await {
                    error!("title refresher task failed: {e}");
                }
            }
        };
        tokio::join!(refresher, self.scheduler.cancel());

        self.source.close().await;
        info!("Reminder service stopped");
    }
}
