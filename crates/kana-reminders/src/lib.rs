//! kana-reminders: episode premiere reminders.
//!
//! A [`TitleRefresher`] keeps the Known Event List current, a
//! [`PremiereScheduler`] sleeps until each subscribed premiere and delivers
//! reminders, and a [`ReminderFacade`] serves subscription toggles. The
//! [`ReminderService`] wires the three together.

pub mod diff;
pub mod error;
pub mod facade;
pub mod known;
pub mod refresher;
pub mod scheduler;
pub mod service;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use diff::{ListDiff, requires_restart};
pub use error::{BoxError, ReminderError, Result};
pub use facade::{ReminderFacade, restart_needed};
pub use known::KnownEvents;
pub use refresher::{RefreshOutcome, RefreshPolicy, TitleRefresher};
pub use scheduler::{DeliveryReport, PremiereScheduler, RestartReason, SchedulerState};
pub use service::ReminderService;
pub use source::{EventSource, NotificationSink, SubscriptionStore};
