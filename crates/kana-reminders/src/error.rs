use kana_types::UserId;
use thiserror::Error;

/// Boxed collaborator error, kept intact so callers see the original cause.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur within the reminder subsystem.
#[derive(Debug, Error)]
pub enum ReminderError {
    /// The schedule source could not be fetched or parsed.
    #[error("Event source unavailable: {0}")]
    SourceUnavailable(#[source] BoxError),

    /// The subscription store rejected or failed an operation.
    #[error("Subscription store failure: {0}")]
    Store(#[source] BoxError),

    /// A notification could not be delivered to one user.
    #[error("Delivery to user {user_id} failed: {source}")]
    Delivery {
        user_id: UserId,
        #[source]
        source: BoxError,
    },
}

impl ReminderError {
    pub fn source_unavailable(err: impl Into<BoxError>) -> Self {
        Self::SourceUnavailable(err.into())
    }

    pub fn store(err: impl Into<BoxError>) -> Self {
        Self::Store(err.into())
    }

    pub fn delivery(user_id: UserId, err: impl Into<BoxError>) -> Self {
        Self::Delivery {
            user_id,
            source: err.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReminderError>;
