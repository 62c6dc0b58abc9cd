//! Reminder delivery over Discord direct messages.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::Http;
use serenity::model::id::UserId as DiscordUserId;
use tracing::debug;

use kana_reminders::{NotificationSink, ReminderError};
use kana_types::{ReminderContent, UserId};

use crate::components::reminder_message;

/// Sends each reminder as a DM with an embed and a bell button.
pub struct DiscordSink {
    http: Arc<Http>,
}

impl DiscordSink {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl NotificationSink for DiscordSink {
    async fn notify(&self, user_id: UserId, content: &ReminderContent) -> kana_reminders::Result<()> {
        if user_id == 0 {
            return Err(ReminderError::delivery(user_id, "invalid Discord user id"));
        }
        let message = reminder_message(content, user_id);
        let sent = DiscordUserId::new(user_id)
            .direct_message(&self.http, message)
            .await
            .map_err(|e| ReminderError::delivery(user_id, e))?;
        debug!(user_id, message_id = %sent.id, catalog_id = content.catalog_id, "Reminder DM sent");
        Ok(())
    }
}
