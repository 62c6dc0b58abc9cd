//! Serenity EventHandler: starts the reminder service once the gateway is
//! ready and answers bell button presses.

use std::sync::Arc;

use serenity::all::{
    ComponentInteraction, CreateInteractionResponse, CreateInteractionResponseMessage,
    Interaction,
};
use serenity::async_trait;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{debug, info, warn};

use kana_reminders::ReminderService;
use kana_types::ToggleControl;

use crate::components::{TOGGLE_FAILED, ToggleResponse, reminder_row, toggle_response};

pub struct ReminderHandler {
    pub service: Arc<ReminderService>,
}

#[async_trait]
impl EventHandler for ReminderHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(bot_name = ready.user.name, "Discord bot connected and ready");
        self.service.start().await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Component(component) = interaction else {
            return;
        };
        let Some(control) = ToggleControl::parse(&component.data.custom_id) else {
            debug!(custom_id = component.data.custom_id, "Ignoring unknown component");
            return;
        };
        self.handle_toggle(&ctx, &component, control).await;
    }
}

impl ReminderHandler {
    async fn handle_toggle(
        &self,
        ctx: &Context,
        component: &ComponentInteraction,
        control: ToggleControl,
    ) {
        let presser = component.user.id.get();
        let response = match self
            .service
            .facade()
            .toggle_subscription(control.user_id, control.catalog_id)
            .await
        {
            Ok(active) => match toggle_response(&control, presser, active) {
                ToggleResponse::Restyle { active } => CreateInteractionResponse::UpdateMessage(
                    CreateInteractionResponseMessage::new()
                        .components(vec![reminder_row(&control, active)]),
                ),
                ToggleResponse::Ephemeral(text) => ephemeral(text),
            },
            Err(e) => {
                warn!(
                    user_id = control.user_id,
                    catalog_id = control.catalog_id,
                    "Reminder toggle failed: {e}"
                );
                ephemeral(TOGGLE_FAILED)
            }
        };

        if let Err(e) = component.create_response(&ctx.http, response).await {
            warn!(presser, "Failed to answer reminder button: {e}");
        }
    }
}

fn ephemeral(text: &str) -> CreateInteractionResponse {
    CreateInteractionResponse::Message(
        CreateInteractionResponseMessage::new()
            .content(text)
            .ephemeral(true),
    )
}
