//! Message builders for reminders and their bell button.

use serenity::all::{
    ButtonStyle, CreateActionRow, CreateButton, CreateEmbed, CreateMessage, ReactionType,
};

use kana_types::{ReminderContent, ToggleControl, UserId};

/// Thumbnail placeholder used when a schedule card had no image.
const NO_THUMBNAIL: &str = "N/A";

pub const REMINDER_SET: &str = "Reminder set! I'll remind you when a future episode premieres.";
pub const REMINDER_REMOVED: &str = "Reminder removed.";
pub const TOGGLE_FAILED: &str = "Something went wrong while updating your reminder, try again later.";

/// Bell button for `control`: green with a bell while active, grey with a
/// struck bell otherwise.
pub fn reminder_button(control: &ToggleControl, active: bool) -> CreateButton {
    CreateButton::new(control.custom_id())
        .emoji(ReactionType::Unicode(ToggleControl::emoji(active).to_string()))
        .style(if active {
            ButtonStyle::Success
        } else {
            ButtonStyle::Secondary
        })
}

pub fn reminder_row(control: &ToggleControl, active: bool) -> CreateActionRow {
    CreateActionRow::Buttons(vec![reminder_button(control, active)])
}

pub fn reminder_embed(content: &ReminderContent) -> CreateEmbed {
    let embed = CreateEmbed::new().title(content.headline());
    if content.thumbnail.is_empty() || content.thumbnail == NO_THUMBNAIL {
        embed
    } else {
        embed.thumbnail(&content.thumbnail)
    }
}

/// DM sent to `user_id`, carrying an active bell so they can unsubscribe.
pub fn reminder_message(content: &ReminderContent, user_id: UserId) -> CreateMessage {
    let control = ToggleControl::new(content.catalog_id, user_id);
    CreateMessage::new()
        .embed(reminder_embed(content))
        .components(vec![reminder_row(&control, true)])
}

/// How to answer a bell press once the toggle went through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleResponse {
    /// The owner pressed it: redraw the button in place.
    Restyle { active: bool },
    /// Someone else pressed it: tell them privately.
    Ephemeral(&'static str),
}

pub fn toggle_response(control: &ToggleControl, presser: UserId, active: bool) -> ToggleResponse {
    if presser == control.user_id {
        ToggleResponse::Restyle { active }
    } else if active {
        ToggleResponse::Ephemeral(REMINDER_SET)
    } else {
        ToggleResponse::Ephemeral(REMINDER_REMOVED)
    }
}
