use crate::command_handler::notice;
use crate::components::{InteractionCtx, ReminderAction};
use crate::reminders::cancel_reminder;

pub async fn handle(ctx: &InteractionCtx, action: ReminderAction) -> anyhow::Result<()> {
    let ReminderAction::Cancel(reminder_id) = action;
    let user_id = ctx.user_id()?;
    let state = &ctx.state;
    if !cancel_reminder(&*state.store, &state.reminders, user_id, &reminder_id).await? {
        return ctx
            .respond(notice("That reminder already fired, was cancelled, or isn't yours."))
            .await;
    }
    tracing::info!(%user_id, reminder_id, "Reminder cancelled from button");
    let mut response = crate::command_handler::CommandResponse {
        content: format!("🗑️ Reminder `{reminder_id}` cancelled."),
        ..Default::default()
    };
    if let Some(message) = ctx.message() {
        response.embeds = message.embeds.clone();
    }
    ctx.update_message(response).await
}
