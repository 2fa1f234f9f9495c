use crate::components::{InteractionCtx, UtilsAction};

/// Deletes the bot message the button is attached to.
pub async fn handle(ctx: &InteractionCtx, action: UtilsAction) -> anyhow::Result<()> {
    let UtilsAction::Dismiss = action;
    let message = ctx
        .message()
        .ok_or_else(|| anyhow::anyhow!("There's nothing to dismiss."))?;
    ctx.defer_update().await?;
    ctx.state
        .http
        .delete_message(message.channel_id, message.id)
        .await?;
    Ok(())
}
