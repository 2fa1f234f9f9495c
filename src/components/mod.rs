//! Buttons and modals. Every `custom_id` is parsed once into a
//! [`ComponentAction`] or [`ModalAction`] and dispatched from a single match.

pub mod action;
pub mod buttons;
pub mod context;

use std::collections::HashMap;
use std::sync::Arc;

use twilight_model::application::interaction::{
    Interaction, message_component::MessageComponentInteractionData, modal::ModalInteractionData,
};

pub use action::{
    ComponentAction, LfgAction, ModalAction, MusicAction, ReminderAction, TempVcAction,
    TicketButton, UtilsAction,
};
pub use context::InteractionCtx;

use crate::features::{lfg, selfrole, templates, tempvc};
use crate::state::State;
use crate::tickets::{TicketAction, flow};

/// Text input values of a submitted modal, keyed by input `custom_id`.
pub fn modal_values(data: &ModalInteractionData) -> HashMap<String, String> {
    data.components
        .iter()
        .flat_map(|row| row.components.iter())
        .filter_map(|input| Some((input.custom_id.clone(), input.value.clone()?)))
        .collect()
}

async fn dispatch_component(ctx: &InteractionCtx, action: ComponentAction) -> anyhow::Result<()> {
    match action {
        ComponentAction::Music(action) => buttons::music::handle(ctx, action).await,
        ComponentAction::Ticket(button) => match button {
            TicketButton::Open(kind) => flow::open_modal(ctx, &kind).await,
            TicketButton::Close(id) => flow::handle_button(ctx, TicketAction::Close, &id).await,
            TicketButton::Claim(id) => flow::handle_button(ctx, TicketAction::Claim, &id).await,
            TicketButton::Reopen(id) => flow::handle_button(ctx, TicketAction::Reopen, &id).await,
            TicketButton::Delete(id) => flow::handle_button(ctx, TicketAction::Delete, &id).await,
        },
        ComponentAction::Reminder(action) => buttons::reminder::handle(ctx, action).await,
        ComponentAction::Lfg(action) => lfg::handle_button(ctx, action).await,
        ComponentAction::TempVc(action) => tempvc::handle_button(ctx, action).await,
        ComponentAction::SelfRole(role_id) => selfrole::toggle(ctx, role_id).await,
        ComponentAction::Utils(action) => buttons::dismiss::handle(ctx, action).await,
    }
}

async fn dispatch_modal(
    ctx: &InteractionCtx,
    action: ModalAction,
    values: &HashMap<String, String>,
) -> anyhow::Result<()> {
    match action {
        ModalAction::Ticket(kind) => flow::submit(ctx, &kind, values).await,
        ModalAction::Template(name) => templates::save_from_modal(ctx, &name, values).await,
        ModalAction::TempVcRename => tempvc::handle_rename(ctx, values).await,
    }
}

/// Handles a button press. Returns `Ok(false)` for ids no module owns.
pub async fn route_component(
    state: Arc<State>,
    interaction: Interaction,
    data: &MessageComponentInteractionData,
) -> anyhow::Result<bool> {
    let Some(action) = ComponentAction::parse(&data.custom_id) else {
        tracing::debug!(custom_id = %data.custom_id, "Unrouted component");
        return Ok(false);
    };
    tracing::debug!(?action, "Component interaction");
    let ctx = InteractionCtx::new(state, interaction);
    if let Err(e) = dispatch_component(&ctx, action).await {
        ctx.reply_error(&e).await?;
    }
    Ok(true)
}

/// Handles a modal submission. Returns `Ok(false)` for ids no module owns.
pub async fn route_modal(
    state: Arc<State>,
    interaction: Interaction,
    data: &ModalInteractionData,
) -> anyhow::Result<bool> {
    let Some(action) = ModalAction::parse(&data.custom_id) else {
        tracing::debug!(custom_id = %data.custom_id, "Unrouted modal");
        return Ok(false);
    };
    let values = modal_values(data);
    let ctx = InteractionCtx::new(state, interaction);
    if let Err(e) = dispatch_modal(&ctx, action, &values).await {
        ctx.reply_error(&e).await?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modal_values_skip_empty_inputs() {
        let data: ModalInteractionData = serde_json::from_value(serde_json::json!({
            "custom_id": "template_modal:rules",
            "components": [
                {"type": 1, "components": [{"type": 4, "custom_id": "title", "value": "Rules"}]},
                {"type": 1, "components": [{"type": 4, "custom_id": "footer", "value": null}]},
            ],
        }))
        .unwrap();
        let values = modal_values(&data);
        assert_eq!(values.get("title").map(String::as_str), Some("Rules"));
        assert!(!values.contains_key("footer"));
    }
}
