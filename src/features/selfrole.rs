use anyhow::{Context, anyhow};
use twilight_model::{
    channel::message::component::ButtonStyle,
    id::{Id, marker::RoleMarker},
};
use twilight_util::builder::embed::EmbedBuilder;

use crate::command_handler::{CommandResponse, CommandResponseBuilder, notice};
use crate::components::{ComponentAction, InteractionCtx};
use crate::utils::discord::{button, button_rows, truncate};

pub const SELFROLE_COLOR: u32 = 0x9b59b6;
/// Five rows of five buttons.
pub const MAX_PANEL_ROLES: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleChange {
    Add,
    Remove,
}

pub fn plan_toggle(current: &[Id<RoleMarker>], role_id: Id<RoleMarker>) -> RoleChange {
    if current.contains(&role_id) {
        RoleChange::Remove
    } else {
        RoleChange::Add
    }
}

/// The panel message: an embed plus one button per `(role, label)`.
pub fn panel(
    title: &str,
    description: Option<&str>,
    roles: &[(Id<RoleMarker>, String)],
) -> anyhow::Result<CommandResponse> {
    if roles.is_empty() {
        return Err(anyhow!("Give me at least one role to put on the panel."));
    }
    if roles.len() > MAX_PANEL_ROLES {
        return Err(anyhow!("A panel holds at most {MAX_PANEL_ROLES} roles."));
    }

    let listing: Vec<String> = roles.iter().map(|(id, _)| format!("<@&{id}>")).collect();
    let embed = EmbedBuilder::new()
        .title(truncate(title, 256))
        .description(format!(
            "{}\n\n{}",
            description.unwrap_or("Click a button to toggle a role."),
            listing.join("\n")
        ))
        .color(SELFROLE_COLOR)
        .build();
    let buttons = roles
        .iter()
        .map(|(id, label)| {
            button(
                ComponentAction::SelfRole(*id).to_string(),
                truncate(label, 80),
                ButtonStyle::Secondary,
            )
        })
        .collect();

    Ok(CommandResponseBuilder::new()
        .embed(embed)
        .components(button_rows(buttons))
        .build())
}

pub async fn toggle(ctx: &InteractionCtx, role_id: Id<RoleMarker>) -> anyhow::Result<()> {
    let guild_id = ctx.guild_id()?;
    let user_id = ctx.user_id()?;
    let http = &ctx.state.http;

    let message = match plan_toggle(&ctx.member_roles(), role_id) {
        RoleChange::Add => {
            http.add_guild_member_role(guild_id, user_id, role_id)
                .await
                .context("Couldn't add that role. Is it above my highest role?")?;
            format!("Added <@&{role_id}>.")
        }
        RoleChange::Remove => {
            http.remove_guild_member_role(guild_id, user_id, role_id)
                .await
                .context("Couldn't remove that role. Is it above my highest role?")?;
            format!("Removed <@&{role_id}>.")
        }
    };
    tracing::debug!(%guild_id, %user_id, %role_id, "Self role toggled");
    ctx.respond(notice(message)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use twilight_model::channel::message::Component;

    #[test]
    fn test_plan_toggle() {
        let roles = [Id::new(1), Id::new(2)];
        assert_eq!(plan_toggle(&roles, Id::new(2)), RoleChange::Remove);
        assert_eq!(plan_toggle(&roles, Id::new(3)), RoleChange::Add);
    }

    #[test]
    fn test_panel_buttons() {
        let roles: Vec<_> = (1..=7).map(|i| (Id::new(i), format!("Role {i}"))).collect();
        let response = panel("Pick roles", None, &roles).unwrap();
        assert_eq!(response.components.len(), 2);
        let Component::ActionRow(row) = &response.components[0] else {
            panic!("expected action row");
        };
        let Component::Button(first) = &row.components[0] else {
            panic!("expected button");
        };
        assert_eq!(first.custom_id.as_deref(), Some("selfrole:1"));
        assert!(panel("x", None, &[]).is_err());
    }
}
