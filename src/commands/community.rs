use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::{
    guild::Permissions,
    id::{
        Id,
        marker::{ChannelMarker, RoleMarker},
    },
};
use twilight_util::builder::embed::EmbedBuilder;

use crate::command_handler::{Command, CommandContext, CommandResponseBuilder, GlobalState, notice};
use crate::features::{
    lfg::{self, NewPost},
    selfrole,
    templates::{self, DEFAULT_TEMPLATE_COLOR},
};
use crate::prefix_parser::parse_role_mention;
use crate::store::{load_guild, update_guild};

/// Role ids from whitespace or comma separated mentions or raw ids.
pub fn parse_role_list(input: &str) -> Vec<Id<RoleMarker>> {
    let mut roles: Vec<Id<RoleMarker>> = Vec::new();
    for token in input.split(|c: char| c.is_whitespace() || c == ',') {
        if let Some(role) = parse_role_mention(token) {
            if !roles.contains(&role) {
                roles.push(role);
            }
        }
    }
    roles
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "panel", desc = "Post a panel of self-assignable roles.")]
pub struct SelfRolePanel {
    #[command(desc = "Panel title")]
    title: String,
    #[command(desc = "Roles to offer, as mentions")]
    roles: String,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "selfrole", desc = "Self-assignable roles.")]
pub enum SelfRoleCommand {
    #[command(name = "panel")]
    Panel(SelfRolePanel),
}

#[async_trait]
impl Command<GlobalState> for SelfRoleCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let guild_id = cmd_ctx.require_guild()?;
        let channel_id = cmd_ctx.require_channel()?;
        cmd_ctx.ensure_permissions(&state.cache, Permissions::MANAGE_ROLES)?;
        if cmd_ctx.subcommand().as_deref().is_some_and(|s| s != "panel") {
            bail!("Use `selfrole panel`.");
        }
        let title: String = cmd_ctx.require_arg("title")?;
        let roles = parse_role_list(&cmd_ctx.get_remainder_arg("roles").unwrap_or_default());

        let labeled: Vec<(Id<RoleMarker>, String)> = roles
            .into_iter()
            .map(|id| {
                let name = state
                    .cache
                    .role(id)
                    .map_or_else(|| id.to_string(), |role| role.resource().name.clone());
                (id, name)
            })
            .collect();
        let panel = selfrole::panel(&title, None, &labeled)?;
        state
            .http
            .create_message(channel_id)
            .embeds(&panel.embeds)
            .components(&panel.components)
            .await?;
        tracing::info!(%guild_id, roles = labeled.len(), "Self-role panel posted");
        cmd_ctx.reply(notice("Posted the role panel.")).await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "lfg", desc = "Look for players to group up with.")]
pub struct LfgCommand {
    #[command(desc = "What you're playing")]
    game: String,
    #[command(desc = "Group size including you", min_value = 2, max_value = 25)]
    slots: i64,
    #[command(desc = "Anything players should know")]
    note: Option<String>,
}

#[async_trait]
impl Command<GlobalState> for LfgCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let guild_id = cmd_ctx.require_guild()?;
        let channel_id = cmd_ctx.require_channel()?;
        let owner = cmd_ctx.user_id()?;
        let game: String = cmd_ctx.require_arg("game")?;
        let slots: i64 = cmd_ctx.require_arg("slots")?;
        let note = cmd_ctx.get_remainder_arg("note");

        let slots = u8::try_from(slots)
            .map_err(|_| anyhow!("A group needs between 2 and {} slots.", lfg::MAX_SLOTS))?;
        let post = state.lfg.create(NewPost {
            guild_id,
            channel_id,
            owner,
            game,
            note,
            slots,
        })?;
        let message = cmd_ctx.reply(lfg::post_message(&post)).await?;
        state.lfg.attach_message(post.id, message.id);
        tracing::info!(%guild_id, group = post.id, slots, "LFG group posted");
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "create", desc = "Create or overwrite a template.")]
pub struct TemplateCreate {
    #[command(desc = "Template name")]
    name: String,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "send", desc = "Post a template.")]
pub struct TemplateSend {
    #[command(desc = "Template name")]
    name: String,
    #[command(
        desc = "Channel to post in (defaults to this one)",
        channel_types = "guild_text guild_announcement"
    )]
    channel: Option<Id<ChannelMarker>>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "list", desc = "List this server's templates.")]
pub struct TemplateList;

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "delete", desc = "Delete a template.")]
pub struct TemplateDelete {
    #[command(desc = "Template name")]
    name: String,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "template", desc = "Reusable embed templates.")]
pub enum TemplateCommand {
    #[command(name = "create")]
    Create(TemplateCreate),
    #[command(name = "send")]
    Send(TemplateSend),
    #[command(name = "list")]
    List(TemplateList),
    #[command(name = "delete")]
    Delete(TemplateDelete),
}

#[async_trait]
impl Command<GlobalState> for TemplateCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let guild_id = cmd_ctx.require_guild()?;
        let action = cmd_ctx.subcommand();
        if action.as_deref() != Some("list") {
            cmd_ctx.ensure_permissions(&state.cache, Permissions::MANAGE_GUILD)?;
        }

        match action.as_deref() {
            Some("create") => {
                let name = templates::validate_name(&cmd_ctx.require_arg::<String>("name")?)?;
                cmd_ctx.show_modal(templates::template_modal(&name)).await?;
            }
            Some("send") => {
                let name = templates::validate_name(&cmd_ctx.require_arg::<String>("name")?)?;
                let channel_id = match cmd_ctx.get_arg::<Id<ChannelMarker>>("channel") {
                    Some(channel_id) => channel_id,
                    None => cmd_ctx.require_channel()?,
                };
                let settings = load_guild(&*state.store, guild_id).await?;
                let template = settings
                    .templates
                    .get(&name)
                    .ok_or_else(|| anyhow!("There is no template `{name}`."))?;
                state
                    .http
                    .create_message(channel_id)
                    .embeds(&[templates::render(template)])
                    .await?;
                cmd_ctx.reply(notice(format!("Sent `{name}` to <#{channel_id}>."))).await?;
            }
            Some("list") | None => {
                let settings = load_guild(&*state.store, guild_id).await?;
                let names: Vec<String> = settings
                    .templates
                    .iter()
                    .map(|(name, template)| match &template.title {
                        Some(title) => format!("`{name}`: {title}"),
                        None => format!("`{name}`"),
                    })
                    .collect();
                let embed = EmbedBuilder::new()
                    .title("📝 Templates")
                    .description(if names.is_empty() {
                        "No templates yet. Create one with `/template create`.".to_string()
                    } else {
                        names.join("\n")
                    })
                    .color(DEFAULT_TEMPLATE_COLOR)
                    .build();
                cmd_ctx
                    .reply(CommandResponseBuilder::new().embed(embed).ephemeral().build())
                    .await?;
            }
            Some("delete") => {
                let name = templates::validate_name(&cmd_ctx.require_arg::<String>("name")?)?;
                let removed = update_guild(&*state.store, guild_id, |settings| {
                    settings.templates.remove(&name).is_some()
                })
                .await?;
                if !removed {
                    bail!("There is no template `{name}`.");
                }
                cmd_ctx.reply(notice(format!("Deleted template `{name}`."))).await?;
            }
            Some(other) => bail!("Unknown template action `{other}`."),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_role_list() {
        let roles = parse_role_list("<@&10>, <@&11> junk 12 <@&10>");
        assert_eq!(roles, vec![Id::new(10), Id::new(11), Id::new(12)]);
    }
}
