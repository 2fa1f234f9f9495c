use anyhow::{Result, bail};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::{
    guild::Permissions,
    id::{
        Id,
        marker::{ChannelMarker, GuildMarker, RoleMarker},
    },
};

use crate::command_handler::{Command, CommandContext, GlobalState, notice};
use crate::models::{DEFAULT_TEMPVC_TEMPLATE, GuildSettings, TempVcConfig};
use crate::store::update_guild;

/// Checks MANAGE_GUILD and returns the guild plus the chosen subcommand.
fn admin_subcommand(
    state: &GlobalState,
    cmd_ctx: &mut CommandContext<'_>,
) -> Result<(Id<GuildMarker>, String)> {
    let guild_id = cmd_ctx.require_guild()?;
    cmd_ctx.ensure_permissions(&state.cache, Permissions::MANAGE_GUILD)?;
    let action = cmd_ctx.subcommand().unwrap_or_default();
    Ok((guild_id, action))
}

async fn save<R: Send>(
    state: &GlobalState,
    guild_id: Id<GuildMarker>,
    update: impl FnOnce(&mut GuildSettings) -> R + Send,
) -> Result<R> {
    let result = update_guild(&*state.store, guild_id, update).await?;
    tracing::info!(%guild_id, "Guild settings updated");
    Ok(result)
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "setup", desc = "Set the channel members join to get their own voice channel.")]
pub struct TempVcSetup {
    #[command(desc = "Voice channel that creates new channels", channel_types = "guild_voice")]
    creator: Id<ChannelMarker>,
    #[command(desc = "Category new channels go in", channel_types = "guild_category")]
    category: Option<Id<ChannelMarker>>,
    #[command(desc = "Name template, {user} is replaced by the member's name")]
    template: Option<String>,
    #[command(desc = "Default user limit (0 for none)", min_value = 0, max_value = 99)]
    limit: Option<i64>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "off", desc = "Stop creating temporary voice channels.")]
pub struct TempVcOff;

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "tempvc", desc = "Temporary voice channels.")]
pub enum TempVcCommand {
    #[command(name = "setup")]
    Setup(TempVcSetup),
    #[command(name = "off")]
    Off(TempVcOff),
}

#[async_trait]
impl Command<GlobalState> for TempVcCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, action) = admin_subcommand(&state, &mut cmd_ctx)?;
        let reply = match action.as_str() {
            "setup" => {
                let creator: Id<ChannelMarker> = cmd_ctx.require_arg("creator")?;
                let category: Option<Id<ChannelMarker>> = cmd_ctx.get_arg("category");
                let template: Option<String> = cmd_ctx.get_arg("template");
                let limit: Option<i64> = cmd_ctx.get_arg("limit");
                let config = TempVcConfig {
                    creator_channel_id: creator,
                    category_id: category,
                    name_template: template
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| DEFAULT_TEMPVC_TEMPLATE.to_string()),
                    user_limit: limit
                        .and_then(|l| u16::try_from(l).ok())
                        .filter(|l| (1..=99).contains(l)),
                };
                save(&state, guild_id, |settings| settings.tempvc = Some(config)).await?;
                format!("🔊 Joining <#{creator}> now creates a temporary voice channel.")
            }
            "off" => {
                save(&state, guild_id, |settings| settings.tempvc = None).await?;
                "Temporary voice channels are off.".to_string()
            }
            _ => bail!("Use `tempvc setup` or `tempvc off`."),
        };
        cmd_ctx.reply(notice(reply)).await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "channel", desc = "Set the moderation log channel.")]
pub struct ModLogChannel {
    #[command(desc = "Log channel", channel_types = "guild_text")]
    channel: Id<ChannelMarker>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "off", desc = "Turn moderation logging off.")]
pub struct ModLogOff;

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "modlog", desc = "Moderation logging.")]
pub enum ModLogCommand {
    #[command(name = "channel")]
    Channel(ModLogChannel),
    #[command(name = "off")]
    Off(ModLogOff),
}

#[async_trait]
impl Command<GlobalState> for ModLogCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, action) = admin_subcommand(&state, &mut cmd_ctx)?;
        let reply = match action.as_str() {
            "channel" => {
                let channel: Id<ChannelMarker> = cmd_ctx.require_arg("channel")?;
                save(&state, guild_id, |settings| {
                    settings.modlog_channel_id = Some(channel)
                })
                .await?;
                format!("📋 Moderation events will be logged in <#{channel}>.")
            }
            "off" => {
                save(&state, guild_id, |settings| settings.modlog_channel_id = None).await?;
                "Moderation logging is off.".to_string()
            }
            _ => bail!("Use `modlog channel` or `modlog off`."),
        };
        cmd_ctx.reply(notice(reply)).await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "set", desc = "Give new members a role.")]
pub struct AutoRoleSet {
    #[command(desc = "Role for new members")]
    role: Id<RoleMarker>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "off", desc = "Stop giving new members a role.")]
pub struct AutoRoleOff;

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "autorole", desc = "Role given to members when they join.")]
pub enum AutoRoleCommand {
    #[command(name = "set")]
    Set(AutoRoleSet),
    #[command(name = "off")]
    Off(AutoRoleOff),
}

#[async_trait]
impl Command<GlobalState> for AutoRoleCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, action) = admin_subcommand(&state, &mut cmd_ctx)?;
        let reply = match action.as_str() {
            "set" => {
                let role: Id<RoleMarker> = cmd_ctx.require_arg("role")?;
                if role.cast::<GuildMarker>() == guild_id {
                    bail!("Everyone already has @everyone.");
                }
                save(&state, guild_id, |settings| settings.autorole_id = Some(role)).await?;
                format!("New members will get <@&{role}>.")
            }
            "off" => {
                save(&state, guild_id, |settings| settings.autorole_id = None).await?;
                "Autorole is off.".to_string()
            }
            _ => bail!("Use `autorole set` or `autorole off`."),
        };
        cmd_ctx.reply(notice(reply)).await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "on", desc = "Quote linked messages.")]
pub struct LinkEmbedOn;

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "off", desc = "Stop quoting linked messages.")]
pub struct LinkEmbedOff;

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "linkembed", desc = "Quote messages when someone posts a link to them.")]
pub enum LinkEmbedCommand {
    #[command(name = "on")]
    On(LinkEmbedOn),
    #[command(name = "off")]
    Off(LinkEmbedOff),
}

#[async_trait]
impl Command<GlobalState> for LinkEmbedCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, action) = admin_subcommand(&state, &mut cmd_ctx)?;
        let enabled = match action.as_str() {
            "on" => true,
            "off" => false,
            _ => bail!("Use `linkembed on` or `linkembed off`."),
        };
        save(&state, guild_id, |settings| settings.message_link_embeds = enabled).await?;
        let reply = if enabled {
            "🔗 Message links will be quoted."
        } else {
            "Message links will no longer be quoted."
        };
        cmd_ctx.reply(notice(reply)).await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "enable", desc = "Answer messages in a channel.")]
pub struct ChatbotEnable {
    #[command(desc = "Channel the bot chats in", channel_types = "guild_text")]
    channel: Id<ChannelMarker>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "disable", desc = "Stop chatting.")]
pub struct ChatbotDisable;

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "chatbot", desc = "AI chat channel.")]
pub enum ChatbotCommand {
    #[command(name = "enable")]
    Enable(ChatbotEnable),
    #[command(name = "disable")]
    Disable(ChatbotDisable),
}

#[async_trait]
impl Command<GlobalState> for ChatbotCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, action) = admin_subcommand(&state, &mut cmd_ctx)?;
        let reply = match action.as_str() {
            "enable" => {
                if state.config.chatbot_api_key.is_none() {
                    bail!("The chatbot isn't available: no API key is configured.");
                }
                let channel: Id<ChannelMarker> = cmd_ctx.require_arg("channel")?;
                save(&state, guild_id, |settings| {
                    settings.chatbot.enabled = true;
                    settings.chatbot.channel_id = Some(channel);
                })
                .await?;
                state.chat_history.clear(channel);
                format!("🤖 I'll chat in <#{channel}>.")
            }
            "disable" => {
                let previous = save(&state, guild_id, |settings| {
                    settings.chatbot.enabled = false;
                    settings.chatbot.channel_id.take()
                })
                .await?;
                if let Some(channel) = previous {
                    state.chat_history.clear(channel);
                }
                "Chatbot disabled.".to_string()
            }
            _ => bail!("Use `chatbot enable` or `chatbot disable`."),
        };
        cmd_ctx.reply(notice(reply)).await?;
        Ok(())
    }
}
