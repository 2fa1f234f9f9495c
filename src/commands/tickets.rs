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
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder};

use crate::command_handler::{Command, CommandContext, CommandResponseBuilder, GlobalState, notice};
use crate::models::{QuestionStyle, StaffRole, TicketConfig, TicketQuestion};
use crate::state::State;
use crate::tickets::flow::{TICKET_COLOR, panel_message};

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "panel", desc = "Post the ticket panel.")]
pub struct TicketPanel {
    #[command(desc = "Channel to post in (defaults to this one)", channel_types = "guild_text")]
    channel: Option<Id<ChannelMarker>>,
    #[command(desc = "Panel title")]
    title: Option<String>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "add", desc = "Add or update a ticket type.")]
pub struct TicketTypeAdd {
    #[command(desc = "Type name, e.g. Support")]
    name: String,
    #[command(desc = "Short description shown on the panel")]
    description: Option<String>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "remove", desc = "Remove a ticket type.")]
pub struct TicketTypeRemove {
    #[command(desc = "Type name")]
    name: String,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "type", desc = "Manage ticket types.")]
pub enum TicketTypeGroup {
    #[command(name = "add")]
    Add(TicketTypeAdd),
    #[command(name = "remove")]
    Remove(TicketTypeRemove),
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "add", desc = "Add a question to a ticket type's form.")]
pub struct TicketQuestionAdd {
    #[command(desc = "Ticket type")]
    kind: String,
    #[command(desc = "Question text", max_length = 45)]
    label: String,
    #[command(desc = "Allow a long answer")]
    paragraph: Option<bool>,
    #[command(desc = "Must be answered (default yes)")]
    required: Option<bool>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "question", desc = "Manage ticket form questions.")]
pub enum TicketQuestionGroup {
    #[command(name = "add")]
    Add(TicketQuestionAdd),
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "add", desc = "Give a role staff access to tickets.")]
pub struct TicketStaffAdd {
    #[command(desc = "Staff role")]
    role: Id<RoleMarker>,
    #[command(desc = "May close tickets (default yes)")]
    close: Option<bool>,
    #[command(desc = "May claim tickets (default yes)")]
    assign: Option<bool>,
    #[command(desc = "May delete tickets (default no)")]
    delete: Option<bool>,
    #[command(desc = "May reopen tickets (default yes)")]
    reopen: Option<bool>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "remove", desc = "Remove a staff role.")]
pub struct TicketStaffRemove {
    #[command(desc = "Staff role")]
    role: Id<RoleMarker>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "staff", desc = "Manage ticket staff roles.")]
pub enum TicketStaffGroup {
    #[command(name = "add")]
    Add(TicketStaffAdd),
    #[command(name = "remove")]
    Remove(TicketStaffRemove),
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "settings", desc = "Show or change ticket settings.")]
pub struct TicketSettings {
    #[command(desc = "Category new ticket channels go in", channel_types = "guild_category")]
    category: Option<Id<ChannelMarker>>,
    #[command(desc = "Channel ticket actions are logged to", channel_types = "guild_text")]
    log_channel: Option<Id<ChannelMarker>>,
    #[command(desc = "Channel name pattern using {id}, {type} and {user}")]
    naming: Option<String>,
    #[command(
        desc = "Close tickets idle this many hours (0 turns it off)",
        min_value = 0,
        max_value = 720
    )]
    auto_close_hours: Option<i64>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "ticket", desc = "Configure the ticket system.")]
pub enum TicketCommand {
    #[command(name = "panel")]
    Panel(TicketPanel),
    #[command(name = "type")]
    Type(TicketTypeGroup),
    #[command(name = "question")]
    Question(TicketQuestionGroup),
    #[command(name = "staff")]
    Staff(TicketStaffGroup),
    #[command(name = "settings")]
    Settings(TicketSettings),
}

async fn load_config(state: &State, guild_id: Id<GuildMarker>) -> Result<TicketConfig> {
    Ok(state
        .store
        .ticket_config(guild_id)
        .await?
        .unwrap_or_else(|| TicketConfig::new(guild_id)))
}

fn settings_embed(config: &TicketConfig) -> twilight_model::channel::message::Embed {
    let mention =
        |id: Option<Id<ChannelMarker>>| id.map_or("not set".to_string(), |id| format!("<#{id}>"));
    let staff: Vec<String> = config
        .staff_roles
        .iter()
        .map(|role| {
            let mut caps = Vec::new();
            if role.can_close {
                caps.push("close");
            }
            if role.can_assign {
                caps.push("claim");
            }
            if role.can_reopen {
                caps.push("reopen");
            }
            if role.can_delete {
                caps.push("delete");
            }
            format!("<@&{}> ({})", role.role_id, caps.join(", "))
        })
        .collect();
    let types: Vec<String> = config
        .ticket_types
        .iter()
        .map(|(key, kind)| format!("`{key}` {} ({} questions)", kind.label, kind.questions.len()))
        .collect();
    let or_none = |items: Vec<String>| {
        if items.is_empty() {
            "none".to_string()
        } else {
            items.join("\n")
        }
    };
    EmbedBuilder::new()
        .title("🎫 Ticket settings")
        .color(TICKET_COLOR)
        .field(EmbedFieldBuilder::new("Category", mention(config.category_id)).inline())
        .field(EmbedFieldBuilder::new("Log channel", mention(config.log_channel_id)).inline())
        .field(EmbedFieldBuilder::new("Naming", format!("`{}`", config.naming_pattern)).inline())
        .field(
            EmbedFieldBuilder::new(
                "Auto-close",
                config
                    .auto_close_hours
                    .map_or("off".to_string(), |hours| format!("after {hours}h idle")),
            )
            .inline(),
        )
        .field(EmbedFieldBuilder::new("Types", or_none(types)))
        .field(EmbedFieldBuilder::new("Staff roles", or_none(staff)))
        .build()
}

#[async_trait]
impl Command<GlobalState> for TicketCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let guild_id = cmd_ctx.require_guild()?;
        cmd_ctx.ensure_permissions(&state.cache, Permissions::MANAGE_GUILD)?;
        let mut config = load_config(&state, guild_id).await?;

        let group = cmd_ctx.subcommand();
        let response = match group.as_deref() {
            Some("panel") => {
                let channel_id = match cmd_ctx.get_arg::<Id<ChannelMarker>>("channel") {
                    Some(channel_id) => channel_id,
                    None => cmd_ctx.require_channel()?,
                };
                let title = cmd_ctx
                    .get_remainder_arg("title")
                    .unwrap_or_else(|| "🎫 Support tickets".to_string());
                let panel = panel_message(&config, &title, None)?;
                state
                    .http
                    .create_message(channel_id)
                    .embeds(&panel.embeds)
                    .components(&panel.components)
                    .await?;
                tracing::info!(%guild_id, %channel_id, "Ticket panel posted");
                notice(format!("Posted the ticket panel in <#{channel_id}>."))
            }
            Some("type") => match cmd_ctx.subcommand().as_deref() {
                Some("add") => {
                    let name: String = cmd_ctx.require_arg("name")?;
                    let description = cmd_ctx.get_remainder_arg("description");
                    let key = config.add_type(&name, description)?;
                    state.store.save_ticket_config(&config).await?;
                    notice(format!(
                        "Saved ticket type `{key}`. Add questions with `/ticket question add`."
                    ))
                }
                Some("remove") => {
                    let name = cmd_ctx.require_arg::<String>("name")?;
                    if !config.remove_type(&name) {
                        bail!("There is no ticket type `{name}`.");
                    }
                    state.store.save_ticket_config(&config).await?;
                    notice(format!(
                        "Removed ticket type `{name}`. Re-post the panel to update its buttons."
                    ))
                }
                _ => bail!("Use `type add` or `type remove`."),
            },
            Some("question") => match cmd_ctx.subcommand().as_deref() {
                Some("add") => {
                    let kind: String = cmd_ctx.require_arg("kind")?;
                    let (paragraph, required): (Option<bool>, Option<bool>) =
                        if matches!(cmd_ctx, CommandContext::Slash(_)) {
                            (cmd_ctx.get_arg("paragraph"), cmd_ctx.get_arg("required"))
                        } else {
                            (None, None)
                        };
                    let label = cmd_ctx
                        .get_remainder_arg("label")
                        .ok_or_else(|| anyhow::anyhow!("Give the question some text."))?;
                    let next = config
                        .ticket_types
                        .get(&TicketConfig::type_key(&kind)?)
                        .map_or(1, |t| t.questions.len() + 1);
                    let count = config.add_question(
                        &kind,
                        TicketQuestion {
                            id: format!("q{next}"),
                            label: label.trim().to_string(),
                            style: if paragraph.unwrap_or(false) {
                                QuestionStyle::Paragraph
                            } else {
                                QuestionStyle::Short
                            },
                            required: required.unwrap_or(true),
                            placeholder: None,
                            max_length: None,
                        },
                    )?;
                    state.store.save_ticket_config(&config).await?;
                    notice(format!("Added question {count} to `{kind}`."))
                }
                _ => bail!("Use `question add`."),
            },
            Some("staff") => match cmd_ctx.subcommand().as_deref() {
                Some("add") => {
                    let role_id: Id<RoleMarker> = cmd_ctx.require_arg("role")?;
                    let role = StaffRole {
                        role_id,
                        can_close: cmd_ctx.get_arg("close").unwrap_or(true),
                        can_assign: cmd_ctx.get_arg("assign").unwrap_or(true),
                        can_delete: cmd_ctx.get_arg("delete").unwrap_or(false),
                        can_reopen: cmd_ctx.get_arg("reopen").unwrap_or(true),
                    };
                    config.set_staff(role);
                    state.store.save_ticket_config(&config).await?;
                    notice(format!("<@&{role_id}> is now ticket staff."))
                }
                Some("remove") => {
                    let role_id: Id<RoleMarker> = cmd_ctx.require_arg("role")?;
                    if !config.remove_staff(role_id) {
                        bail!("<@&{role_id}> isn't a staff role.");
                    }
                    state.store.save_ticket_config(&config).await?;
                    notice(format!("<@&{role_id}> is no longer ticket staff."))
                }
                _ => bail!("Use `staff add` or `staff remove`."),
            },
            Some("settings") | None => {
                let category: Option<Id<ChannelMarker>> = cmd_ctx.get_arg("category");
                let log_channel: Option<Id<ChannelMarker>> = cmd_ctx.get_arg("log_channel");
                let naming: Option<String> = cmd_ctx.get_arg("naming");
                let auto_close: Option<i64> = cmd_ctx.get_arg("auto_close_hours");

                let changed = category.is_some()
                    || log_channel.is_some()
                    || naming.is_some()
                    || auto_close.is_some();
                if let Some(category) = category {
                    config.category_id = Some(category);
                }
                if let Some(log_channel) = log_channel {
                    config.log_channel_id = Some(log_channel);
                }
                if let Some(naming) = naming.filter(|n| !n.trim().is_empty()) {
                    config.naming_pattern = naming.trim().to_string();
                }
                if let Some(hours) = auto_close {
                    config.set_auto_close_hours(hours);
                }
                if changed {
                    state.store.save_ticket_config(&config).await?;
                    tracing::info!(%guild_id, "Ticket settings updated");
                }
                CommandResponseBuilder::new()
                    .embed(settings_embed(&config))
                    .ephemeral()
                    .build()
            }
            Some(other) => bail!("Unknown ticket action `{other}`."),
        };
        cmd_ctx.reply(response).await?;
        Ok(())
    }
}
