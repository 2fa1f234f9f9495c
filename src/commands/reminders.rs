use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_model::{
    channel::message::component::ButtonStyle,
    guild::Permissions,
    id::{
        Id,
        marker::{ChannelMarker, GuildMarker, UserMarker},
    },
};
use twilight_util::builder::embed::EmbedBuilder;

use crate::command_handler::{Command, CommandContext, CommandResponseBuilder, GlobalState, notice};
use crate::components::{ComponentAction, ReminderAction};
use crate::models::ReminderTarget;
use crate::reminders::{
    NewReminder, REMINDER_COLOR, cancel_reminder, confirmation_embed, create_reminder,
    parse_timezone,
    phrase::{PhraseTarget, parse_reminder_phrase},
};
use crate::store::{load_user, update_user};
use crate::utils::discord::{action_row, button, truncate};

const LIST_LIMIT: usize = 15;

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "remind", desc = "Set a reminder.")]
pub struct RemindCommand {
    #[command(desc = "When, e.g. `in 10m`, `in 2h 30m` or `2025-01-31 18:00`")]
    when: String,
    #[command(desc = "What to remind about")]
    task: String,
    #[command(desc = "Remind someone else by DM")]
    user: Option<Id<UserMarker>>,
    #[command(desc = "Post the reminder in a channel instead")]
    channel: Option<Id<ChannelMarker>>,
}

/// A channel reminder may only go to a channel of the invoking server that the
/// invoker can post in.
fn check_channel_target(
    invoking_guild: Option<Id<GuildMarker>>,
    channel_guild: Option<Id<GuildMarker>>,
    permissions: Permissions,
) -> Result<()> {
    let Some(guild_id) = invoking_guild else {
        bail!("Channel reminders can only be set from a server.");
    };
    if channel_guild != Some(guild_id) {
        bail!("That channel isn't in this server.");
    }
    let needed = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;
    if !permissions.contains(Permissions::ADMINISTRATOR) && !permissions.contains(needed) {
        bail!("You can't send messages in that channel.");
    }
    Ok(())
}

/// Reads `;remind me in 10m to do X` style arguments.
fn prefix_request(input: &str) -> Result<(ReminderTarget, String, String)> {
    let phrase = parse_reminder_phrase(input).ok_or_else(|| {
        anyhow!(
            "Try `remind me in 10m to stretch` or \
             `remind #channel at 2025-01-31 18:00 to vote`."
        )
    })?;
    let target = match phrase.target {
        PhraseTarget::Me => ReminderTarget::Author,
        PhraseTarget::User(user) => ReminderTarget::User(user),
        PhraseTarget::Channel(channel) => ReminderTarget::Channel(channel),
    };
    Ok((target, phrase.when, phrase.task))
}

#[async_trait]
impl Command<GlobalState> for RemindCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let user_id = cmd_ctx.user_id()?;
        let (target, when, task) = if matches!(cmd_ctx, CommandContext::Prefix(_)) {
            let input = cmd_ctx.get_remainder_arg("when").unwrap_or_default();
            prefix_request(&input)?
        } else {
            let when: String = cmd_ctx.require_arg("when")?;
            let task: String = cmd_ctx.require_arg("task")?;
            let user: Option<Id<UserMarker>> = cmd_ctx.get_arg("user");
            let channel: Option<Id<ChannelMarker>> = cmd_ctx.get_arg("channel");
            let target = match (user, channel) {
                (Some(_), Some(_)) => bail!("Pick either a user or a channel, not both."),
                (Some(user), None) if user != user_id => ReminderTarget::User(user),
                (_, Some(channel)) => ReminderTarget::Channel(channel),
                _ => ReminderTarget::Author,
            };
            (target, when, task)
        };
        if let ReminderTarget::Channel(channel_id) = target {
            let channel_guild = state
                .cache
                .channel(channel_id)
                .and_then(|channel| channel.guild_id);
            let permissions = state
                .cache
                .permissions()
                .in_channel(user_id, channel_id)
                .unwrap_or_else(|e| {
                    tracing::debug!(
                        error = ?e,
                        %channel_id,
                        "Couldn't compute channel permissions from cache"
                    );
                    Permissions::empty()
                });
            check_channel_target(cmd_ctx.guild_id(), channel_guild, permissions)?;
        }

        let profile = load_user(&*state.store, user_id).await?;
        let reminder = create_reminder(
            &*state.store,
            &state.reminders,
            NewReminder {
                user_id,
                guild_id: cmd_ctx.guild_id(),
                target,
                when,
                task,
                timezone: profile.preferences.timezone,
            },
            Utc::now(),
        )
        .await?;

        let cancel =
            ComponentAction::Reminder(ReminderAction::Cancel(reminder.reminder_id.clone()));
        cmd_ctx
            .reply(
                CommandResponseBuilder::new()
                    .embed(confirmation_embed(&reminder))
                    .component(action_row(vec![button(
                        cancel.to_string(),
                        "Cancel",
                        ButtonStyle::Danger,
                    )]))
                    .build(),
            )
            .await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "list", desc = "List your pending reminders.")]
pub struct RemindersList;

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "cancel", desc = "Cancel one of your reminders.")]
pub struct RemindersCancel {
    #[command(desc = "Reminder ID (shown in the list)")]
    id: String,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "reminders", desc = "Manage your reminders.")]
pub enum RemindersCommand {
    #[command(name = "list")]
    List(RemindersList),
    #[command(name = "cancel")]
    Cancel(RemindersCancel),
}

#[async_trait]
impl Command<GlobalState> for RemindersCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let user_id = cmd_ctx.user_id()?;
        let response = match cmd_ctx.subcommand().as_deref() {
            Some("cancel") => {
                let id: String = cmd_ctx.require_arg("id")?;
                if !cancel_reminder(&*state.store, &state.reminders, user_id, id.trim()).await? {
                    bail!("You have no reminder with ID `{}`.", id.trim());
                }
                notice(format!("🗑️ Cancelled reminder `{}`.", id.trim()))
            }
            Some("list") | None => {
                let mut reminders = state.store.reminders_for_user(user_id).await?;
                reminders.sort_by_key(|r| r.trigger_timestamp);
                let mut lines: Vec<String> = reminders
                    .iter()
                    .take(LIST_LIMIT)
                    .map(|r| {
                        format!(
                            "`{}` <t:{}:R>: {}",
                            r.reminder_id,
                            r.trigger_unix_seconds(),
                            truncate(&r.task_description, 80)
                        )
                    })
                    .collect();
                if reminders.len() > LIST_LIMIT {
                    lines.push(format!("…and {} more", reminders.len() - LIST_LIMIT));
                }
                let embed = EmbedBuilder::new()
                    .title("⏰ Your reminders")
                    .description(if lines.is_empty() {
                        "You have no pending reminders.".to_string()
                    } else {
                        lines.join("\n")
                    })
                    .color(REMINDER_COLOR)
                    .build();
                CommandResponseBuilder::new().embed(embed).ephemeral().build()
            }
            Some(other) => bail!("Unknown action `{other}`. Use `list` or `cancel`."),
        };
        cmd_ctx.reply(response).await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "set", desc = "Set the timezone your reminder times are read in.")]
pub struct TimezoneSet {
    #[command(desc = "IANA name such as Europe/Berlin or America/New_York")]
    zone: String,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "show", desc = "Show your timezone.")]
pub struct TimezoneShow;

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "timezone", desc = "View or change your timezone.")]
pub enum TimezoneCommand {
    #[command(name = "set")]
    Set(TimezoneSet),
    #[command(name = "show")]
    Show(TimezoneShow),
}

#[async_trait]
impl Command<GlobalState> for TimezoneCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let user_id = cmd_ctx.user_id()?;
        let zone = match cmd_ctx.subcommand().as_deref() {
            Some("set") => {
                let input: String = cmd_ctx.require_arg("zone")?;
                let tz = parse_timezone(&input)?;
                update_user(&*state.store, user_id, |user| {
                    user.preferences.timezone = tz.name().to_string();
                })
                .await?;
                tracing::debug!(%user_id, timezone = tz.name(), "Timezone updated");
                tz
            }
            Some("show") | None => {
                let profile = load_user(&*state.store, user_id).await?;
                parse_timezone(&profile.preferences.timezone)?
            }
            Some(other) => bail!("Unknown action `{other}`. Use `set` or `show`."),
        };
        let local = Utc::now().with_timezone(&zone);
        cmd_ctx
            .reply(notice(format!(
                "🌍 Your timezone is **{}** (local time {}).",
                zone.name(),
                local.format("%Y-%m-%d %H:%M")
            )))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_request() {
        let (target, when, task) = prefix_request("me in 10m to do X").unwrap();
        assert_eq!(target, ReminderTarget::Author);
        assert_eq!(when, "in 10m");
        assert_eq!(task, "do X");
        assert!(prefix_request("in 10m").is_err());
    }

    #[test]
    fn test_channel_target_checks() {
        let here = Some(Id::new(1));
        let post = Permissions::VIEW_CHANNEL | Permissions::SEND_MESSAGES;

        assert!(check_channel_target(here, here, post).is_ok());
        assert!(check_channel_target(here, here, Permissions::ADMINISTRATOR).is_ok());
        assert!(check_channel_target(here, Some(Id::new(2)), post).is_err());
        assert!(check_channel_target(here, None, post).is_err());
        assert!(check_channel_target(None, here, post).is_err());
        assert!(check_channel_target(here, here, Permissions::VIEW_CHANNEL).is_err());
    }
}
