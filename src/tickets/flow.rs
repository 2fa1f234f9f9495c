use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::Utc;
use twilight_model::{
    channel::{
        ChannelType,
        message::{
            Component, Embed,
            component::{ButtonStyle, TextInputStyle},
        },
    },
    guild::Permissions,
    http::{
        interaction::InteractionResponseData,
        permission_overwrite::{PermissionOverwrite, PermissionOverwriteType},
    },
    id::{
        Id,
        marker::{ChannelMarker, GuildMarker, UserMarker},
    },
};
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder, EmbedFooterBuilder};

use super::{
    Actor, SweepDecision, TicketAction, TicketKey, apply, authorize, decide, insert_with_next_id,
    ticket_key,
};
use crate::command_handler::{CommandResponse, CommandResponseBuilder, notice};
use crate::components::{ComponentAction, InteractionCtx, ModalAction, TicketButton};
use crate::models::{
    QuestionStyle, Ticket, TicketAnswer, TicketConfig, TicketQuestion, TicketStatus,
};
use crate::state::State;
use crate::utils::discord::{action_row, button, button_rows, text_input, timestamp, truncate};

pub const TICKET_COLOR: u32 = 0x5865f2;
const MODAL_TITLE_MAX: usize = 45;
const MAX_MODAL_INPUTS: usize = 5;
const ANSWER_FIELD_MAX: usize = 1024;

const OWNER_ALLOW: Permissions = Permissions::VIEW_CHANNEL
    .union(Permissions::SEND_MESSAGES)
    .union(Permissions::READ_MESSAGE_HISTORY)
    .union(Permissions::ATTACH_FILES);

fn default_question() -> TicketQuestion {
    TicketQuestion {
        id: "details".to_string(),
        label: "How can we help?".to_string(),
        style: QuestionStyle::Paragraph,
        required: true,
        placeholder: None,
        max_length: Some(1000),
    }
}

fn questions_for(config: &TicketConfig, ticket_type: &str) -> Vec<TicketQuestion> {
    let questions = config
        .ticket_types
        .get(ticket_type)
        .map(|kind| kind.questions.clone())
        .unwrap_or_default();
    if questions.is_empty() {
        vec![default_question()]
    } else {
        questions.into_iter().take(MAX_MODAL_INPUTS).collect()
    }
}

async fn load_config(state: &State, guild_id: Id<GuildMarker>) -> anyhow::Result<TicketConfig> {
    state
        .store
        .ticket_config(guild_id)
        .await?
        .ok_or_else(|| anyhow!("Tickets aren't set up in this server yet."))
}

/// The modal for opening a ticket of `ticket_type`, one input per question.
pub fn ticket_modal(
    config: &TicketConfig,
    ticket_type: &str,
) -> anyhow::Result<InteractionResponseData> {
    let kind = config
        .ticket_types
        .get(ticket_type)
        .ok_or_else(|| anyhow!("The ticket type `{ticket_type}` no longer exists."))?;

    let components = questions_for(config, ticket_type)
        .into_iter()
        .map(|question| {
            let style = match question.style {
                QuestionStyle::Short => TextInputStyle::Short,
                QuestionStyle::Paragraph => TextInputStyle::Paragraph,
            };
            let mut input = text_input(
                question.id,
                truncate(&question.label, MODAL_TITLE_MAX),
                style,
                question.required,
            );
            input.placeholder = question.placeholder;
            input.max_length = question.max_length;
            action_row(vec![Component::TextInput(input)])
        })
        .collect();

    Ok(InteractionResponseData {
        custom_id: Some(ModalAction::Ticket(ticket_type.to_string()).to_string()),
        title: Some(truncate(&format!("Open a ticket: {}", kind.label), MODAL_TITLE_MAX)),
        components: Some(components),
        ..Default::default()
    })
}

pub async fn open_modal(ctx: &InteractionCtx, ticket_type: &str) -> anyhow::Result<()> {
    let config = load_config(&ctx.state, ctx.guild_id()?).await?;
    ctx.show_modal(ticket_modal(&config, ticket_type)?).await
}

/// Pairs submitted values with their question labels, in question order.
pub fn collect_answers(
    questions: &[TicketQuestion],
    values: &HashMap<String, String>,
) -> Vec<TicketAnswer> {
    questions
        .iter()
        .filter_map(|question| {
            let answer = values.get(&question.id)?.trim();
            (!answer.is_empty()).then(|| TicketAnswer {
                question: question.label.clone(),
                answer: answer.to_string(),
            })
        })
        .collect()
}

fn owner_overwrite(user_id: Id<UserMarker>, can_send: bool) -> PermissionOverwrite {
    let (allow, deny) = if can_send {
        (OWNER_ALLOW, Permissions::empty())
    } else {
        (
            Permissions::VIEW_CHANNEL | Permissions::READ_MESSAGE_HISTORY,
            Permissions::SEND_MESSAGES,
        )
    };
    PermissionOverwrite {
        allow: Some(allow),
        deny: Some(deny),
        id: user_id.cast(),
        kind: PermissionOverwriteType::Member,
    }
}

fn channel_overwrites(
    state: &State,
    config: &TicketConfig,
    owner: Id<UserMarker>,
) -> Vec<PermissionOverwrite> {
    let mut overwrites = vec![
        PermissionOverwrite {
            allow: None,
            deny: Some(Permissions::VIEW_CHANNEL),
            id: config.guild_id.cast(),
            kind: PermissionOverwriteType::Role,
        },
        owner_overwrite(owner, true),
    ];
    overwrites.extend(config.staff_roles.iter().map(|staff| PermissionOverwrite {
        allow: Some(OWNER_ALLOW | Permissions::MANAGE_MESSAGES),
        deny: None,
        id: staff.role_id.cast(),
        kind: PermissionOverwriteType::Role,
    }));
    if let Some(bot) = state.cache.current_user() {
        overwrites.push(PermissionOverwrite {
            allow: Some(OWNER_ALLOW | Permissions::MANAGE_CHANNELS),
            deny: None,
            id: bot.id.cast(),
            kind: PermissionOverwriteType::Member,
        });
    }
    overwrites
}

fn ticket_button(action: TicketButton, label: &str, style: ButtonStyle) -> Component {
    button(ComponentAction::Ticket(action).to_string(), label, style)
}

pub fn open_controls(ticket_id: &str) -> Component {
    action_row(vec![
        ticket_button(
            TicketButton::Close(ticket_id.to_string()),
            "🔒 Close",
            ButtonStyle::Danger,
        ),
        ticket_button(
            TicketButton::Claim(ticket_id.to_string()),
            "🙋 Claim",
            ButtonStyle::Secondary,
        ),
    ])
}

pub fn closed_controls(ticket_id: &str) -> Component {
    action_row(vec![
        ticket_button(
            TicketButton::Reopen(ticket_id.to_string()),
            "🔓 Reopen",
            ButtonStyle::Success,
        ),
        ticket_button(
            TicketButton::Delete(ticket_id.to_string()),
            "🗑️ Delete",
            ButtonStyle::Danger,
        ),
    ])
}

/// The public panel: one open button per ticket type.
pub fn panel_message(
    config: &TicketConfig,
    title: &str,
    description: Option<&str>,
) -> anyhow::Result<CommandResponse> {
    if config.ticket_types.is_empty() {
        return Err(anyhow!("Add a ticket type first with `/ticket type add`."));
    }
    let listing: Vec<String> = config
        .ticket_types
        .values()
        .map(|kind| match &kind.description {
            Some(description) => format!("**{}**: {}", kind.label, description),
            None => format!("**{}**", kind.label),
        })
        .collect();
    let embed = EmbedBuilder::new()
        .title(truncate(title, 256))
        .description(format!(
            "{}\n\n{}",
            description.unwrap_or("Pick the kind of help you need to open a private ticket."),
            listing.join("\n")
        ))
        .color(TICKET_COLOR)
        .build();
    let buttons = config
        .ticket_types
        .iter()
        .map(|(key, kind)| {
            ticket_button(
                TicketButton::Open(key.clone()),
                &truncate(&kind.label, 80),
                ButtonStyle::Primary,
            )
        })
        .collect();
    Ok(CommandResponseBuilder::new()
        .embed(embed)
        .components(button_rows(buttons))
        .build())
}

pub fn ticket_embed(config: &TicketConfig, ticket: &Ticket) -> Embed {
    let label = config
        .ticket_types
        .get(&ticket.ticket_type)
        .map_or(ticket.ticket_type.as_str(), |kind| kind.label.as_str());
    let mut embed = EmbedBuilder::new()
        .title(format!("🎫 Ticket #{} · {}", ticket.ticket_id, label))
        .description(format!(
            "Opened by <@{}>. Staff will be with you shortly.",
            ticket.user_id
        ))
        .color(TICKET_COLOR)
        .footer(EmbedFooterBuilder::new(format!("Ticket {}", ticket.ticket_id)));
    for answer in &ticket.answers {
        embed = embed.field(EmbedFieldBuilder::new(
            truncate(&answer.question, 256),
            truncate(&answer.answer, ANSWER_FIELD_MAX),
        ));
    }
    if let Some(created) = timestamp(ticket.created_at) {
        embed = embed.timestamp(created);
    }
    embed.build()
}

async fn log_line(state: &State, config: &TicketConfig, line: String) {
    let Some(channel_id) = config.log_channel_id else {
        return;
    };
    let embed = EmbedBuilder::new()
        .description(line)
        .color(TICKET_COLOR)
        .build();
    if let Err(e) = state.http.create_message(channel_id).embeds(&[embed]).await {
        tracing::warn!(error = ?e, %channel_id, "Failed to write ticket log");
    }
}

/// Creates the ticket record and its private channel from a submitted modal.
pub async fn submit(
    ctx: &InteractionCtx,
    ticket_type: &str,
    values: &HashMap<String, String>,
) -> anyhow::Result<()> {
    ctx.defer_reply(true).await?;
    let state = &ctx.state;
    let guild_id = ctx.guild_id()?;
    let user_id = ctx.user_id()?;
    let config = load_config(state, guild_id).await?;
    if !config.ticket_types.contains_key(ticket_type) {
        return Err(anyhow!("The ticket type `{ticket_type}` no longer exists."));
    }

    let answers = collect_answers(&questions_for(&config, ticket_type), values);
    let draft = Ticket::draft(guild_id, user_id, ticket_type, answers, Utc::now());
    let mut ticket = insert_with_next_id(&*state.store, draft).await?;

    let username = ctx
        .interaction
        .author()
        .map_or_else(|| user_id.to_string(), |user| user.name.clone());
    let name = config.channel_name(&ticket.ticket_id, ticket_type, &username);
    let overwrites = channel_overwrites(state, &config, user_id);

    let mut create = state
        .http
        .create_guild_channel(guild_id, &name)
        .kind(ChannelType::GuildText)
        .permission_overwrites(&overwrites);
    if let Some(category) = config.category_id {
        create = create.parent_id(category);
    }
    let channel = match create.await {
        Ok(response) => response.model().await?,
        Err(e) => {
            ticket.status = TicketStatus::Deleted;
            if let Err(store_err) = state.store.update_ticket(&ticket).await {
                tracing::warn!(error = ?store_err, "Failed to discard ticket after channel error");
            }
            return Err(anyhow::Error::new(e)
                .context("Couldn't create the ticket channel. Do I have Manage Channels?"));
        }
    };

    ticket.channel_id = Some(channel.id);
    state.store.update_ticket(&ticket).await?;

    let staff_mentions: Vec<String> = config
        .staff_roles
        .iter()
        .map(|staff| format!("<@&{}>", staff.role_id))
        .collect();
    state
        .http
        .create_message(channel.id)
        .content(&format!("<@{}> {}", user_id, staff_mentions.join(" ")))
        .embeds(&[ticket_embed(&config, &ticket)])
        .components(&[open_controls(&ticket.ticket_id)])
        .await
        .context("Failed to post the ticket summary")?;

    track_open_ticket(state, &config, &ticket);
    tracing::info!(%guild_id, ticket_id = %ticket.ticket_id, %user_id, "Ticket opened");
    log_line(
        state,
        &config,
        format!(
            "🎫 Ticket **#{}** ({}) opened by <@{}> in <#{}>",
            ticket.ticket_id, ticket_type, user_id, channel.id
        ),
    )
    .await;

    ctx.edit_reply(notice(format!("Your ticket is ready: <#{}>", channel.id)))
        .await
}

fn track_open_ticket(state: &Arc<State>, config: &TicketConfig, ticket: &Ticket) {
    if let Some(channel_id) = ticket.channel_id {
        state.ticket_timers.track_channel(channel_id, ticket_key(ticket));
    }
    if let SweepDecision::Arm(delay) = decide(ticket, config.auto_close_hours, Utc::now()) {
        arm_auto_close(state, ticket_key(ticket), delay);
    }
}

fn arm_auto_close(state: &Arc<State>, key: TicketKey, delay: Duration) {
    state
        .ticket_timers
        .arm(key.clone(), delay, auto_close(state.clone(), key));
}

fn auto_close(state: Arc<State>, key: TicketKey) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        state.ticket_timers.cancel(&key);
        if let Err(e) = close_if_idle(&state, &key).await {
            tracing::warn!(error = ?e, guild_id = %key.0, ticket_id = %key.1, "Auto-close failed");
        }
    })
}

async fn close_if_idle(state: &Arc<State>, key: &TicketKey) -> anyhow::Result<()> {
    let (guild_id, ticket_id) = key;
    let Some(ticket) = state.store.ticket(*guild_id, ticket_id).await? else {
        return Ok(());
    };
    let Some(config) = state.store.ticket_config(*guild_id).await? else {
        return Ok(());
    };
    match decide(&ticket, config.auto_close_hours, Utc::now()) {
        SweepDecision::Skip => Ok(()),
        SweepDecision::Arm(delay) => {
            arm_auto_close(state, key.clone(), delay);
            Ok(())
        }
        SweepDecision::CloseNow => close_idle_ticket(state, &config, ticket).await,
    }
}

async fn close_idle_ticket(
    state: &Arc<State>,
    config: &TicketConfig,
    ticket: Ticket,
) -> anyhow::Result<()> {
    let bot_id = state
        .cache
        .current_user()
        .map_or(ticket.user_id, |user| user.id);
    let hours = config.auto_close_hours.unwrap_or_default();
    let response = perform(state, config, ticket, TicketAction::Close, bot_id).await?;
    if let Some(channel_id) = response.channel_id {
        state
            .http
            .create_message(channel_id)
            .content(&format!("Closed after {hours}h without activity."))
            .embeds(&response.response.embeds)
            .components(&response.response.components)
            .await?;
    }
    Ok(())
}

pub struct Performed {
    pub response: CommandResponse,
    pub channel_id: Option<Id<ChannelMarker>>,
}

/// Applies `action` to `ticket`, persists it and adjusts the channel. The
/// returned response describes the new state; deleting the channel is left
/// to the caller so the response can be shown first.
pub async fn perform(
    state: &Arc<State>,
    config: &TicketConfig,
    mut ticket: Ticket,
    action: TicketAction,
    by: Id<UserMarker>,
) -> anyhow::Result<Performed> {
    let now = Utc::now();
    apply(&mut ticket, action, by, now)?;
    state.store.update_ticket(&ticket).await?;

    let key = ticket_key(&ticket);
    let channel_id = ticket.channel_id;
    let mut embed = EmbedBuilder::new()
        .color(TICKET_COLOR)
        .description(format!(
            "Ticket **#{}** {} by <@{}>.",
            ticket.ticket_id,
            action.past_tense(),
            by
        ));
    if let Some(now) = timestamp(now) {
        embed = embed.timestamp(now);
    }
    let mut response = CommandResponseBuilder::new();

    match action {
        TicketAction::Close => {
            state.ticket_timers.cancel(&key);
            if let Some(channel_id) = channel_id {
                set_owner_access(state, channel_id, ticket.user_id, false).await;
            }
            response = response.component(closed_controls(&ticket.ticket_id));
        }
        TicketAction::Reopen => {
            if let Some(channel_id) = channel_id {
                set_owner_access(state, channel_id, ticket.user_id, true).await;
            }
            track_open_ticket(state, config, &ticket);
            response = response.component(open_controls(&ticket.ticket_id));
        }
        TicketAction::Claim => {}
        TicketAction::Delete => {
            state.ticket_timers.cancel(&key);
            if let Some(channel_id) = channel_id {
                state.ticket_timers.forget_channel(channel_id);
            }
            embed = embed.description(format!(
                "Ticket **#{}** deleted by <@{}>. This channel will be removed.",
                ticket.ticket_id, by
            ));
        }
    }

    tracing::info!(
        guild_id = %ticket.guild_id,
        ticket_id = %ticket.ticket_id,
        action = action.verb(),
        %by,
        "Ticket updated"
    );
    log_line(
        state,
        config,
        format!("🎫 Ticket **#{}** {} by <@{}>", ticket.ticket_id, action.past_tense(), by),
    )
    .await;

    Ok(Performed {
        response: response.embed(embed.build()).build(),
        channel_id,
    })
}

async fn set_owner_access(
    state: &State,
    channel_id: Id<ChannelMarker>,
    owner: Id<UserMarker>,
    can_send: bool,
) {
    let overwrite = owner_overwrite(owner, can_send);
    if let Err(e) = state
        .http
        .update_channel_permission(channel_id, &overwrite)
        .await
    {
        tracing::warn!(error = ?e, %channel_id, "Failed to update ticket channel permissions");
    }
}

/// Staff button on a ticket.
pub async fn handle_button(
    ctx: &InteractionCtx,
    action: TicketAction,
    ticket_id: &str,
) -> anyhow::Result<()> {
    let state = &ctx.state;
    let guild_id = ctx.guild_id()?;
    let config = load_config(state, guild_id).await?;
    let ticket = state
        .store
        .ticket(guild_id, ticket_id)
        .await?
        .ok_or_else(|| anyhow!("Ticket #{ticket_id} doesn't exist."))?;

    let actor: Actor = ctx.actor()?;
    authorize(&config, &actor, &ticket, action)?;

    let performed = perform(state, &config, ticket, action, actor.user_id).await?;
    ctx.respond(performed.response).await?;

    if action == TicketAction::Delete {
        if let Some(channel_id) = performed.channel_id {
            tokio::time::sleep(Duration::from_secs(3)).await;
            state
                .http
                .delete_channel(channel_id)
                .await
                .context("Failed to delete the ticket channel")?;
        }
    }
    Ok(())
}

/// A message in an open ticket's channel pushes its auto-close deadline back.
pub async fn touch_activity(
    state: &Arc<State>,
    channel_id: Id<ChannelMarker>,
) -> anyhow::Result<()> {
    let Some((guild_id, ticket_id)) = state.ticket_timers.key_for_channel(channel_id) else {
        return Ok(());
    };
    let Some(mut ticket) = state.store.ticket(guild_id, &ticket_id).await? else {
        state.ticket_timers.forget_channel(channel_id);
        return Ok(());
    };
    if ticket.status != TicketStatus::Open {
        return Ok(());
    }
    ticket.last_activity = Utc::now();
    state.store.update_ticket(&ticket).await?;

    let auto_close_hours = state
        .store
        .ticket_config(guild_id)
        .await?
        .and_then(|config| config.auto_close_hours);
    if let SweepDecision::Arm(delay) = decide(&ticket, auto_close_hours, Utc::now()) {
        arm_auto_close(state, ticket_key(&ticket), delay);
    }
    Ok(())
}

/// Closes overdue open tickets and arms timers for the rest. Runs hourly and
/// once at startup.
pub async fn sweep(state: &Arc<State>) -> anyhow::Result<()> {
    let tickets = state.store.open_tickets().await?;
    let mut configs: HashMap<_, Option<TicketConfig>> = HashMap::new();
    let now = Utc::now();
    let (mut closed, mut armed) = (0usize, 0usize);

    for ticket in tickets {
        if !configs.contains_key(&ticket.guild_id) {
            let config = state.store.ticket_config(ticket.guild_id).await?;
            configs.insert(ticket.guild_id, config);
        }
        let Some(Some(config)) = configs.get(&ticket.guild_id) else {
            continue;
        };
        if let Some(channel_id) = ticket.channel_id {
            state.ticket_timers.track_channel(channel_id, ticket_key(&ticket));
        }
        match decide(&ticket, config.auto_close_hours, now) {
            SweepDecision::Skip => {}
            SweepDecision::Arm(delay) => {
                if !state.ticket_timers.is_armed(&ticket_key(&ticket)) {
                    arm_auto_close(state, ticket_key(&ticket), delay);
                    armed += 1;
                }
            }
            SweepDecision::CloseNow => {
                let ticket_id = ticket.ticket_id.clone();
                match close_idle_ticket(state, config, ticket).await {
                    Ok(()) => closed += 1,
                    Err(e) => tracing::warn!(error = ?e, %ticket_id, "Failed to auto-close ticket"),
                }
            }
        }
    }

    tracing::info!(closed, armed, "Ticket sweep finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketType;

    fn config() -> TicketConfig {
        let mut config = TicketConfig::new(Id::new(1));
        config.ticket_types.insert(
            "bug".to_string(),
            TicketType {
                label: "Bug report".to_string(),
                description: None,
                questions: (0..7)
                    .map(|i| TicketQuestion {
                        id: format!("q{i}"),
                        label: format!(
                            "Question number {i} with a label that is far too long for discord"
                        ),
                        style: QuestionStyle::Short,
                        required: i == 0,
                        placeholder: None,
                        max_length: None,
                    })
                    .collect(),
            },
        );
        config.ticket_types.insert(
            "general".to_string(),
            TicketType {
                label: "General".to_string(),
                description: None,
                questions: Vec::new(),
            },
        );
        config
    }

    #[test]
    fn test_modal_is_capped() {
        let modal = ticket_modal(&config(), "bug").unwrap();
        assert_eq!(modal.custom_id.as_deref(), Some("ticket_modal:bug"));
        let rows = modal.components.unwrap();
        assert_eq!(rows.len(), MAX_MODAL_INPUTS);
        let Component::ActionRow(row) = &rows[0] else {
            panic!("expected action row");
        };
        let Component::TextInput(input) = &row.components[0] else {
            panic!("expected text input");
        };
        assert!(input.label.chars().count() <= MODAL_TITLE_MAX);
        assert!(ticket_modal(&config(), "missing").is_err());
    }

    #[test]
    fn test_panel_has_a_button_per_type() {
        let panel = panel_message(&config(), "Support", None).unwrap();
        let Component::ActionRow(row) = &panel.components[0] else {
            panic!("expected action row");
        };
        assert_eq!(row.components.len(), 2);
        let Component::Button(first) = &row.components[0] else {
            panic!("expected button");
        };
        assert_eq!(first.custom_id.as_deref(), Some("ticket_open:bug"));
        assert!(panel_message(&TicketConfig::new(Id::new(1)), "Support", None).is_err());
    }

    #[test]
    fn test_type_without_questions_gets_default() {
        let questions = questions_for(&config(), "general");
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].id, "details");
    }

    #[test]
    fn test_collect_answers_in_question_order() {
        let questions = questions_for(&config(), "bug");
        let values = HashMap::from([
            ("q2".to_string(), "third".to_string()),
            ("q0".to_string(), " first ".to_string()),
            ("q1".to_string(), "   ".to_string()),
        ]);
        let answers = collect_answers(&questions, &values);
        assert_eq!(answers.len(), 2);
        assert_eq!(answers[0].answer, "first");
        assert_eq!(answers[1].answer, "third");
    }
}
