use std::sync::Arc;

use chrono::Utc;
use twilight_gateway::Event;
use twilight_model::application::interaction::InteractionData;

use super::snapshot::Snapshot;
use crate::command_handler::{prefix_handler, slash_handler};
use crate::components::{route_component, route_modal};
use crate::features::{autorole, chatbot, link_embed, modlog, tempvc};
use crate::state::State;
use crate::tickets::flow::touch_activity;

fn log_failure(result: anyhow::Result<()>, what: &'static str) {
    if let Err(e) = result {
        tracing::error!(error = ?e, "Error handling {what}");
    }
}

pub async fn process(event: Event, snapshot: Snapshot, state: Arc<State>) -> anyhow::Result<()> {
    match event {
        Event::Ready(ready) => {
            tracing::info!(
                user = %ready.user.name,
                guilds = ready.guilds.len(),
                "Gateway session ready"
            );
        }
        Event::InteractionCreate(interaction_payload) => {
            let mut interaction = interaction_payload.0;

            match std::mem::take(&mut interaction.data) {
                Some(InteractionData::ApplicationCommand(data)) => {
                    log_failure(slash_handler(interaction, *data, state).await, "slash command");
                }
                Some(InteractionData::MessageComponent(data)) => {
                    if !route_component(state, interaction, &data).await? {
                        tracing::debug!(
                            custom_id = %data.custom_id,
                            "Ignoring component nobody owns"
                        );
                    }
                }
                Some(InteractionData::ModalSubmit(data)) => {
                    if !route_modal(state, interaction, &data).await? {
                        tracing::debug!(custom_id = %data.custom_id, "Ignoring modal nobody owns");
                    }
                }
                _ => {
                    tracing::debug!(kind = ?interaction.kind, "Ignoring interaction");
                }
            }
        }
        Event::MessageCreate(message_payload) => {
            let message = message_payload.0;
            if message.author.bot {
                return Ok(());
            }
            if message.guild_id.is_some() {
                log_failure(touch_activity(&state, message.channel_id).await, "ticket activity");
            }

            let handled =
                prefix_handler(&message, &state.config.configured_prefix, state.clone()).await?;
            if handled {
                return Ok(());
            }
            log_failure(link_embed::handle_message(&state, &message).await, "message link");
            log_failure(chatbot::handle_message(&state, &message).await, "chatbot message");
        }
        Event::VoiceStateUpdate(update) => {
            log_failure(
                tempvc::handle_voice_state(&state, &update.0, snapshot.previous_voice_channel)
                    .await,
                "voice state update",
            );
        }
        Event::MemberAdd(add) => {
            log_failure(
                autorole::handle_member_add(&state, add.guild_id, &add.member).await,
                "autorole",
            );
            log_failure(
                modlog::post(
                    &state,
                    add.guild_id,
                    modlog::member_joined(&add.member.user, Utc::now()),
                )
                .await,
                "member join log",
            );
        }
        Event::MemberRemove(remove) => {
            log_failure(
                modlog::post(
                    &state,
                    remove.guild_id,
                    modlog::member_left(&remove.user, Utc::now()),
                )
                .await,
                "member leave log",
            );
        }
        Event::BanAdd(ban) => {
            log_failure(
                modlog::post(&state, ban.guild_id, modlog::member_banned(&ban.user, Utc::now()))
                    .await,
                "ban log",
            );
        }
        Event::MessageDelete(delete) => {
            let Some(guild_id) = delete.guild_id else {
                return Ok(());
            };
            if snapshot
                .deleted_message
                .as_ref()
                .is_some_and(|cached| state.cache.user(cached.author_id).is_some_and(|u| u.bot))
            {
                return Ok(());
            }
            let embed = modlog::message_deleted(
                delete.channel_id,
                delete.id,
                snapshot.deleted_message.as_ref(),
                Utc::now(),
            );
            log_failure(modlog::post(&state, guild_id, embed).await, "message delete log");
        }
        Event::MessageUpdate(update) => {
            let (Some(guild_id), false) = (update.guild_id, update.author.bot) else {
                return Ok(());
            };
            if let Some(embed) =
                modlog::message_edited(&update, snapshot.previous_content.as_deref(), Utc::now())
            {
                log_failure(modlog::post(&state, guild_id, embed).await, "message edit log");
            }
        }
        _ => {}
    }
    Ok(())
}
