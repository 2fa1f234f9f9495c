use anyhow::anyhow;
use chrono::Utc;
use twilight_model::channel::message::Component;
use twilight_util::builder::embed::EmbedBuilder;

use crate::command_handler::{CommandResponse, CommandResponseBuilder, notice};
use crate::components::{InteractionCtx, MusicAction};
use crate::music::{self, MUSIC_COLOR, player};
use crate::store::update_user;
use crate::utils::discord::truncate;

/// The message the button sits on, with its components swapped out.
fn same_message(
    ctx: &InteractionCtx,
    content: Option<String>,
    components: Vec<Component>,
) -> CommandResponse {
    let (embeds, original) = ctx
        .message()
        .map(|message| (message.embeds.clone(), message.content.clone()))
        .unwrap_or_default();
    CommandResponse {
        embeds,
        content: content.unwrap_or(original),
        components,
        ephemeral: false,
    }
}

pub async fn handle(ctx: &InteractionCtx, action: MusicAction) -> anyhow::Result<()> {
    let guild_id = ctx.guild_id()?;
    let user_id = ctx.user_id()?;
    let state = &ctx.state;

    match action {
        MusicAction::Pause => {
            player::ensure_listener(&state.cache, guild_id, user_id)?;
            let context = state
                .lavalink
                .get_player_context(guild_id)
                .ok_or_else(|| anyhow!("Nothing is playing in this server."))?;
            let paused = !context.get_player().await?.paused;
            context.set_pause(paused).await?;
            tracing::debug!(%guild_id, paused, "Playback toggled");
            ctx.update_message(same_message(ctx, None, player::control_rows(paused)))
                .await
        }
        MusicAction::Skip => {
            player::ensure_listener(&state.cache, guild_id, user_id)?;
            let skipped = state
                .music
                .snapshot(guild_id)
                .and_then(|queue| queue.current.map(|track| track.title().to_string()))
                .ok_or_else(|| anyhow!("Nothing is playing in this server."))?;
            ctx.defer_update().await?;
            let next =
                player::start_next(&state.lavalink, &state.music_context(), guild_id, true).await?;
            let content = match next {
                Some(_) => format!("⏩ <@{user_id}> skipped **{}**.", truncate(&skipped, 100)),
                None => format!(
                    "⏩ <@{user_id}> skipped **{}**. The queue is empty.",
                    truncate(&skipped, 100)
                ),
            };
            let response = same_message(ctx, Some(content), Vec::new());
            ctx.edit_reply(response).await
        }
        MusicAction::Stop => {
            player::ensure_listener(&state.cache, guild_id, user_id)?;
            player::leave(&state.songbird, &state.lavalink, &state.music_context(), guild_id)
                .await?;
            tracing::info!(%guild_id, %user_id, "Playback stopped from controls");
            let content = format!("⏹️ <@{user_id}> stopped playback and cleared the queue.");
            ctx.update_message(same_message(ctx, Some(content), Vec::new()))
                .await
        }
        MusicAction::Loop => {
            player::ensure_listener(&state.cache, guild_id, user_id)?;
            let mode = state.music.with(guild_id, |queue| {
                queue.loop_mode = queue.loop_mode.cycle();
                queue.loop_mode
            });
            ctx.respond(notice(format!("🔁 Loop mode: **{}**", mode.label())))
                .await
        }
        MusicAction::Favorite => {
            let current = state
                .music
                .snapshot(guild_id)
                .and_then(|queue| queue.current)
                .ok_or_else(|| anyhow!("Nothing is playing in this server."))?;
            let entry = current.history_entry(Utc::now());
            let added = update_user(&*state.store, user_id, |user| user.add_favorite(entry)).await?;
            let message = if added {
                format!("❤️ Added **{}** to your favorites.", truncate(current.title(), 100))
            } else {
                "That track is already in your favorites.".to_string()
            };
            ctx.respond(notice(message)).await
        }
        MusicAction::Lyrics => {
            ctx.defer_reply(true).await?;
            let title = state
                .music
                .snapshot(guild_id)
                .and_then(|queue| queue.current.map(|track| track.title().to_string()))
                .unwrap_or_else(|| "Lyrics".to_string());
            let response = match music::lyrics(&state.lavalink, &state.reqwest, guild_id).await? {
                Some(lyrics) => CommandResponseBuilder::new()
                    .embed(
                        EmbedBuilder::new()
                            .title(format!("🎤 {}", truncate(&title, 200)))
                            .description(truncate(&lyrics, 4000))
                            .color(MUSIC_COLOR)
                            .build(),
                    )
                    .build(),
                None => notice("No lyrics found for this track."),
            };
            ctx.edit_reply(response).await
        }
        MusicAction::Queue(page) => {
            let queue = state.music.snapshot(guild_id).unwrap_or_default();
            let response = CommandResponseBuilder::new()
                .embed(player::queue_embed(&queue, page))
                .components(player::queue_nav(&queue, page))
                .ephemeral()
                .build();
            let on_queue_message = ctx
                .message()
                .and_then(|message| message.embeds.first())
                .and_then(|embed| embed.title.as_deref())
                == Some(player::QUEUE_TITLE);
            if on_queue_message {
                ctx.update_message(response).await
            } else {
                ctx.respond(response).await
            }
        }
    }
}
