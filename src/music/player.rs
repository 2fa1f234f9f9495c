use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::Utc;
use lavalink_rs::{client::LavalinkClient, model::player::ConnectionInfo};
use songbird::{ConnectionInfo as SongbirdConnectionInfo, Songbird};
use twilight_cache_inmemory::InMemoryCache;
use twilight_model::{
    channel::message::{Component, Embed, component::ButtonStyle},
    id::{
        Id,
        marker::{ChannelMarker, GuildMarker, UserMarker},
    },
};
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder, ImageSource};

use super::queue::{GuildQueue, LoopMode, QueuedTrack};
use super::{MUSIC_COLOR, MusicContext};
use crate::components::{ComponentAction, MusicAction};
use crate::store::update_user;
use crate::utils::discord::{action_row, button, truncate};

fn convert_connection_info(connection_info: SongbirdConnectionInfo) -> ConnectionInfo {
    ConnectionInfo {
        endpoint: connection_info.endpoint,
        token: connection_info.token,
        session_id: connection_info.session_id,
    }
}

/// Joins `channel_id` unless a call already exists. Returns whether a new
/// connection was made.
pub async fn join(
    songbird: &Songbird,
    lavalink: &LavalinkClient,
    guild_id: Id<GuildMarker>,
    channel_id: Id<ChannelMarker>,
    volume: u16,
) -> anyhow::Result<bool> {
    if songbird.get(guild_id).is_some() && lavalink.get_player_context(guild_id).is_some() {
        return Ok(false);
    }

    let (connection_info, _) = songbird
        .join_gateway(guild_id, channel_id)
        .await
        .map_err(|e| anyhow!("Failed to join voice channel: {e}"))?;

    let player = lavalink
        .create_player_context(guild_id, convert_connection_info(connection_info))
        .await
        .context("Failed to create Lavalink player")?;
    player.set_volume(volume).await?;

    tracing::info!(%guild_id, %channel_id, "Joined voice channel");
    Ok(true)
}

pub async fn leave(
    songbird: &Songbird,
    lavalink: &LavalinkClient,
    ctx: &MusicContext,
    guild_id: Id<GuildMarker>,
) -> anyhow::Result<()> {
    ctx.queues.remove(guild_id);
    if let Err(e) = lavalink.delete_player(guild_id).await {
        tracing::debug!(error = ?e, %guild_id, "No Lavalink player to delete");
    }
    songbird.remove(guild_id).await?;
    Ok(())
}

/// The member's current voice channel, from the cache.
pub fn member_voice_channel(
    cache: &InMemoryCache,
    guild_id: Id<GuildMarker>,
    user_id: Id<UserMarker>,
) -> anyhow::Result<Id<ChannelMarker>> {
    cache
        .voice_state(user_id, guild_id)
        .map(|state| state.channel_id())
        .ok_or_else(|| anyhow!("You must be in a voice channel to use this command."))
}

/// The member's voice channel, provided the bot is either not connected or
/// connected to that same channel.
pub fn ensure_listener(
    cache: &InMemoryCache,
    guild_id: Id<GuildMarker>,
    user_id: Id<UserMarker>,
) -> anyhow::Result<Id<ChannelMarker>> {
    let channel_id = member_voice_channel(cache, guild_id, user_id)?;
    let bot_channel = cache
        .current_user()
        .and_then(|bot| cache.voice_state(bot.id, guild_id))
        .map(|state| state.channel_id());
    match bot_channel {
        Some(bot_channel) if bot_channel != channel_id => {
            Err(anyhow!("You need to be in <#{bot_channel}> to control playback."))
        }
        _ => Ok(channel_id),
    }
}

/// Advances the queue and plays what comes next, or stops the player when
/// the queue ran out.
pub async fn start_next(
    lavalink: &LavalinkClient,
    ctx: &MusicContext,
    guild_id: Id<GuildMarker>,
    was_skipped: bool,
) -> anyhow::Result<Option<QueuedTrack>> {
    let (next, snapshot) = ctx.queues.with(guild_id, |queue| {
        let next = queue.advance(was_skipped).cloned();
        (next, queue.clone())
    });

    let player = lavalink
        .get_player_context(guild_id)
        .ok_or_else(|| anyhow!("Nothing is playing in this server."))?;

    let Some(next) = next else {
        player.stop_now().await?;
        tracing::debug!(%guild_id, "Queue finished");
        return Ok(None);
    };

    player
        .play_now(&next.track)
        .await
        .with_context(|| format!("Failed to play {}", next.title()))?;

    record_history(ctx, &next);
    if let Some(channel_id) = snapshot.text_channel {
        announce(ctx, channel_id, &next, &snapshot).await;
    }
    Ok(Some(next))
}

fn record_history(ctx: &MusicContext, track: &QueuedTrack) {
    let store = ctx.store.clone();
    let requester = track.requester;
    let entry = track.history_entry(Utc::now());
    tokio::spawn(async move {
        if let Err(e) =
            update_user(&*store, requester, |user| user.push_history(entry, Utc::now())).await
        {
            tracing::warn!(error = ?e, user_id = %requester, "Failed to record play history");
        }
    });
}

async fn announce(
    ctx: &MusicContext,
    channel_id: Id<ChannelMarker>,
    track: &QueuedTrack,
    queue: &GuildQueue,
) {
    let embed = now_playing_embed(track, queue, 0);
    let result = ctx
        .http
        .create_message(channel_id)
        .embeds(&[embed])
        .components(&control_rows(false))
        .await;
    if let Err(e) = result {
        tracing::warn!(error = ?e, %channel_id, "Failed to announce track");
    }
}

fn format_ms(ms: u64) -> String {
    humantime::format_duration(Duration::from_secs(ms / 1000)).to_string()
}

pub fn now_playing_embed(track: &QueuedTrack, queue: &GuildQueue, position_ms: u64) -> Embed {
    let info = &track.track.info;
    let mut embed = EmbedBuilder::new()
        .title("🎶 Now Playing")
        .description(format!("**{}** by **{}**", truncate(&info.title, 200), info.author))
        .color(MUSIC_COLOR);

    if let Some(thumbnail) = info
        .artwork_url
        .as_deref()
        .and_then(|url| ImageSource::url(url).ok())
    {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(uri) = &info.uri {
        embed = embed.url(uri.clone());
    }

    let duration = if info.is_stream {
        "🔴 Live".to_string()
    } else {
        format!("{} / {}", format_ms(position_ms), format_ms(info.length))
    };

    embed
        .field(EmbedFieldBuilder::new("Duration", duration).inline())
        .field(EmbedFieldBuilder::new("Requested by", format!("<@{}>", track.requester)).inline())
        .field(EmbedFieldBuilder::new("Volume", format!("{}%", queue.volume)).inline())
        .field(EmbedFieldBuilder::new("Loop", queue.loop_mode.label()).inline())
        .field(EmbedFieldBuilder::new("Filter", queue.filter.name()).inline())
        .field(EmbedFieldBuilder::new("Up next", queue.upcoming.len().to_string()).inline())
        .build()
}

pub fn control_rows(paused: bool) -> Vec<Component> {
    let music = |action| ComponentAction::Music(action).to_string();
    let pause_label = if paused { "▶️ Resume" } else { "⏸️ Pause" };
    vec![
        action_row(vec![
            button(music(MusicAction::Pause), pause_label, ButtonStyle::Secondary),
            button(music(MusicAction::Skip), "⏩ Skip", ButtonStyle::Primary),
            button(music(MusicAction::Stop), "⏹️ Stop", ButtonStyle::Danger),
            button(music(MusicAction::Loop), "🔁 Loop", ButtonStyle::Secondary),
            button(music(MusicAction::Favorite), "❤️ Favorite", ButtonStyle::Secondary),
        ]),
        action_row(vec![
            button(music(MusicAction::Lyrics), "🎤 Lyrics", ButtonStyle::Secondary),
            button(music(MusicAction::Queue(1)), "📜 Queue", ButtonStyle::Secondary),
        ]),
    ]
}

pub const QUEUE_TITLE: &str = "🎶 Queue";

pub fn queue_embed(queue: &GuildQueue, page: usize) -> Embed {
    let page = queue.page(page, super::queue::PAGE_SIZE);
    let mut description = match &queue.current {
        Some(current) => format!("**Now:** {} (<@{}>)\n\n", current.title(), current.requester),
        None => "Nothing is playing.\n\n".to_string(),
    };
    if page.entries.is_empty() {
        description.push_str("The queue is empty.");
    } else {
        for (position, track) in &page.entries {
            description.push_str(&format!(
                "`{position}.` {} - {} ({})\n",
                truncate(track.title(), 80),
                track.track.info.author,
                format_ms(track.track.info.length)
            ));
        }
    }
    let loop_note = match queue.loop_mode {
        LoopMode::Off => String::new(),
        mode => format!(" · loop: {mode}"),
    };
    EmbedBuilder::new()
        .title(QUEUE_TITLE)
        .description(description)
        .color(MUSIC_COLOR)
        .footer(twilight_util::builder::embed::EmbedFooterBuilder::new(format!(
            "Page {}/{} · {} tracks{}",
            page.page,
            page.total_pages,
            queue.upcoming.len(),
            loop_note
        )))
        .build()
}

/// Previous/next buttons for a queue page, omitted when there is one page.
/// The button pointing past either end is disabled.
pub fn queue_nav(queue: &GuildQueue, page: usize) -> Option<Component> {
    let total = queue.total_pages(super::queue::PAGE_SIZE);
    if total <= 1 {
        return None;
    }
    let page = page.clamp(1, total);
    let nav = |target: usize, label: &str, disabled: bool| {
        let mut component = button(
            ComponentAction::Music(MusicAction::Queue(target)).to_string(),
            label,
            ButtonStyle::Secondary,
        );
        if let Component::Button(inner) = &mut component {
            inner.disabled = disabled;
        }
        component
    };
    Some(action_row(vec![
        nav(page.saturating_sub(1).max(1), "◀", page == 1),
        nav((page + 1).min(total), "▶", page == total),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::music::queue::tests::track;

    #[test]
    fn test_now_playing_embed_fields() {
        let mut queue = GuildQueue::default();
        queue.enqueue([QueuedTrack::new(track("song"), Id::new(42))]);
        queue.advance(false);
        let current = queue.current.clone().expect("current track");
        let embed = now_playing_embed(&current, &queue, 61_000);
        assert!(embed.description.as_deref().unwrap_or_default().contains("song"));
        let duration = &embed.fields[0].value;
        assert!(duration.starts_with("1m 1s"), "{duration}");
        assert_eq!(embed.fields[1].value, "<@42>");
    }

    #[test]
    fn test_queue_nav_bounds() {
        let mut queue = GuildQueue::default();
        assert!(queue_nav(&queue, 1).is_none());
        queue.enqueue((0..15).map(|i| QueuedTrack::new(track(&format!("t{i}")), Id::new(1))));
        let Some(Component::ActionRow(row)) = queue_nav(&queue, 1) else {
            panic!("expected a nav row");
        };
        let (Component::Button(prev), Component::Button(next)) =
            (&row.components[0], &row.components[1])
        else {
            panic!("expected buttons");
        };
        assert!(prev.disabled);
        assert_eq!(next.custom_id.as_deref(), Some("music_queue:2"));
        assert_ne!(prev.custom_id, next.custom_id);
    }
}
