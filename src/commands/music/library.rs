use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::Utc;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_util::builder::embed::{EmbedBuilder, EmbedFooterBuilder};

use super::listener;
use crate::command_handler::{Command, CommandContext, CommandResponseBuilder, GlobalState, notice};
use crate::models::TrackEntry;
use crate::music::{self, MUSIC_COLOR, QueuedTrack, player};
use crate::store::{load_user, update_user};
use crate::utils::discord::truncate;

const LIST_LIMIT: usize = 10;
const MAX_PLAYLIST_LOAD: usize = 50;

fn track_list(entries: &[TrackEntry]) -> String {
    let mut lines: Vec<String> = entries
        .iter()
        .take(LIST_LIMIT)
        .enumerate()
        .map(|(i, entry)| match &entry.uri {
            Some(uri) => format!(
                "`{}.` [{}](<{uri}>) - {}",
                i + 1,
                truncate(&entry.title, 80),
                entry.author
            ),
            None => format!("`{}.` {} - {}", i + 1, truncate(&entry.title, 80), entry.author),
        })
        .collect();
    if entries.len() > LIST_LIMIT {
        lines.push(format!("…and {} more", entries.len() - LIST_LIMIT));
    }
    lines.join("\n")
}

fn list_embed(
    title: &str,
    entries: &[TrackEntry],
    empty: &str,
) -> twilight_model::channel::message::Embed {
    let description = if entries.is_empty() {
        empty.to_string()
    } else {
        track_list(entries)
    };
    EmbedBuilder::new()
        .title(title)
        .description(description)
        .color(MUSIC_COLOR)
        .build()
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "history", desc = "Show the tracks you played recently.")]
pub struct HistoryCommand;

#[async_trait]
impl Command<GlobalState> for HistoryCommand {
    async fn execute<'ctx>(state: GlobalState, cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let user_id = cmd_ctx.user_id()?;
        let profile = load_user(&*state.store, user_id).await?;
        let mut embed = list_embed(
            "🕘 Recently played",
            &profile.history,
            "You haven't played anything yet.",
        );
        embed.footer = Some(
            EmbedFooterBuilder::new(format!(
                "{} of {} kept",
                profile.history.len(),
                profile.history_limit(Utc::now())
            ))
            .build(),
        );
        cmd_ctx
            .reply(CommandResponseBuilder::new().embed(embed).ephemeral().build())
            .await?;
        Ok(())
    }
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "favorites", desc = "Show your favorite tracks.")]
pub struct FavoritesCommand;

#[async_trait]
impl Command<GlobalState> for FavoritesCommand {
    async fn execute<'ctx>(state: GlobalState, cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let user_id = cmd_ctx.user_id()?;
        let profile = load_user(&*state.store, user_id).await?;
        let embed = list_embed(
            "❤️ Favorites",
            &profile.favorites,
            "No favorites yet. Press ❤️ on a playing track to add one.",
        );
        cmd_ctx
            .reply(CommandResponseBuilder::new().embed(embed).ephemeral().build())
            .await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "create", desc = "Create an empty playlist.")]
pub struct PlaylistCreate {
    #[command(desc = "Playlist name", max_length = 50)]
    name: String,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "add", desc = "Add the current track to a playlist.")]
pub struct PlaylistAdd {
    #[command(desc = "Playlist name")]
    name: String,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "show", desc = "List a playlist, or all of your playlists.")]
pub struct PlaylistShow {
    #[command(desc = "Playlist name")]
    name: Option<String>,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "play", desc = "Queue a whole playlist.")]
pub struct PlaylistPlay {
    #[command(desc = "Playlist name")]
    name: String,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "delete", desc = "Delete a playlist.")]
pub struct PlaylistDelete {
    #[command(desc = "Playlist name")]
    name: String,
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "playlist", desc = "Manage your saved playlists.")]
pub enum PlaylistCommand {
    #[command(name = "create")]
    Create(PlaylistCreate),
    #[command(name = "add")]
    Add(PlaylistAdd),
    #[command(name = "show")]
    Show(PlaylistShow),
    #[command(name = "play")]
    Play(PlaylistPlay),
    #[command(name = "delete")]
    Delete(PlaylistDelete),
}

#[async_trait]
impl Command<GlobalState> for PlaylistCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let user_id = cmd_ctx.user_id()?;
        let subcommand = cmd_ctx
            .subcommand()
            .ok_or_else(|| anyhow!("Use `create`, `add`, `show`, `play` or `delete`."))?;
        let name = cmd_ctx.get_remainder_arg("name");
        let store = &*state.store;

        let response = match subcommand.as_str() {
            "create" => {
                let name = name.ok_or_else(|| anyhow!("Give the playlist a name."))?;
                update_user(store, user_id, |user| user.create_playlist(&name, Utc::now())).await??;
                notice(format!("📁 Created playlist **{}**.", name.trim()))
            }
            "add" => {
                let name = name.ok_or_else(|| anyhow!("Which playlist?"))?;
                let guild_id = cmd_ctx.require_guild()?;
                let current = state
                    .music
                    .snapshot(guild_id)
                    .and_then(|queue| queue.current)
                    .ok_or_else(|| anyhow!("Nothing is playing to add."))?;
                let entry = current.history_entry(Utc::now());
                let count =
                    update_user(store, user_id, |user| user.add_to_playlist(&name, entry)).await??;
                notice(format!(
                    "➕ Added **{}** to **{name}** ({count} tracks).",
                    truncate(current.title(), 100)
                ))
            }
            "show" => {
                let profile = load_user(store, user_id).await?;
                let embed = match name {
                    Some(name) => {
                        let playlist = profile
                            .playlist(&name)
                            .ok_or_else(|| anyhow!("No playlist called `{name}`."))?;
                        list_embed(
                            &format!("📁 {}", playlist.name),
                            &playlist.tracks,
                            "This playlist is empty.",
                        )
                    }
                    None => {
                        let names: Vec<String> = profile
                            .playlists
                            .iter()
                            .map(|p| format!("• **{}** ({} tracks)", p.name, p.tracks.len()))
                            .collect();
                        EmbedBuilder::new()
                            .title("📁 Your playlists")
                            .description(if names.is_empty() {
                                "You have no playlists yet.".to_string()
                            } else {
                                names.join("\n")
                            })
                            .color(MUSIC_COLOR)
                            .build()
                    }
                };
                CommandResponseBuilder::new().embed(embed).ephemeral().build()
            }
            "play" => {
                let name = name.ok_or_else(|| anyhow!("Which playlist?"))?;
                return play_playlist(&state, cmd_ctx, &name).await;
            }
            "delete" => {
                let name = name.ok_or_else(|| anyhow!("Which playlist?"))?;
                if !update_user(store, user_id, |user| user.remove_playlist(&name)).await? {
                    bail!("No playlist called `{name}`.");
                }
                notice(format!("🗑️ Deleted playlist **{name}**."))
            }
            other => bail!("Unknown playlist action `{other}`."),
        };
        cmd_ctx.reply(response).await?;
        Ok(())
    }
}

async fn play_playlist(state: &GlobalState, cmd_ctx: CommandContext<'_>, name: &str) -> Result<()> {
    let (guild_id, user_id, voice_channel) = listener(state, &cmd_ctx)?;
    let text_channel = cmd_ctx.require_channel()?;
    let profile = load_user(&*state.store, user_id).await?;
    let playlist = profile
        .playlist(name)
        .ok_or_else(|| anyhow!("No playlist called `{name}`."))?;
    if playlist.tracks.is_empty() {
        bail!("**{}** is empty.", playlist.name);
    }

    cmd_ctx.defer(false).await?;
    let volume = state
        .music
        .snapshot(guild_id)
        .map_or(profile.preferences.default_volume, |queue| queue.volume);
    player::join(&state.songbird, &state.lavalink, guild_id, voice_channel, volume).await?;

    let source = profile.preferences.search_source.parse().unwrap_or_default();
    let mut loaded = Vec::new();
    let mut missing = 0usize;
    for entry in playlist.tracks.iter().take(MAX_PLAYLIST_LOAD) {
        let query = music::build_query(&entry.query(), source);
        match music::load(&state.lavalink, guild_id, &query).await {
            Ok(outcome) => match outcome.into_tracks().into_iter().next() {
                Some(track) => loaded.push(QueuedTrack::new(track, user_id)),
                None => missing += 1,
            },
            Err(e) => {
                tracing::debug!(error = ?e, title = %entry.title, "Playlist track failed to load");
                missing += 1;
            }
        }
    }
    if loaded.is_empty() {
        bail!("None of the tracks in **{}** could be loaded.", playlist.name);
    }

    let count = loaded.len();
    let idle = state.music.with(guild_id, |queue| {
        queue.text_channel = Some(text_channel);
        queue.enqueue(loaded)
    });
    if idle {
        player::start_next(&state.lavalink, &state.music_context(), guild_id, false).await?;
    }

    let mut content = format!("📁 Queued {count} tracks from **{}**.", playlist.name);
    if missing > 0 {
        content.push_str(&format!(" {missing} couldn't be found."));
    }
    cmd_ctx
        .reply(CommandResponseBuilder::new().content(content).build())
        .await?;
    Ok(())
}
