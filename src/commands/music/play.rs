use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_util::builder::embed::EmbedBuilder;

use super::listener;
use crate::command_handler::{Command, CommandContext, CommandResponseBuilder, GlobalState};
use crate::music::{self, LoadOutcome, MUSIC_COLOR, QueuedTrack, SearchSource, build_query, player};
use crate::store::load_user;
use crate::utils::discord::truncate;

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "play", desc = "Play a song or playlist, or add it to the queue.")]
pub struct PlayCommand {
    #[command(desc = "A link or what to search for")]
    query: String,
    #[command(desc = "Where to search: yt, ytm, sc, sp, am or dz (defaults to your preference)")]
    source: Option<String>,
}

#[async_trait]
impl Command<GlobalState> for PlayCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, user_id, voice_channel) = listener(&state, &cmd_ctx)?;
        let text_channel = cmd_ctx.require_channel()?;
        let query = cmd_ctx
            .get_remainder_arg("query")
            .ok_or_else(|| anyhow!("Tell me what to play."))?;
        let source: Option<String> = cmd_ctx.get_arg("source");

        cmd_ctx.defer(false).await?;

        let profile = load_user(&*state.store, user_id).await?;
        let source = match source {
            Some(source) => source.parse::<SearchSource>().map_err(|e| anyhow!(e))?,
            None => profile.preferences.search_source.parse().unwrap_or_default(),
        };
        let volume = state
            .music
            .snapshot(guild_id)
            .map_or(profile.preferences.default_volume, |queue| queue.volume);

        player::join(&state.songbird, &state.lavalink, guild_id, voice_channel, volume).await?;

        let outcome = music::load(&state.lavalink, guild_id, &build_query(&query, source)).await?;
        let description = match &outcome {
            LoadOutcome::Error(message) => bail!("Lavalink couldn't load that: {message}"),
            LoadOutcome::Empty => bail!("No results for `{}`.", truncate(&query, 100)),
            LoadOutcome::Playlist { name, tracks } => {
                format!("Queued playlist **{}** ({} tracks)", truncate(name, 100), tracks.len())
            }
            LoadOutcome::Track(track) => format!("Queued **{}**", truncate(&track.info.title, 100)),
            LoadOutcome::Search(results) => match results.first() {
                Some(track) => format!("Queued **{}**", truncate(&track.info.title, 100)),
                None => bail!("No results for `{}`.", truncate(&query, 100)),
            },
        };

        let tracks = outcome
            .into_tracks()
            .into_iter()
            .map(|track| QueuedTrack::new(track, user_id));
        let (idle, position) = state.music.with(guild_id, |queue| {
            queue.text_channel = Some(text_channel);
            queue.volume = volume;
            let idle = queue.enqueue(tracks);
            (idle, queue.upcoming.len())
        });
        tracing::info!(%guild_id, %user_id, %source, "Tracks queued");

        if idle {
            player::start_next(&state.lavalink, &state.music_context(), guild_id, false).await?;
        }

        let footer = if idle {
            "Starting playback".to_string()
        } else {
            format!("{position} tracks up next")
        };
        let embed = EmbedBuilder::new()
            .description(format!("➕ {description}"))
            .footer(twilight_util::builder::embed::EmbedFooterBuilder::new(footer))
            .color(MUSIC_COLOR)
            .build();
        cmd_ctx
            .reply(CommandResponseBuilder::new().embed(embed).build())
            .await?;
        Ok(())
    }
}
