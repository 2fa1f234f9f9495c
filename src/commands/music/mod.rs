mod library;
mod lyrics;
mod play;
mod playback;
mod queue;

pub use library::{FavoritesCommand, HistoryCommand, PlaylistCommand};
pub use lyrics::LyricsCommand;
pub use play::PlayCommand;
pub use playback::{
    FilterCommand, LoopCommand, PauseCommand, SeekCommand, SkipCommand, StopCommand, VolumeCommand,
};
pub use queue::{
    JumpCommand, MoveCommand, NowPlayingCommand, QueueCommand, RemoveCommand, ShuffleCommand,
};

use anyhow::anyhow;
use lavalink_rs::player_context::PlayerContext;
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, GuildMarker, UserMarker},
};

use crate::command_handler::{CommandContext, GlobalState};
use crate::music::player;

/// Guild, invoking user and their voice channel for a command that controls
/// playback. Fails unless the user shares the bot's channel.
pub(super) fn listener(
    state: &GlobalState,
    ctx: &CommandContext<'_>,
) -> anyhow::Result<(Id<GuildMarker>, Id<UserMarker>, Id<ChannelMarker>)> {
    let guild_id = ctx.require_guild()?;
    let user_id = ctx.user_id()?;
    let channel_id = player::ensure_listener(&state.cache, guild_id, user_id)?;
    Ok((guild_id, user_id, channel_id))
}

pub(super) fn player_context(
    state: &GlobalState,
    guild_id: Id<GuildMarker>,
) -> anyhow::Result<PlayerContext> {
    state
        .lavalink
        .get_player_context(guild_id)
        .ok_or_else(|| anyhow!("I'm not playing anything in this server."))
}
