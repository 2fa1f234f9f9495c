use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};

use super::{listener, player_context};
use crate::command_handler::{Command, CommandContext, CommandResponseBuilder, GlobalState};
use crate::music::player;
use crate::utils::discord::truncate;

fn text(content: impl Into<String>) -> crate::command_handler::CommandResponse {
    CommandResponseBuilder::new().content(content).build()
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "queue", desc = "Show the upcoming tracks.")]
pub struct QueueCommand {
    #[command(desc = "Page number", min_value = 1)]
    page: Option<i64>,
}

#[async_trait]
impl Command<GlobalState> for QueueCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let guild_id = cmd_ctx.require_guild()?;
        let page = cmd_ctx
            .get_arg::<u64>("page")
            .and_then(|page| usize::try_from(page).ok())
            .unwrap_or(1);
        let queue = state.music.snapshot(guild_id).unwrap_or_default();
        let response = CommandResponseBuilder::new()
            .embed(player::queue_embed(&queue, page))
            .components(player::queue_nav(&queue, page))
            .build();
        cmd_ctx.reply(response).await?;
        Ok(())
    }
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "now_playing", desc = "Show the current track.")]
pub struct NowPlayingCommand;

#[async_trait]
impl Command<GlobalState> for NowPlayingCommand {
    async fn execute<'ctx>(state: GlobalState, cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let guild_id = cmd_ctx.require_guild()?;
        let queue = state.music.snapshot(guild_id).unwrap_or_default();
        let current = queue
            .current
            .as_ref()
            .ok_or_else(|| anyhow!("Nothing is playing."))?;
        let lavalink_player = player_context(&state, guild_id)?.get_player().await?;
        let response = CommandResponseBuilder::new()
            .embed(player::now_playing_embed(current, &queue, lavalink_player.state.position))
            .components(player::control_rows(lavalink_player.paused))
            .build();
        cmd_ctx.reply(response).await?;
        Ok(())
    }
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "shuffle", desc = "Shuffle the upcoming tracks.")]
pub struct ShuffleCommand;

#[async_trait]
impl Command<GlobalState> for ShuffleCommand {
    async fn execute<'ctx>(state: GlobalState, cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, _, _) = listener(&state, &cmd_ctx)?;
        let count = state.music.with(guild_id, |queue| {
            queue.shuffle();
            queue.upcoming.len()
        });
        if count < 2 {
            bail!("There's nothing to shuffle.");
        }
        cmd_ctx
            .reply(text(format!("🔀 Shuffled {count} tracks.")))
            .await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "remove", desc = "Remove a track from the queue.")]
pub struct RemoveCommand {
    #[command(desc = "Queue position of the track", min_value = 1)]
    position: i64,
}

#[async_trait]
impl Command<GlobalState> for RemoveCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, _, _) = listener(&state, &cmd_ctx)?;
        let position: u64 = cmd_ctx.require_arg("position")?;
        let removed = state
            .music
            .with(guild_id, |queue| queue.remove_at(position as usize))
            .ok_or_else(|| anyhow!("There's no track at position {position}."))?;
        cmd_ctx
            .reply(text(format!("🗑️ Removed **{}**.", truncate(removed.title(), 100))))
            .await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "move", desc = "Move a track to another queue position.")]
pub struct MoveCommand {
    #[command(desc = "Current queue position", min_value = 1)]
    from: i64,
    #[command(desc = "New queue position", min_value = 1)]
    to: i64,
}

#[async_trait]
impl Command<GlobalState> for MoveCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, _, _) = listener(&state, &cmd_ctx)?;
        let from: u64 = cmd_ctx.require_arg("from")?;
        let to: u64 = cmd_ctx.require_arg("to")?;
        let moved = state.music.with(guild_id, |queue| {
            queue
                .move_track(from as usize, to as usize)
                .then(|| queue.upcoming.get(to as usize - 1).map(|track| track.title().to_string()))
                .flatten()
        });
        let title = moved.ok_or_else(|| anyhow!("Both positions must be in the queue."))?;
        cmd_ctx
            .reply(text(format!("↕️ Moved **{}** to position {to}.", truncate(&title, 100))))
            .await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "jump", desc = "Skip ahead to a track in the queue.")]
pub struct JumpCommand {
    #[command(desc = "Queue position to jump to", min_value = 1)]
    position: i64,
}

#[async_trait]
impl Command<GlobalState> for JumpCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, _, _) = listener(&state, &cmd_ctx)?;
        let position: u64 = cmd_ctx.require_arg("position")?;
        if !state.music.with(guild_id, |queue| queue.jump(position as usize)) {
            bail!("There's no track at position {position}.");
        }
        let next = player::start_next(&state.lavalink, &state.music_context(), guild_id, true)
            .await?
            .ok_or_else(|| anyhow!("The queue is empty."))?;
        cmd_ctx
            .reply(text(format!("⏭️ Jumped to **{}**.", truncate(next.title(), 100))))
            .await?;
        Ok(())
    }
}
