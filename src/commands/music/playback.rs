use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};

use super::{listener, player_context};
use crate::command_handler::{Command, CommandContext, CommandResponseBuilder, GlobalState};
use crate::music::{FilterPreset, LoopMode, player, queue::MAX_VOLUME};
use crate::utils::discord::truncate;

fn text(content: impl Into<String>) -> crate::command_handler::CommandResponse {
    CommandResponseBuilder::new().content(content).build()
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "skip", desc = "Skip the current track.")]
pub struct SkipCommand;

#[async_trait]
impl Command<GlobalState> for SkipCommand {
    async fn execute<'ctx>(state: GlobalState, cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, _, _) = listener(&state, &cmd_ctx)?;
        let skipped = state
            .music
            .snapshot(guild_id)
            .and_then(|queue| queue.current.map(|track| track.title().to_string()))
            .ok_or_else(|| anyhow!("Nothing is playing."))?;
        let next =
            player::start_next(&state.lavalink, &state.music_context(), guild_id, true).await?;
        let content = match next {
            Some(next) => format!(
                "⏩ Skipped **{}**. Up now: **{}**",
                truncate(&skipped, 100),
                truncate(next.title(), 100)
            ),
            None => format!(
                "⏩ Skipped **{}**. That was the last track.",
                truncate(&skipped, 100)
            ),
        };
        cmd_ctx.reply(text(content)).await?;
        Ok(())
    }
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "stop", desc = "Stop playback, clear the queue and leave the voice channel.")]
pub struct StopCommand;

#[async_trait]
impl Command<GlobalState> for StopCommand {
    async fn execute<'ctx>(state: GlobalState, cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, _, _) = listener(&state, &cmd_ctx)?;
        player::leave(&state.songbird, &state.lavalink, &state.music_context(), guild_id).await?;
        cmd_ctx
            .reply(text("⏹️ Stopped and cleared the queue."))
            .await?;
        Ok(())
    }
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "pause", desc = "Pause or resume playback.")]
pub struct PauseCommand;

#[async_trait]
impl Command<GlobalState> for PauseCommand {
    async fn execute<'ctx>(state: GlobalState, cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, _, _) = listener(&state, &cmd_ctx)?;
        let context = player_context(&state, guild_id)?;
        let paused = !context.get_player().await?.paused;
        context.set_pause(paused).await?;
        let content = if paused { "⏸️ Paused." } else { "▶️ Resumed." };
        cmd_ctx.reply(text(content)).await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "volume", desc = "Change the playback volume.")]
pub struct VolumeCommand {
    #[command(desc = "Volume level (0-150)", min_value = 0, max_value = 150)]
    level: i64,
}

#[async_trait]
impl Command<GlobalState> for VolumeCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, _, _) = listener(&state, &cmd_ctx)?;
        let level: i64 = cmd_ctx.require_arg("level")?;
        let level = u16::try_from(level)
            .ok()
            .filter(|level| *level <= MAX_VOLUME)
            .ok_or_else(|| anyhow!("Volume must be between 0 and {MAX_VOLUME}."))?;
        player_context(&state, guild_id)?.set_volume(level).await?;
        state.music.with(guild_id, |queue| queue.set_volume(level));
        cmd_ctx
            .reply(text(format!("🔊 Volume set to {level}%.")))
            .await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "loop", desc = "Set the loop mode, or cycle through off, track and queue.")]
pub struct LoopCommand {
    #[command(desc = "off, track or queue")]
    mode: Option<String>,
}

#[async_trait]
impl Command<GlobalState> for LoopCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, _, _) = listener(&state, &cmd_ctx)?;
        let requested = cmd_ctx
            .get_arg::<String>("mode")
            .map(|mode| mode.parse::<LoopMode>().map_err(|e| anyhow!(e)))
            .transpose()?;
        let mode = state.music.with(guild_id, |queue| {
            queue.loop_mode = requested.unwrap_or_else(|| queue.loop_mode.cycle());
            queue.loop_mode
        });
        cmd_ctx
            .reply(text(format!("🔁 Loop mode: **{}**", mode.label())))
            .await?;
        Ok(())
    }
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "filter", desc = "Apply an audio filter.")]
pub struct FilterCommand {
    #[command(desc = "off, bassboost, nightcore, vaporwave or 8d")]
    preset: String,
}

#[async_trait]
impl Command<GlobalState> for FilterCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, _, _) = listener(&state, &cmd_ctx)?;
        let preset: FilterPreset = cmd_ctx
            .require_arg::<String>("preset")?
            .parse()
            .map_err(|e| anyhow!("{e}"))?;
        player_context(&state, guild_id)?
            .set_filters(preset.filters()?)
            .await?;
        state.music.with(guild_id, |queue| queue.filter = preset);
        let content = match preset {
            FilterPreset::Off => "🎛️ Filters cleared.".to_string(),
            preset => format!("🎛️ Filter **{preset}** applied."),
        };
        cmd_ctx.reply(text(content)).await?;
        Ok(())
    }
}

/// Accepts `90`, `1:30`, `1:02:03` or a humantime duration like `1m30s`.
pub fn parse_position(input: &str) -> Option<Duration> {
    let input = input.trim();
    if input.contains(':') {
        let mut seconds = 0u64;
        let parts: Vec<&str> = input.split(':').collect();
        if parts.len() > 3 {
            return None;
        }
        for part in parts {
            seconds = seconds.checked_mul(60)?.checked_add(part.parse().ok()?)?;
        }
        return Some(Duration::from_secs(seconds));
    }
    if let Ok(seconds) = input.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    humantime::parse_duration(input).ok()
}

#[allow(unused)]
#[derive(CommandModel, CreateCommand)]
#[command(name = "seek", desc = "Jump to a position in the current track.")]
pub struct SeekCommand {
    #[command(desc = "Position, e.g. 1:30 or 90")]
    position: String,
}

#[async_trait]
impl Command<GlobalState> for SeekCommand {
    async fn execute<'ctx>(state: GlobalState, mut cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let (guild_id, _, _) = listener(&state, &cmd_ctx)?;
        let input: String = cmd_ctx.require_arg("position")?;
        let position = parse_position(&input)
            .ok_or_else(|| anyhow!("`{input}` isn't a position. Try `1:30`."))?;

        let current = state
            .music
            .snapshot(guild_id)
            .and_then(|queue| queue.current)
            .ok_or_else(|| anyhow!("Nothing is playing."))?;
        let info = &current.track.info;
        if !info.is_seekable {
            bail!("This track can't be seeked.");
        }
        if position.as_millis() >= u128::from(info.length) {
            bail!("That's past the end of the track.");
        }
        player_context(&state, guild_id)?.set_position(position).await?;
        cmd_ctx
            .reply(text(format!(
                "⏩ Seeked to `{}`.",
                humantime::format_duration(position)
            )))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("90"), Some(Duration::from_secs(90)));
        assert_eq!(parse_position("1:30"), Some(Duration::from_secs(90)));
        assert_eq!(parse_position("1:02:03"), Some(Duration::from_secs(3723)));
        assert_eq!(parse_position("1m 30s"), Some(Duration::from_secs(90)));
        assert_eq!(parse_position("1:2:3:4"), None);
        assert_eq!(parse_position("soon"), None);
    }
}
