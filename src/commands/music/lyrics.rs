use anyhow::{Result, anyhow};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_util::builder::embed::EmbedBuilder;

use crate::command_handler::{Command, CommandContext, CommandResponseBuilder, GlobalState};
use crate::music::{self, MUSIC_COLOR};
use crate::utils::discord::truncate;

#[derive(CommandModel, CreateCommand)]
#[command(name = "lyrics", desc = "Show the lyrics of the current track.")]
pub struct LyricsCommand;

#[async_trait]
impl Command<GlobalState> for LyricsCommand {
    async fn execute<'ctx>(state: GlobalState, cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let guild_id = cmd_ctx.require_guild()?;
        let title = state
            .music
            .snapshot(guild_id)
            .and_then(|queue| queue.current.map(|track| track.title().to_string()))
            .ok_or_else(|| anyhow!("Nothing is playing."))?;

        cmd_ctx.defer(false).await?;
        let lyrics = music::lyrics(&state.lavalink, &state.reqwest, guild_id)
            .await?
            .ok_or_else(|| anyhow!("No lyrics found for **{}**.", truncate(&title, 100)))?;

        let embed = EmbedBuilder::new()
            .title(format!("🎤 {}", truncate(&title, 200)))
            .description(truncate(&lyrics, 4000))
            .color(MUSIC_COLOR)
            .build();
        cmd_ctx
            .reply(CommandResponseBuilder::new().embed(embed).build())
            .await?;
        Ok(())
    }
}
