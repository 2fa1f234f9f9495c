use anyhow::{Result, anyhow};
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};

use crate::command_handler::{Command, CommandContext, CommandResponseBuilder, GlobalState};

#[derive(CommandModel, CreateCommand)]
#[command(name = "ping", desc = "Check if the bot is responsive.")]
pub struct PingCommand;

#[async_trait]
impl Command<GlobalState> for PingCommand {
    async fn execute<'ctx>(state: GlobalState, cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let ping = *state.latency_ms.lock().await;
        let ping = ping
            .ok_or_else(|| anyhow!("Latency is not available; not enough data collected yet."))?;

        let response = CommandResponseBuilder::new()
            .content(format!("🏓 Pong! `({ping}ms)`"))
            .build();
        cmd_ctx.reply(response).await?;
        Ok(())
    }
}
