use anyhow::Result;
use async_trait::async_trait;
use twilight_interactions::command::{CommandModel, CreateCommand};
use twilight_util::builder::embed::{EmbedBuilder, EmbedFooterBuilder};

use super::COMMANDS;
use crate::command_handler::{Command, CommandContext, CommandResponseBuilder, GlobalState};

const HELP_COLOR: u32 = 0xe67e22;

/// One line per command: name, aliases and description.
pub fn command_lines() -> Vec<String> {
    COMMANDS
        .iter()
        .map(|def| {
            let description = (def.create_slash_data_fn)().description;
            if def.aliases.is_empty() {
                format!("`/{}` {description}", def.name)
            } else {
                format!("`/{}` ({}) {description}", def.name, def.aliases.join(", "))
            }
        })
        .collect()
}

#[derive(CommandModel, CreateCommand)]
#[command(name = "help", desc = "List every command.")]
pub struct HelpCommand;

#[async_trait]
impl Command<GlobalState> for HelpCommand {
    async fn execute<'ctx>(state: GlobalState, cmd_ctx: CommandContext<'ctx>) -> Result<()> {
        let embed = EmbedBuilder::new()
            .title("🔥 Hearth commands")
            .description(command_lines().join("\n"))
            .color(HELP_COLOR)
            .footer(EmbedFooterBuilder::new(format!(
                "Prefix commands work too: {}play, {}remind me in 10m to stretch",
                state.config.configured_prefix, state.config.configured_prefix
            )))
            .build();
        cmd_ctx
            .reply(CommandResponseBuilder::new().embed(embed).ephemeral().build())
            .await?;
        Ok(())
    }
}
