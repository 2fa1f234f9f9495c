use twilight_model::{
    application::interaction::{Interaction, application_command::CommandData},
    channel::Message,
};

use crate::command_handler::definition::GlobalState;
use crate::commands::COMMANDS;

pub async fn slash_handler(
    interaction: Interaction,
    data: CommandData,
    state: GlobalState,
) -> anyhow::Result<()> {
    match COMMANDS.iter().find(|cmd_def| cmd_def.name == data.name.as_str()) {
        Some(cmd_def) => (cmd_def.slash_executor)(state, interaction, data).await,
        None => {
            tracing::warn!(name = %data.name, "Unknown slash command");
            Ok(())
        }
    }
}

/// Runs a prefix command if `message` is one. Returns whether it was.
pub async fn prefix_handler(
    message: &Message,
    configured_prefix: &str,
    state: GlobalState,
) -> anyhow::Result<bool> {
    if message.author.bot {
        return Ok(false);
    }

    let Some(parsed_command) = crate::prefix_parser::parse(&message.content, configured_prefix)
    else {
        return Ok(false);
    };

    let command_name = parsed_command.command;
    match COMMANDS.iter().find(|cmd_def| cmd_def.matches(command_name)) {
        Some(cmd_def) => {
            (cmd_def.prefix_executor)(
                state,
                message,
                parsed_command.arguments(),
                configured_prefix.to_string(),
            )
            .await?;
            Ok(true)
        }
        None => {
            tracing::debug!(command = command_name, "Unknown prefix command");
            Ok(false)
        }
    }
}
