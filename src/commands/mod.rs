pub mod community;
pub mod help;
pub mod music;
pub mod ping;
pub mod reminders;
pub mod settings;
pub mod tickets;

use once_cell::sync::Lazy;

use crate::{
    command_def,
    command_handler::{CommandDefinition, GlobalState},
};

use community::{LfgCommand, SelfRoleCommand, TemplateCommand};
use help::HelpCommand;
use music::*;
use ping::PingCommand;
use reminders::{RemindCommand, RemindersCommand, TimezoneCommand};
use settings::{AutoRoleCommand, ChatbotCommand, LinkEmbedCommand, ModLogCommand, TempVcCommand};
use tickets::TicketCommand;

pub static COMMANDS: Lazy<Vec<CommandDefinition<GlobalState>>> = Lazy::new(|| {
    vec![
        command_def!(GlobalState, PingCommand),
        command_def!(GlobalState, HelpCommand, aliases = ["h", "commands"]),
        command_def!(GlobalState, PlayCommand, aliases = ["p"]),
        command_def!(GlobalState, SkipCommand, aliases = ["s", "next"]),
        command_def!(GlobalState, StopCommand, aliases = ["st", "leave"]),
        command_def!(GlobalState, PauseCommand, aliases = ["resume"]),
        command_def!(GlobalState, QueueCommand, aliases = ["q"]),
        command_def!(GlobalState, NowPlayingCommand, aliases = ["np", "nowplaying"]),
        command_def!(GlobalState, VolumeCommand, aliases = ["vol", "v"]),
        command_def!(GlobalState, LoopCommand, aliases = ["repeat"]),
        command_def!(GlobalState, ShuffleCommand),
        command_def!(GlobalState, RemoveCommand, aliases = ["rm"]),
        command_def!(GlobalState, MoveCommand, aliases = ["mv"]),
        command_def!(GlobalState, JumpCommand, aliases = ["skipto"]),
        command_def!(GlobalState, FilterCommand, aliases = ["fx"]),
        command_def!(GlobalState, SeekCommand),
        command_def!(GlobalState, LyricsCommand, aliases = ["ly"]),
        command_def!(GlobalState, HistoryCommand),
        command_def!(GlobalState, FavoritesCommand, aliases = ["favs"]),
        command_def!(GlobalState, PlaylistCommand, aliases = ["pl"]),
        command_def!(GlobalState, RemindCommand, aliases = ["remindme"]),
        command_def!(GlobalState, RemindersCommand),
        command_def!(GlobalState, TimezoneCommand, aliases = ["tz"]),
        command_def!(GlobalState, TicketCommand),
        command_def!(GlobalState, SelfRoleCommand),
        command_def!(GlobalState, TempVcCommand),
        command_def!(GlobalState, TemplateCommand),
        command_def!(GlobalState, LfgCommand),
        command_def!(GlobalState, ModLogCommand),
        command_def!(GlobalState, AutoRoleCommand),
        command_def!(GlobalState, LinkEmbedCommand),
        command_def!(GlobalState, ChatbotCommand),
    ]
});

/// Slash command payloads for every registered command.
pub fn slash_definitions() -> Vec<twilight_model::application::command::Command> {
    COMMANDS.iter().map(|def| (def.create_slash_data_fn)()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_aliases_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for def in COMMANDS.iter() {
            assert!(seen.insert(def.name.to_ascii_lowercase()), "duplicate {}", def.name);
            for alias in def.aliases {
                assert!(seen.insert(alias.to_ascii_lowercase()), "duplicate alias {alias}");
            }
        }
    }

    #[test]
    fn test_slash_definitions_build() {
        for def in COMMANDS.iter() {
            let command = (def.create_slash_data_fn)();
            assert_eq!(command.name, def.name);
            assert!(!command.description.is_empty());
        }
    }

    #[test]
    fn test_help_lists_every_command() {
        assert_eq!(help::command_lines().len(), COMMANDS.len());
    }
}
