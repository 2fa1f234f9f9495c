//! Comparing local slash command definitions with what Discord has
//! registered, for the `deploy` binary.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use twilight_http::{
    api_error::ApiError,
    error::{Error as HttpError, ErrorType},
};
use twilight_model::application::command::Command;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CommandDiff {
    pub added: Vec<String>,
    pub changed: Vec<String>,
    pub removed: Vec<String>,
    pub unchanged: Vec<String>,
}

impl CommandDiff {
    pub fn has_changes(&self) -> bool {
        !(self.added.is_empty() && self.changed.is_empty() && self.removed.is_empty())
    }
}

impl fmt::Display for CommandDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (marker, names) in [
            ("+", &self.added),
            ("~", &self.changed),
            ("-", &self.removed),
            ("=", &self.unchanged),
        ] {
            for name in names {
                writeln!(f, "  {marker} /{name}")?;
            }
        }
        write!(
            f,
            "{} added, {} changed, {} removed, {} unchanged",
            self.added.len(),
            self.changed.len(),
            self.removed.len(),
            self.unchanged.len()
        )
    }
}

/// Drops ids, versions and defaulted fields so a registered command
/// compares equal to the definition it was created from.
fn normalize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| {
                    !matches!(
                        key.as_str(),
                        "id"
                            | "application_id"
                            | "guild_id"
                            | "version"
                            | "dm_permission"
                            | "contexts"
                            | "integration_types"
                    )
                })
                .filter(|(_, v)| !matches!(v, Value::Null | Value::Bool(false)))
                .filter(|(_, v)| !matches!(v, Value::Array(items) if items.is_empty()))
                .map(|(key, v)| (key, normalize(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(normalize).collect()),
        other => other,
    }
}

fn fingerprint(command: &Command) -> Value {
    normalize(serde_json::to_value(command).unwrap_or(Value::Null))
}

pub fn command_diff(local: &[Command], remote: &[Command]) -> CommandDiff {
    let remote: BTreeMap<&str, &Command> = remote.iter().map(|c| (c.name.as_str(), c)).collect();
    let mut diff = CommandDiff::default();

    for command in local {
        match remote.get(command.name.as_str()) {
            None => diff.added.push(command.name.clone()),
            Some(existing) if fingerprint(existing) != fingerprint(command) => {
                diff.changed.push(command.name.clone());
            }
            Some(_) => diff.unchanged.push(command.name.clone()),
        }
    }
    diff.removed = remote
        .keys()
        .filter(|name| !local.iter().any(|c| c.name == **name))
        .map(|name| (*name).to_string())
        .collect();
    diff
}

/// Seconds Discord asked us to wait, when `error` is a rate limit.
pub fn retry_after(error: &anyhow::Error) -> Option<f64> {
    let http = error.chain().find_map(|cause| cause.downcast_ref::<HttpError>())?;
    match http.kind() {
        ErrorType::Response {
            error: ApiError::Ratelimited(limited),
            ..
        } => Some(limited.retry_after),
        ErrorType::Response { status, body, .. } if status.get() == 429 => {
            serde_json::from_slice::<Value>(body)
                .ok()?
                .get("retry_after")?
                .as_f64()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use twilight_model::application::command::CommandType;
    use twilight_util::builder::command::{CommandBuilder, StringBuilder};

    fn command(name: &str, description: &str) -> Command {
        CommandBuilder::new(name, description, CommandType::ChatInput)
            .option(StringBuilder::new("query", "What to look for").required(true))
            .build()
    }

    #[test]
    fn test_diff_classifies_commands() {
        let local = vec![
            command("play", "Play"),
            command("skip", "Skip"),
            command("new", "New"),
        ];
        let mut registered = vec![
            command("play", "Play"),
            command("skip", "Skip a track"),
            command("old", "Old"),
        ];
        registered[0].id = Some(twilight_model::id::Id::new(42));
        registered[0].version = twilight_model::id::Id::new(7);

        let diff = command_diff(&local, &registered);
        assert_eq!(diff.added, vec!["new"]);
        assert_eq!(diff.changed, vec!["skip"]);
        assert_eq!(diff.removed, vec!["old"]);
        assert_eq!(diff.unchanged, vec!["play"]);
        assert!(diff.has_changes());
        assert!(diff.to_string().ends_with("1 added, 1 changed, 1 removed, 1 unchanged"));
    }

    #[test]
    fn test_identical_sets_have_no_changes() {
        let local = vec![command("play", "Play")];
        assert!(!command_diff(&local, &local).has_changes());
    }
}
