use std::collections::BTreeMap;

use anyhow::{anyhow, bail};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, GuildMarker, RoleMarker, UserMarker},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
    Deleted,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TicketStatus::Open => "open",
            TicketStatus::Closed => "closed",
            TicketStatus::Deleted => "deleted",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketAnswer {
    pub question: String,
    pub answer: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub ticket_id: String,
    pub ticket_number: u64,
    pub guild_id: Id<GuildMarker>,
    pub channel_id: Option<Id<ChannelMarker>>,
    pub user_id: Id<UserMarker>,
    #[serde(rename = "type")]
    pub ticket_type: String,
    pub status: TicketStatus,
    pub assigned_to: Option<Id<UserMarker>>,
    pub closed_by: Option<Id<UserMarker>>,
    #[serde(default)]
    pub answers: Vec<TicketAnswer>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl Ticket {
    pub fn draft(
        guild_id: Id<GuildMarker>,
        user_id: Id<UserMarker>,
        ticket_type: &str,
        answers: Vec<TicketAnswer>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            ticket_id: String::new(),
            ticket_number: 0,
            guild_id,
            channel_id: None,
            user_id,
            ticket_type: ticket_type.to_string(),
            status: TicketStatus::Open,
            assigned_to: None,
            closed_by: None,
            answers,
            created_at: now,
            last_activity: now,
            closed_at: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStyle {
    #[default]
    Short,
    Paragraph,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketQuestion {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub style: QuestionStyle,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub max_length: Option<u16>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    pub label: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub questions: Vec<TicketQuestion>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffRole {
    pub role_id: Id<RoleMarker>,
    #[serde(default)]
    pub can_close: bool,
    #[serde(default)]
    pub can_assign: bool,
    #[serde(default)]
    pub can_delete: bool,
    #[serde(default)]
    pub can_reopen: bool,
}

pub const DEFAULT_NAMING_PATTERN: &str = "ticket-{id}";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketConfig {
    pub guild_id: Id<GuildMarker>,
    #[serde(default)]
    pub category_id: Option<Id<ChannelMarker>>,
    #[serde(default)]
    pub log_channel_id: Option<Id<ChannelMarker>>,
    #[serde(default)]
    pub ticket_types: BTreeMap<String, TicketType>,
    #[serde(default)]
    pub staff_roles: Vec<StaffRole>,
    #[serde(default = "default_naming_pattern")]
    pub naming_pattern: String,
    #[serde(default)]
    pub auto_close_hours: Option<u32>,
}

fn default_naming_pattern() -> String {
    DEFAULT_NAMING_PATTERN.to_string()
}

impl TicketConfig {
    pub fn new(guild_id: Id<GuildMarker>) -> Self {
        Self {
            guild_id,
            category_id: None,
            log_channel_id: None,
            ticket_types: BTreeMap::new(),
            staff_roles: Vec::new(),
            naming_pattern: default_naming_pattern(),
            auto_close_hours: None,
        }
    }

    pub const MAX_TYPES: usize = 25;
    pub const MAX_QUESTIONS: usize = 5;
    /// Thirty days.
    pub const MAX_AUTO_CLOSE_HOURS: u32 = 720;

    /// Zero or less turns auto-close off; larger values are capped.
    pub fn set_auto_close_hours(&mut self, hours: i64) {
        self.auto_close_hours = u32::try_from(hours.clamp(0, i64::from(Self::MAX_AUTO_CLOSE_HOURS)))
            .ok()
            .filter(|h| *h > 0);
    }

    /// Ticket type keys are lowercase slugs used inside button ids.
    pub fn type_key(name: &str) -> anyhow::Result<String> {
        let key: String = name
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { '-' })
            .collect();
        let key = key.trim_matches('-').to_string();
        if key.is_empty() || key.len() > 32 {
            bail!("Ticket type names must be 1-32 letters or digits.");
        }
        Ok(key)
    }

    pub fn add_type(&mut self, name: &str, description: Option<String>) -> anyhow::Result<String> {
        let key = Self::type_key(name)?;
        if !self.ticket_types.contains_key(&key) && self.ticket_types.len() >= Self::MAX_TYPES {
            bail!("A server can have at most {} ticket types.", Self::MAX_TYPES);
        }
        let entry = self.ticket_types.entry(key.clone()).or_insert_with(|| TicketType {
            label: name.trim().to_string(),
            description: None,
            questions: Vec::new(),
        });
        entry.label = name.trim().to_string();
        entry.description = description;
        Ok(key)
    }

    pub fn remove_type(&mut self, name: &str) -> bool {
        Self::type_key(name).is_ok_and(|key| self.ticket_types.remove(&key).is_some())
    }

    /// Appends a question to a type; returns how many it now has.
    pub fn add_question(
        &mut self,
        type_name: &str,
        question: TicketQuestion,
    ) -> anyhow::Result<usize> {
        let key = Self::type_key(type_name)?;
        let kind = self
            .ticket_types
            .get_mut(&key)
            .ok_or_else(|| anyhow!("There is no ticket type `{key}`."))?;
        if kind.questions.len() >= Self::MAX_QUESTIONS {
            bail!("A ticket form holds at most {} questions.", Self::MAX_QUESTIONS);
        }
        if kind.questions.iter().any(|q| q.id == question.id) {
            bail!("That ticket type already has a question `{}`.", question.id);
        }
        kind.questions.push(question);
        Ok(kind.questions.len())
    }

    /// Inserts or replaces the staff entry for `role.role_id`.
    pub fn set_staff(&mut self, role: StaffRole) {
        match self.staff_roles.iter_mut().find(|r| r.role_id == role.role_id) {
            Some(existing) => *existing = role,
            None => self.staff_roles.push(role),
        }
    }

    pub fn remove_staff(&mut self, role_id: Id<RoleMarker>) -> bool {
        let before = self.staff_roles.len();
        self.staff_roles.retain(|r| r.role_id != role_id);
        self.staff_roles.len() != before
    }

    /// Channel name for a ticket, lowercased and limited to what Discord accepts.
    pub fn channel_name(&self, ticket_id: &str, ticket_type: &str, username: &str) -> String {
        let raw = self
            .naming_pattern
            .replace("{id}", ticket_id)
            .replace("{type}", ticket_type)
            .replace("{user}", username);
        let mut name: String = raw
            .to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '-' })
            .collect();
        name.truncate(100);
        if name.trim_matches('-').is_empty() {
            format!("ticket-{ticket_id}")
        } else {
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_name_pattern() {
        let mut config = TicketConfig::new(Id::new(1));
        assert_eq!(config.channel_name("0007", "support", "Alice"), "ticket-0007");

        config.naming_pattern = "{type}-{user}-{id}".to_string();
        assert_eq!(
            config.channel_name("0012", "Bug Report", "Bob Smith"),
            "bug-report-bob-smith-0012"
        );
    }

    #[test]
    fn test_channel_name_falls_back_when_empty() {
        let mut config = TicketConfig::new(Id::new(1));
        config.naming_pattern = "!!!".to_string();
        assert_eq!(config.channel_name("0003", "x", "y"), "ticket-0003");
    }

    fn question(id: &str) -> TicketQuestion {
        TicketQuestion {
            id: id.to_string(),
            label: id.to_string(),
            style: QuestionStyle::Short,
            required: true,
            placeholder: None,
            max_length: None,
        }
    }

    #[test]
    fn test_type_and_question_limits() {
        let mut config = TicketConfig::new(Id::new(1));
        assert_eq!(config.add_type("Bug Report", None).unwrap(), "bug-report");
        assert!(config.add_type("!!", None).is_err());

        for i in 0..TicketConfig::MAX_QUESTIONS {
            config.add_question("bug report", question(&format!("q{i}"))).unwrap();
        }
        assert!(config.add_question("bug-report", question("extra")).is_err());
        assert!(config.add_question("missing", question("q")).is_err());

        assert!(config.remove_type("Bug Report"));
        assert!(!config.remove_type("Bug Report"));
    }

    #[test]
    fn test_staff_roles_replace_by_id() {
        let mut config = TicketConfig::new(Id::new(1));
        let role = StaffRole {
            role_id: Id::new(5),
            can_close: true,
            can_assign: false,
            can_delete: false,
            can_reopen: false,
        };
        config.set_staff(role);
        config.set_staff(StaffRole { can_delete: true, ..role });
        assert_eq!(config.staff_roles.len(), 1);
        assert!(config.staff_roles[0].can_delete);
        assert!(config.remove_staff(Id::new(5)));
        assert!(config.staff_roles.is_empty());
    }

    #[test]
    fn test_auto_close_hours_are_capped() {
        let mut config = TicketConfig::new(Id::new(1));
        config.set_auto_close_hours(48);
        assert_eq!(config.auto_close_hours, Some(48));
        config.set_auto_close_hours(i64::from(u32::MAX));
        assert_eq!(config.auto_close_hours, Some(TicketConfig::MAX_AUTO_CLOSE_HOURS));
        config.set_auto_close_hours(0);
        assert_eq!(config.auto_close_hours, None);
        config.set_auto_close_hours(-5);
        assert_eq!(config.auto_close_hours, None);
    }
}
