use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, GuildMarker, UserMarker},
};

/// Who receives the reminder when it fires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ReminderTarget {
    #[serde(rename = "self")]
    Author,
    User(Id<UserMarker>),
    Channel(Id<ChannelMarker>),
}

/// Stored with snake_case keys to match the existing `reminders` collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub reminder_id: String,
    pub user_id: Id<UserMarker>,
    #[serde(default)]
    pub guild_id: Option<Id<GuildMarker>>,
    pub target: ReminderTarget,
    /// UTC milliseconds.
    pub trigger_timestamp: i64,
    pub task_description: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
}

impl Reminder {
    pub fn is_due(&self, now_ms: i64) -> bool {
        self.trigger_timestamp <= now_ms
    }

    pub fn trigger_unix_seconds(&self) -> i64 {
        self.trigger_timestamp.div_euclid(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_serialization() {
        let json = serde_json::to_value(ReminderTarget::Author).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "self" }));

        let json = serde_json::to_value(ReminderTarget::User(Id::new(42))).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "user", "id": "42" }));

        let back: ReminderTarget =
            serde_json::from_value(serde_json::json!({ "kind": "channel", "id": "7" })).unwrap();
        assert_eq!(back, ReminderTarget::Channel(Id::new(7)));
    }
}
