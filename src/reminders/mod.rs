//! Reminders: parsing, persistence and delivery.
//!
//! A reminder is stored once and fired by the single [`ReminderScheduler`]
//! loop. Creating or cancelling one nudges the loop so it recomputes its
//! next wake time from the store.

pub mod delivery;
pub mod phrase;
pub mod scheduler;
pub mod time_parse;

pub use delivery::DiscordReminderSink;
pub use scheduler::{DeliveryTarget, ReminderScheduler, ReminderSink, deliver_due};
pub use time_parse::{TimeParseError, parse_timezone, parse_when};

use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use rand::{Rng, distr::Alphanumeric};
use twilight_model::{
    channel::message::Embed,
    id::{
        Id,
        marker::{GuildMarker, UserMarker},
    },
    util::Timestamp,
};
use twilight_util::builder::embed::{EmbedBuilder, EmbedFieldBuilder, EmbedFooterBuilder};

use crate::models::{Reminder, ReminderTarget};
use crate::store::{Store, StoreError};

pub const REMINDER_COLOR: u32 = 0xf5a623;
pub const MAX_TASK_LENGTH: usize = 1000;
const REMINDER_ID_LENGTH: usize = 8;
const MAX_ID_ATTEMPTS: usize = 3;

#[derive(Debug, Clone)]
pub struct NewReminder {
    pub user_id: Id<UserMarker>,
    pub guild_id: Option<Id<GuildMarker>>,
    pub target: ReminderTarget,
    pub when: String,
    pub task: String,
    pub timezone: String,
}

pub fn new_reminder_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(REMINDER_ID_LENGTH)
        .map(char::from)
        .collect()
}

/// Validates and stores a reminder, then wakes the scheduler.
pub async fn create_reminder(
    store: &dyn Store,
    scheduler: &ReminderScheduler,
    request: NewReminder,
    now: DateTime<Utc>,
) -> anyhow::Result<Reminder> {
    let task = request.task.trim();
    if task.is_empty() {
        bail!("Tell me what to remind you about.");
    }
    if task.chars().count() > MAX_TASK_LENGTH {
        bail!("Reminder text is limited to {MAX_TASK_LENGTH} characters.");
    }

    let trigger = parse_when(&request.when, &request.timezone, now)?;

    let mut reminder = Reminder {
        reminder_id: new_reminder_id(),
        user_id: request.user_id,
        guild_id: request.guild_id,
        target: request.target,
        trigger_timestamp: trigger.timestamp_millis(),
        task_description: task.to_string(),
        timezone: request.timezone,
        created_at: now,
    };

    let mut attempt = 1;
    loop {
        match store.insert_reminder(&reminder).await {
            Ok(()) => break,
            Err(StoreError::DuplicateKey(_)) if attempt < MAX_ID_ATTEMPTS => {
                attempt += 1;
                reminder.reminder_id = new_reminder_id();
            }
            Err(e) => return Err(e).context("Failed to save reminder"),
        }
    }

    tracing::info!(
        reminder_id = %reminder.reminder_id,
        user_id = %reminder.user_id,
        trigger_timestamp = reminder.trigger_timestamp,
        "Reminder created"
    );
    scheduler.reschedule();
    Ok(reminder)
}

/// Removes a reminder owned by `user_id`. Returns false when there is no
/// such reminder for that user.
pub async fn cancel_reminder(
    store: &dyn Store,
    scheduler: &ReminderScheduler,
    user_id: Id<UserMarker>,
    reminder_id: &str,
) -> anyhow::Result<bool> {
    let Some(reminder) = store.reminder(reminder_id).await? else {
        return Ok(false);
    };
    if reminder.user_id != user_id {
        return Ok(false);
    }
    let removed = store.delete_reminder(reminder_id).await?;
    if removed {
        scheduler.reschedule();
    }
    Ok(removed)
}

fn timestamp(at: DateTime<Utc>) -> Option<Timestamp> {
    Timestamp::from_micros(at.timestamp_micros()).ok()
}

/// The message a fired reminder is delivered as.
pub fn reminder_embed(reminder: &Reminder) -> Embed {
    let mut builder = EmbedBuilder::new()
        .title("⏰ Reminder")
        .description(reminder.task_description.clone())
        .color(REMINDER_COLOR)
        .field(
            EmbedFieldBuilder::new("Set", format!("<t:{}:f>", reminder.created_at.timestamp()))
                .inline(),
        )
        .field(EmbedFieldBuilder::new("From", format!("<@{}>", reminder.user_id)).inline())
        .footer(EmbedFooterBuilder::new(format!("Reminder {}", reminder.reminder_id)));
    if let Some(created) = timestamp(reminder.created_at) {
        builder = builder.timestamp(created);
    }
    builder.build()
}

pub fn confirmation_embed(reminder: &Reminder) -> Embed {
    let target = match reminder.target {
        ReminderTarget::Author => "you".to_string(),
        ReminderTarget::User(user_id) => format!("<@{user_id}>"),
        ReminderTarget::Channel(channel_id) => format!("<#{channel_id}>"),
    };
    EmbedBuilder::new()
        .title("Reminder set")
        .description(format!(
            "I'll remind {target} <t:{}:R> (<t:{}:f>):\n> {}",
            reminder.trigger_unix_seconds(),
            reminder.trigger_unix_seconds(),
            reminder.task_description
        ))
        .color(REMINDER_COLOR)
        .footer(EmbedFooterBuilder::new(format!(
            "ID {} · {}",
            reminder.reminder_id, reminder.timezone
        )))
        .build()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::store::{MemoryStore, ReminderStore};

    #[derive(Default)]
    struct Inbox {
        delivered: Mutex<Vec<(DeliveryTarget, Embed)>>,
    }

    #[async_trait]
    impl ReminderSink for Inbox {
        async fn send(
            &self,
            target: DeliveryTarget,
            _: Option<String>,
            embed: Embed,
        ) -> anyhow::Result<()> {
            self.delivered.lock().unwrap().push((target, embed));
            Ok(())
        }
    }

    fn request(when: &str, task: &str) -> NewReminder {
        NewReminder {
            user_id: Id::new(1),
            guild_id: None,
            target: ReminderTarget::Author,
            when: when.to_string(),
            task: task.to_string(),
            timezone: "UTC".to_string(),
        }
    }

    #[test]
    fn test_reminder_id_shape() {
        let id = new_reminder_id();
        assert_eq!(id.len(), REMINDER_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn test_create_and_cancel() {
        let store = MemoryStore::new();
        let scheduler = ReminderScheduler::new();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        let reminder = create_reminder(&store, &scheduler, request("in 1h", "stretch"), now)
            .await
            .unwrap();
        assert_eq!(reminder.trigger_timestamp, now.timestamp_millis() + 3_600_000);

        assert!(!cancel_reminder(&store, &scheduler, Id::new(2), &reminder.reminder_id)
            .await
            .unwrap());
        assert!(cancel_reminder(&store, &scheduler, Id::new(1), &reminder.reminder_id)
            .await
            .unwrap());
        assert!(store.all_reminders().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let store = MemoryStore::new();
        let scheduler = ReminderScheduler::new();
        let now = Utc::now();

        assert!(create_reminder(&store, &scheduler, request("in 1h", "  "), now).await.is_err());
        assert!(create_reminder(&store, &scheduler, request("yesterday", "x"), now).await.is_err());
        assert!(store.all_reminders().await.unwrap().is_empty());
    }

    #[test]
    fn test_embed_carries_task_and_author() {
        let reminder = Reminder {
            reminder_id: "abc12345".to_string(),
            user_id: Id::new(77),
            guild_id: None,
            target: ReminderTarget::Author,
            trigger_timestamp: 0,
            task_description: "water the plants".to_string(),
            timezone: "UTC".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        };
        let embed = reminder_embed(&reminder);
        assert_eq!(embed.description.as_deref(), Some("water the plants"));
        assert!(embed.fields.iter().any(|f| f.value == "<@77>"));
        assert!(embed.timestamp.is_some());
    }

    #[tokio::test]
    async fn test_prefix_phrase_to_delivery() {
        let store = MemoryStore::new();
        let scheduler = ReminderScheduler::new();
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

        let phrase = phrase::parse_reminder_phrase("me in 10m to do X").unwrap();
        assert_eq!(phrase.target, phrase::PhraseTarget::Me);
        let reminder = create_reminder(
            &store,
            &scheduler,
            NewReminder {
                when: phrase.when,
                task: phrase.task,
                ..request("", "")
            },
            now,
        )
        .await
        .unwrap();
        assert_eq!(reminder.trigger_timestamp, now.timestamp_millis() + 600_000);

        let inbox = Inbox::default();
        let early = deliver_due(&store, &inbox, now.timestamp_millis() + 599_999).await.unwrap();
        assert_eq!(early, 0);
        let fired = deliver_due(&store, &inbox, reminder.trigger_timestamp).await.unwrap();
        assert_eq!(fired, 1);
        assert!(store.reminder(&reminder.reminder_id).await.unwrap().is_none());

        let delivered = inbox.delivered.lock().unwrap();
        assert_eq!(delivered[0].0, DeliveryTarget::Direct(Id::new(1)));
        assert!(delivered[0].1.description.as_deref().is_some_and(|d| d.contains("do X")));
    }
}
