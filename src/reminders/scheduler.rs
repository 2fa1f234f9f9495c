use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use twilight_model::{
    channel::message::Embed,
    id::{
        Id,
        marker::{ChannelMarker, UserMarker},
    },
};

use super::reminder_embed;
use crate::models::{Reminder, ReminderTarget};
use crate::store::{Store, StoreResult};

/// Upper bound on a single sleep so wall-clock jumps are noticed.
const MAX_SLEEP: Duration = Duration::from_secs(60 * 60);
const RETRY_AFTER_ERROR: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTarget {
    Direct(Id<UserMarker>),
    Channel(Id<ChannelMarker>),
}

impl DeliveryTarget {
    pub fn for_reminder(reminder: &Reminder) -> Self {
        match reminder.target {
            ReminderTarget::Author => DeliveryTarget::Direct(reminder.user_id),
            ReminderTarget::User(user_id) => DeliveryTarget::Direct(user_id),
            ReminderTarget::Channel(channel_id) => DeliveryTarget::Channel(channel_id),
        }
    }
}

/// Where fired reminders go. The Discord implementation DMs users or posts
/// in a channel.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    async fn send(&self, target: DeliveryTarget, content: Option<String>, embed: Embed)
    -> anyhow::Result<()>;
}

/// Wakes the delivery loop whenever reminders are added or removed so it can
/// recompute its next wake time.
#[derive(Clone, Default)]
pub struct ReminderScheduler {
    wake: Arc<Notify>,
}

impl ReminderScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reschedule(&self) {
        self.wake.notify_one();
    }

    pub fn spawn(&self, store: Arc<dyn Store>, sink: Arc<dyn ReminderSink>) -> JoinHandle<()> {
        let wake = self.wake.clone();
        tokio::spawn(async move { run(store, sink, wake).await })
    }
}

#[tracing::instrument(skip_all)]
async fn run(store: Arc<dyn Store>, sink: Arc<dyn ReminderSink>, wake: Arc<Notify>) {
    tracing::info!("Reminder scheduler started");
    loop {
        let now_ms = Utc::now().timestamp_millis();
        match deliver_due(&*store, &*sink, now_ms).await {
            Ok(0) => {}
            Ok(count) => tracing::info!(count, "Delivered reminders"),
            Err(e) => tracing::error!(error = ?e, "Failed to load due reminders"),
        }

        let sleep_for = match store.next_trigger().await {
            Ok(next) => sleep_duration(next, Utc::now().timestamp_millis()),
            Err(e) => {
                tracing::error!(error = ?e, "Failed to compute next reminder wake time");
                RETRY_AFTER_ERROR
            }
        };
        tracing::debug!(?sleep_for, "Reminder scheduler sleeping");

        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = wake.notified() => {
                tracing::debug!("Reminder scheduler woken by a change");
            }
        }
    }
}

pub fn sleep_duration(next_trigger_ms: Option<i64>, now_ms: i64) -> Duration {
    match next_trigger_ms {
        Some(at) => {
            let millis = u64::try_from(at.saturating_sub(now_ms)).unwrap_or(0);
            Duration::from_millis(millis).min(MAX_SLEEP)
        }
        None => MAX_SLEEP,
    }
}

/// Fires every reminder due at `now_ms`. The row is removed before delivery,
/// and a reminder someone else already removed is skipped. Delivery errors
/// are logged and dropped.
pub async fn deliver_due(
    store: &dyn Store,
    sink: &dyn ReminderSink,
    now_ms: i64,
) -> StoreResult<usize> {
    let due = store.due_reminders(now_ms).await?;
    let mut delivered = 0;

    for reminder in due {
        match store.delete_reminder(&reminder.reminder_id).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!(reminder_id = %reminder.reminder_id, "Reminder already removed");
                continue;
            }
            Err(e) => {
                tracing::error!(
                    error = ?e,
                    reminder_id = %reminder.reminder_id,
                    "Failed to remove reminder before delivery"
                );
                continue;
            }
        }

        let target = DeliveryTarget::for_reminder(&reminder);
        let content = match reminder.target {
            ReminderTarget::User(user_id) => Some(format!("<@{user_id}>")),
            ReminderTarget::Author | ReminderTarget::Channel(_) => None,
        };
        let embed = reminder_embed(&reminder);

        if let Err(e) = sink.send(target, content, embed).await {
            tracing::warn!(
                error = ?e,
                reminder_id = %reminder.reminder_id,
                "Reminder delivery failed"
            );
            continue;
        }
        delivered += 1;
    }

    Ok(delivered)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;

    use super::*;
    use crate::store::{MemoryStore, ReminderStore};

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<(DeliveryTarget, Option<String>, Embed)>>,
    }

    #[async_trait]
    impl ReminderSink for Recorder {
        async fn send(
            &self,
            target: DeliveryTarget,
            content: Option<String>,
            embed: Embed,
        ) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push((target, content, embed));
            Ok(())
        }
    }

    fn reminder(id: &str, target: ReminderTarget, trigger_timestamp: i64) -> Reminder {
        Reminder {
            reminder_id: id.to_string(),
            user_id: Id::new(1),
            guild_id: None,
            target,
            trigger_timestamp,
            task_description: format!("task {id}"),
            timezone: "UTC".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_deliver_due_fires_once() {
        let store = MemoryStore::new();
        store.insert_reminder(&reminder("due", ReminderTarget::Author, 1_000)).await.unwrap();
        store
            .insert_reminder(&reminder("ping", ReminderTarget::User(Id::new(9)), 1_500))
            .await
            .unwrap();
        store.insert_reminder(&reminder("later", ReminderTarget::Author, 5_000)).await.unwrap();
        let sink = Recorder::default();

        assert_eq!(deliver_due(&store, &sink, 2_000).await.unwrap(), 2);
        assert_eq!(deliver_due(&store, &sink, 2_000).await.unwrap(), 0);

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        let ping = sent
            .iter()
            .find(|(_, _, embed)| embed.description.as_deref() == Some("task ping"))
            .unwrap();
        assert_eq!(ping.0, DeliveryTarget::Direct(Id::new(9)));
        assert_eq!(ping.1.as_deref(), Some("<@9>"));
        drop(sent);

        assert_eq!(store.next_trigger().await.unwrap(), Some(5_000));
    }

    #[test]
    fn test_sleep_duration() {
        assert_eq!(sleep_duration(None, 0), MAX_SLEEP);
        assert_eq!(sleep_duration(Some(500), 1_000), Duration::ZERO);
        assert_eq!(sleep_duration(Some(1_250), 1_000), Duration::from_millis(250));
        assert_eq!(sleep_duration(Some(i64::MAX), 0), MAX_SLEEP);
    }
}
