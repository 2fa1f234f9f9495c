use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, GuildMarker, UserMarker},
};

use super::{GuildStore, ReminderStore, StoreError, StoreResult, TicketStore, UserStore};
use crate::models::{GuildSettings, Reminder, Ticket, TicketConfig, TicketStatus, UserProfile};

#[derive(Default)]
struct Collections {
    users: HashMap<Id<UserMarker>, UserProfile>,
    reminders: HashMap<String, Reminder>,
    tickets: Vec<Ticket>,
    ticket_configs: HashMap<Id<GuildMarker>, TicketConfig>,
    guilds: HashMap<Id<GuildMarker>, GuildSettings>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn insert_reminder(&self, reminder: &Reminder) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner.reminders.contains_key(&reminder.reminder_id) {
            return Err(StoreError::DuplicateKey(format!(
                "reminder_id {}",
                reminder.reminder_id
            )));
        }
        inner
            .reminders
            .insert(reminder.reminder_id.clone(), reminder.clone());
        Ok(())
    }

    async fn delete_reminder(&self, reminder_id: &str) -> StoreResult<bool> {
        Ok(self.inner.lock().await.reminders.remove(reminder_id).is_some())
    }

    async fn reminder(&self, reminder_id: &str) -> StoreResult<Option<Reminder>> {
        Ok(self.inner.lock().await.reminders.get(reminder_id).cloned())
    }

    async fn reminders_for_user(&self, user_id: Id<UserMarker>) -> StoreResult<Vec<Reminder>> {
        let inner = self.inner.lock().await;
        let mut reminders: Vec<Reminder> = inner
            .reminders
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        reminders.sort_by_key(|r| r.trigger_timestamp);
        Ok(reminders)
    }

    async fn all_reminders(&self) -> StoreResult<Vec<Reminder>> {
        let mut reminders: Vec<Reminder> =
            self.inner.lock().await.reminders.values().cloned().collect();
        reminders.sort_by_key(|r| r.trigger_timestamp);
        Ok(reminders)
    }

    async fn due_reminders(&self, now_ms: i64) -> StoreResult<Vec<Reminder>> {
        let mut due: Vec<Reminder> = self
            .inner
            .lock()
            .await
            .reminders
            .values()
            .filter(|r| r.is_due(now_ms))
            .cloned()
            .collect();
        due.sort_by_key(|r| r.trigger_timestamp);
        Ok(due)
    }

    async fn next_trigger(&self) -> StoreResult<Option<i64>> {
        Ok(self
            .inner
            .lock()
            .await
            .reminders
            .values()
            .map(|r| r.trigger_timestamp)
            .min())
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn ticket_config(&self, guild_id: Id<GuildMarker>) -> StoreResult<Option<TicketConfig>> {
        Ok(self.inner.lock().await.ticket_configs.get(&guild_id).cloned())
    }

    async fn save_ticket_config(&self, config: &TicketConfig) -> StoreResult<()> {
        self.inner
            .lock()
            .await
            .ticket_configs
            .insert(config.guild_id, config.clone());
        Ok(())
    }

    async fn max_ticket_number(&self, guild_id: Id<GuildMarker>) -> StoreResult<u64> {
        Ok(self
            .inner
            .lock()
            .await
            .tickets
            .iter()
            .filter(|t| t.guild_id == guild_id)
            .map(|t| t.ticket_number)
            .max()
            .unwrap_or(0))
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if inner
            .tickets
            .iter()
            .any(|t| t.guild_id == ticket.guild_id && t.ticket_id == ticket.ticket_id)
        {
            return Err(StoreError::DuplicateKey(format!(
                "guildId {} ticketId {}",
                ticket.guild_id, ticket.ticket_id
            )));
        }
        inner.tickets.push(ticket.clone());
        Ok(())
    }

    async fn ticket(
        &self,
        guild_id: Id<GuildMarker>,
        ticket_id: &str,
    ) -> StoreResult<Option<Ticket>> {
        Ok(self
            .inner
            .lock()
            .await
            .tickets
            .iter()
            .find(|t| t.guild_id == guild_id && t.ticket_id == ticket_id)
            .cloned())
    }

    async fn ticket_by_channel(
        &self,
        channel_id: Id<ChannelMarker>,
    ) -> StoreResult<Option<Ticket>> {
        Ok(self
            .inner
            .lock()
            .await
            .tickets
            .iter()
            .find(|t| t.channel_id == Some(channel_id) && t.status != TicketStatus::Deleted)
            .cloned())
    }

    async fn update_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner
            .tickets
            .iter_mut()
            .find(|t| t.guild_id == ticket.guild_id && t.ticket_id == ticket.ticket_id)
        {
            *existing = ticket.clone();
        }
        Ok(())
    }

    async fn open_tickets(&self) -> StoreResult<Vec<Ticket>> {
        Ok(self
            .inner
            .lock()
            .await
            .tickets
            .iter()
            .filter(|t| t.status == TicketStatus::Open)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn user(&self, user_id: Id<UserMarker>) -> StoreResult<Option<UserProfile>> {
        Ok(self.inner.lock().await.users.get(&user_id).cloned())
    }

    async fn save_user(&self, user: &UserProfile) -> StoreResult<()> {
        self.inner
            .lock()
            .await
            .users
            .insert(user.user_id, user.clone());
        Ok(())
    }
}

#[async_trait]
impl GuildStore for MemoryStore {
    async fn guild_settings(
        &self,
        guild_id: Id<GuildMarker>,
    ) -> StoreResult<Option<GuildSettings>> {
        Ok(self.inner.lock().await.guilds.get(&guild_id).cloned())
    }

    async fn save_guild_settings(&self, settings: &GuildSettings) -> StoreResult<()> {
        self.inner
            .lock()
            .await
            .guilds
            .insert(settings.guild_id, settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReminderTarget;
    use chrono::Utc;

    fn reminder(id: &str, at: i64) -> Reminder {
        Reminder {
            reminder_id: id.to_string(),
            user_id: Id::new(1),
            guild_id: None,
            target: ReminderTarget::Author,
            trigger_timestamp: at,
            task_description: "stretch".to_string(),
            timezone: "UTC".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_reminder_queries() {
        let store = MemoryStore::new();
        store.insert_reminder(&reminder("b", 2_000)).await.unwrap();
        store.insert_reminder(&reminder("a", 1_000)).await.unwrap();
        store.insert_reminder(&reminder("c", 9_000)).await.unwrap();

        assert_eq!(store.next_trigger().await.unwrap(), Some(1_000));
        let due: Vec<String> = store
            .due_reminders(2_000)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.reminder_id)
            .collect();
        assert_eq!(due, vec!["a", "b"]);

        assert!(store.delete_reminder("a").await.unwrap());
        assert!(!store.delete_reminder("a").await.unwrap());
        assert!(matches!(
            store.insert_reminder(&reminder("b", 5)).await,
            Err(StoreError::DuplicateKey(_))
        ));
    }

    #[tokio::test]
    async fn test_ticket_uniqueness_is_per_guild() {
        let store = MemoryStore::new();
        let mut ticket = Ticket::draft(Id::new(1), Id::new(5), "support", Vec::new(), Utc::now());
        ticket.ticket_id = "0001".to_string();
        ticket.ticket_number = 1;
        store.insert_ticket(&ticket).await.unwrap();
        assert!(store.insert_ticket(&ticket).await.is_err());

        ticket.guild_id = Id::new(2);
        store.insert_ticket(&ticket).await.unwrap();
        assert_eq!(store.max_ticket_number(Id::new(1)).await.unwrap(), 1);
        assert_eq!(store.max_ticket_number(Id::new(3)).await.unwrap(), 0);
    }
}
