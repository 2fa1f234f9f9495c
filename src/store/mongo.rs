use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    Client, Collection, IndexModel,
    bson::{Document, doc},
    error::{ErrorKind, WriteFailure},
    options::IndexOptions,
};
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, GuildMarker, UserMarker},
};

use super::{GuildStore, ReminderStore, StoreError, StoreResult, TicketStore, UserStore};
use crate::models::{GuildSettings, Reminder, Ticket, TicketConfig, UserProfile};

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Collection names follow the pluralized, lowercased model names the
/// existing database already uses.
pub struct MongoStore {
    users: Collection<UserProfile>,
    reminders: Collection<Reminder>,
    tickets: Collection<Ticket>,
    ticket_configs: Collection<TicketConfig>,
    guilds: Collection<GuildSettings>,
}

impl MongoStore {
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri).await?;
        let db = client.database(database);
        Ok(Self {
            users: db.collection("users"),
            reminders: db.collection("reminders"),
            tickets: db.collection("tickets"),
            ticket_configs: db.collection("ticketconfigs"),
            guilds: db.collection("guilds"),
        })
    }

    pub async fn ensure_indexes(&self) -> StoreResult<()> {
        self.users.create_index(unique_index(doc! { "userId": 1 })).await?;
        self.reminders
            .create_index(unique_index(doc! { "reminder_id": 1 }))
            .await?;
        self.reminders
            .create_index(IndexModel::builder().keys(doc! { "trigger_timestamp": 1 }).build())
            .await?;
        self.tickets
            .create_index(unique_index(doc! { "guildId": 1, "ticketId": 1 }))
            .await?;
        self.tickets
            .create_index(IndexModel::builder().keys(doc! { "channelId": 1 }).build())
            .await?;
        self.ticket_configs
            .create_index(unique_index(doc! { "guildId": 1 }))
            .await?;
        self.guilds.create_index(unique_index(doc! { "guildId": 1 })).await?;
        Ok(())
    }
}

fn unique_index(keys: Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        ErrorKind::Command(command_error) => command_error.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn map_insert_error(err: mongodb::error::Error, key: String) -> StoreError {
    if is_duplicate_key(&err) {
        StoreError::DuplicateKey(key)
    } else {
        StoreError::Mongo(err)
    }
}

#[async_trait]
impl ReminderStore for MongoStore {
    async fn insert_reminder(&self, reminder: &Reminder) -> StoreResult<()> {
        self.reminders
            .insert_one(reminder)
            .await
            .map_err(|e| map_insert_error(e, format!("reminder_id {}", reminder.reminder_id)))?;
        Ok(())
    }

    async fn delete_reminder(&self, reminder_id: &str) -> StoreResult<bool> {
        let result = self
            .reminders
            .delete_one(doc! { "reminder_id": reminder_id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn reminder(&self, reminder_id: &str) -> StoreResult<Option<Reminder>> {
        Ok(self
            .reminders
            .find_one(doc! { "reminder_id": reminder_id })
            .await?)
    }

    async fn reminders_for_user(&self, user_id: Id<UserMarker>) -> StoreResult<Vec<Reminder>> {
        Ok(self
            .reminders
            .find(doc! { "user_id": user_id.to_string() })
            .sort(doc! { "trigger_timestamp": 1 })
            .await?
            .try_collect()
            .await?)
    }

    async fn all_reminders(&self) -> StoreResult<Vec<Reminder>> {
        Ok(self
            .reminders
            .find(doc! {})
            .sort(doc! { "trigger_timestamp": 1 })
            .await?
            .try_collect()
            .await?)
    }

    async fn due_reminders(&self, now_ms: i64) -> StoreResult<Vec<Reminder>> {
        Ok(self
            .reminders
            .find(doc! { "trigger_timestamp": { "$lte": now_ms } })
            .sort(doc! { "trigger_timestamp": 1 })
            .await?
            .try_collect()
            .await?)
    }

    async fn next_trigger(&self) -> StoreResult<Option<i64>> {
        Ok(self
            .reminders
            .find_one(doc! {})
            .sort(doc! { "trigger_timestamp": 1 })
            .await?
            .map(|r| r.trigger_timestamp))
    }
}

#[async_trait]
impl TicketStore for MongoStore {
    async fn ticket_config(&self, guild_id: Id<GuildMarker>) -> StoreResult<Option<TicketConfig>> {
        Ok(self
            .ticket_configs
            .find_one(doc! { "guildId": guild_id.to_string() })
            .await?)
    }

    async fn save_ticket_config(&self, config: &TicketConfig) -> StoreResult<()> {
        self.ticket_configs
            .replace_one(doc! { "guildId": config.guild_id.to_string() }, config)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn max_ticket_number(&self, guild_id: Id<GuildMarker>) -> StoreResult<u64> {
        Ok(self
            .tickets
            .find_one(doc! { "guildId": guild_id.to_string() })
            .sort(doc! { "ticketNumber": -1 })
            .await?
            .map_or(0, |t| t.ticket_number))
    }

    async fn insert_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        self.tickets.insert_one(ticket).await.map_err(|e| {
            map_insert_error(
                e,
                format!("guildId {} ticketId {}", ticket.guild_id, ticket.ticket_id),
            )
        })?;
        Ok(())
    }

    async fn ticket(
        &self,
        guild_id: Id<GuildMarker>,
        ticket_id: &str,
    ) -> StoreResult<Option<Ticket>> {
        Ok(self
            .tickets
            .find_one(doc! { "guildId": guild_id.to_string(), "ticketId": ticket_id })
            .await?)
    }

    async fn ticket_by_channel(
        &self,
        channel_id: Id<ChannelMarker>,
    ) -> StoreResult<Option<Ticket>> {
        Ok(self
            .tickets
            .find_one(doc! {
                "channelId": channel_id.to_string(),
                "status": { "$ne": "deleted" },
            })
            .await?)
    }

    async fn update_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        self.tickets
            .replace_one(
                doc! { "guildId": ticket.guild_id.to_string(), "ticketId": &ticket.ticket_id },
                ticket,
            )
            .await?;
        Ok(())
    }

    async fn open_tickets(&self) -> StoreResult<Vec<Ticket>> {
        Ok(self
            .tickets
            .find(doc! { "status": "open" })
            .await?
            .try_collect()
            .await?)
    }
}

#[async_trait]
impl UserStore for MongoStore {
    async fn user(&self, user_id: Id<UserMarker>) -> StoreResult<Option<UserProfile>> {
        Ok(self
            .users
            .find_one(doc! { "userId": user_id.to_string() })
            .await?)
    }

    async fn save_user(&self, user: &UserProfile) -> StoreResult<()> {
        self.users
            .replace_one(doc! { "userId": user.user_id.to_string() }, user)
            .upsert(true)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl GuildStore for MongoStore {
    async fn guild_settings(
        &self,
        guild_id: Id<GuildMarker>,
    ) -> StoreResult<Option<GuildSettings>> {
        Ok(self
            .guilds
            .find_one(doc! { "guildId": guild_id.to_string() })
            .await?)
    }

    async fn save_guild_settings(&self, settings: &GuildSettings) -> StoreResult<()> {
        self.guilds
            .replace_one(doc! { "guildId": settings.guild_id.to_string() }, settings)
            .upsert(true)
            .await?;
        Ok(())
    }
}
