//! Persistence seam.
//!
//! Every document collection the bot touches is reached through one of the
//! traits below. `MongoStore` talks to MongoDB; `MemoryStore` keeps the same
//! contract in process memory and backs both tests and runs without a
//! configured database.

mod memory;
mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use thiserror::Error;
use tokio::sync::Mutex;
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, GuildMarker, UserMarker},
};

use crate::models::{GuildSettings, Reminder, Ticket, TicketConfig, UserProfile};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn insert_reminder(&self, reminder: &Reminder) -> StoreResult<()>;
    /// Returns whether a row was actually removed.
    async fn delete_reminder(&self, reminder_id: &str) -> StoreResult<bool>;
    async fn reminder(&self, reminder_id: &str) -> StoreResult<Option<Reminder>>;
    async fn reminders_for_user(&self, user_id: Id<UserMarker>) -> StoreResult<Vec<Reminder>>;
    async fn all_reminders(&self) -> StoreResult<Vec<Reminder>>;
    async fn due_reminders(&self, now_ms: i64) -> StoreResult<Vec<Reminder>>;
    /// Earliest trigger timestamp across all reminders.
    async fn next_trigger(&self) -> StoreResult<Option<i64>>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn ticket_config(&self, guild_id: Id<GuildMarker>) -> StoreResult<Option<TicketConfig>>;
    async fn save_ticket_config(&self, config: &TicketConfig) -> StoreResult<()>;
    async fn max_ticket_number(&self, guild_id: Id<GuildMarker>) -> StoreResult<u64>;
    /// Fails with `DuplicateKey` when `(guild_id, ticket_id)` already exists.
    async fn insert_ticket(&self, ticket: &Ticket) -> StoreResult<()>;
    async fn ticket(&self, guild_id: Id<GuildMarker>, ticket_id: &str)
    -> StoreResult<Option<Ticket>>;
    async fn ticket_by_channel(&self, channel_id: Id<ChannelMarker>) -> StoreResult<Option<Ticket>>;
    async fn update_ticket(&self, ticket: &Ticket) -> StoreResult<()>;
    async fn open_tickets(&self) -> StoreResult<Vec<Ticket>>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn user(&self, user_id: Id<UserMarker>) -> StoreResult<Option<UserProfile>>;
    async fn save_user(&self, user: &UserProfile) -> StoreResult<()>;
}

#[async_trait]
pub trait GuildStore: Send + Sync {
    async fn guild_settings(&self, guild_id: Id<GuildMarker>)
    -> StoreResult<Option<GuildSettings>>;
    async fn save_guild_settings(&self, settings: &GuildSettings) -> StoreResult<()>;
}

pub trait Store: ReminderStore + TicketStore + UserStore + GuildStore {}

impl<T> Store for T where T: ReminderStore + TicketStore + UserStore + GuildStore {}

pub type SharedStore = Arc<dyn Store>;

/// Serializes read-modify-write updates of one document within the process.
struct KeyedLocks<K: Eq + Hash>(DashMap<K, Arc<Mutex<()>>>);

impl<K: Eq + Hash + Copy> KeyedLocks<K> {
    fn new() -> Self {
        Self(DashMap::new())
    }

    async fn run<F: Future>(&self, key: K, update: F) -> F::Output {
        let lock = self.0.entry(key).or_default().clone();
        let output = {
            let _guard = lock.lock().await;
            update.await
        };
        drop(lock);
        self.0.remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
        output
    }
}

static USER_LOCKS: Lazy<KeyedLocks<Id<UserMarker>>> = Lazy::new(KeyedLocks::new);
static GUILD_LOCKS: Lazy<KeyedLocks<Id<GuildMarker>>> = Lazy::new(KeyedLocks::new);

/// Loads a profile, applies `update` and saves it back, creating the profile
/// on first use. Updates of the same user run one at a time.
pub async fn update_user<S, R>(
    store: &S,
    user_id: Id<UserMarker>,
    update: impl FnOnce(&mut UserProfile) -> R + Send,
) -> StoreResult<R>
where
    S: UserStore + ?Sized,
    R: Send,
{
    USER_LOCKS
        .run(user_id, async move {
            let mut user = store
                .user(user_id)
                .await?
                .unwrap_or_else(|| UserProfile::new(user_id));
            let result = update(&mut user);
            store.save_user(&user).await?;
            Ok(result)
        })
        .await
}

pub async fn load_user(store: &dyn Store, user_id: Id<UserMarker>) -> StoreResult<UserProfile> {
    Ok(store
        .user(user_id)
        .await?
        .unwrap_or_else(|| UserProfile::new(user_id)))
}

/// Same as [`update_user`] for per-guild settings.
pub async fn update_guild<S, R>(
    store: &S,
    guild_id: Id<GuildMarker>,
    update: impl FnOnce(&mut GuildSettings) -> R + Send,
) -> StoreResult<R>
where
    S: GuildStore + ?Sized,
    R: Send,
{
    GUILD_LOCKS
        .run(guild_id, async move {
            let mut settings = store
                .guild_settings(guild_id)
                .await?
                .unwrap_or_else(|| GuildSettings::new(guild_id));
            let result = update(&mut settings);
            store.save_guild_settings(&settings).await?;
            Ok(result)
        })
        .await
}

pub async fn load_guild(
    store: &dyn Store,
    guild_id: Id<GuildMarker>,
) -> StoreResult<GuildSettings> {
    Ok(store
        .guild_settings(guild_id)
        .await?
        .unwrap_or_else(|| GuildSettings::new(guild_id)))
}

pub async fn record_command_use<S>(store: &S, user_id: Id<UserMarker>) -> StoreResult<()>
where
    S: UserStore + ?Sized,
{
    update_user(store, user_id, |user| user.record_command(Utc::now())).await
}

/// Connects to MongoDB when a URI is configured, otherwise falls back to memory.
pub async fn connect(uri: Option<&str>, database: &str) -> StoreResult<SharedStore> {
    match uri {
        Some(uri) => {
            let store = MongoStore::connect(uri, database).await?;
            store.ensure_indexes().await?;
            tracing::info!(database, "Connected to MongoDB");
            Ok(Arc::new(store))
        }
        None => {
            tracing::warn!("MONGODB_URI is not set; data will only live in memory");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Yields between reading and writing a profile so concurrent updates
    /// interleave at the worst point.
    struct Yielding(MemoryStore);

    #[async_trait]
    impl UserStore for Yielding {
        async fn user(&self, user_id: Id<UserMarker>) -> StoreResult<Option<UserProfile>> {
            let user = self.0.user(user_id).await?;
            for _ in 0..5 {
                tokio::task::yield_now().await;
            }
            Ok(user)
        }

        async fn save_user(&self, user: &UserProfile) -> StoreResult<()> {
            self.0.save_user(user).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_profile_updates_keep_both_changes() {
        let store = Yielding(MemoryStore::new());
        let user_id = Id::new(42);

        let (timezone, usage) = tokio::join!(
            update_user(&store, user_id, |user| {
                user.preferences.timezone = "Europe/Berlin".to_string();
            }),
            record_command_use(&store, user_id),
        );
        timezone.unwrap();
        usage.unwrap();

        let user = store.user(user_id).await.unwrap().unwrap();
        assert_eq!(user.preferences.timezone, "Europe/Berlin");
        assert_eq!(user.commands_used, 1);
        assert!(user.last_seen.is_some());
    }

    #[tokio::test]
    async fn test_update_locks_are_released() {
        let store = MemoryStore::new();
        let user_id = Id::new(43);
        for _ in 0..3 {
            record_command_use(&store, user_id).await.unwrap();
        }
        assert_eq!(load_user(&store, user_id).await.unwrap().commands_used, 3);
        assert!(!USER_LOCKS.0.contains_key(&user_id));
    }
}
