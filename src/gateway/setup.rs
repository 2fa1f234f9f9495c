use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use lavalink_rs::client::LavalinkClient;
use lavalink_rs::model::events as LavalinkEventsModel;
use lavalink_rs::node::NodeBuilder;
use lavalink_rs::prelude::NodeDistributionStrategy;
use songbird::Songbird;
use songbird::shards::TwilightMap;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use twilight_cache_inmemory::InMemoryCache;
use twilight_gateway::{ConfigBuilder, Intents, Shard, ShardId};
use twilight_http::Client as HttpClient;
use twilight_model::gateway::payload::outgoing::update_presence::UpdatePresencePayload;
use twilight_model::gateway::presence::{ActivityType, MinimalActivity, Status};
use twilight_model::id::Id;
use twilight_model::id::marker::UserMarker;

use crate::commands::slash_definitions;
use crate::config::Config;
use crate::features::{chatbot::ChatHistory, lfg::LfgBoard, tempvc::TempVoiceRegistry};
use crate::gateway::runner;
use crate::lavalink_events;
use crate::music::{MusicContext, MusicQueues};
use crate::reminders::{DiscordReminderSink, ReminderScheduler};
use crate::state::State;
use crate::store::{self, SharedStore};
use crate::tickets::{TicketTimers, flow};

const MESSAGE_CACHE_SIZE: usize = 500;
/// Top of every hour.
const TICKET_SWEEP_SCHEDULE: &str = "0 0 * * * *";

#[derive(Debug, Clone)]
pub struct ShardInfo {
    pub latency_ms: Option<u128>,
}

pub struct Bot {
    pub shard: Shard,
    pub state: Arc<State>,
    pub shard_info_tx: mpsc::Sender<ShardInfo>,
}

fn init_tracing() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default tracing subscriber: {e}"))?;
    Ok(())
}

/// Reads `.env` when present, then the process environment.
pub fn load_config() -> anyhow::Result<Config> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            return Err(e).context("Failed to read .env file");
        }
    }
    Ok(Config::from_env()?)
}

fn init_shard(config: &Config, presence: UpdatePresencePayload) -> Shard {
    let config = ConfigBuilder::new(
        config.token.clone(),
        Intents::GUILDS
            | Intents::GUILD_MEMBERS
            | Intents::GUILD_MODERATION
            | Intents::GUILD_MESSAGES
            | Intents::GUILD_VOICE_STATES
            | Intents::DIRECT_MESSAGES
            | Intents::MESSAGE_CONTENT,
    )
    .presence(presence)
    .build();
    Shard::with_config(ShardId::ONE, config)
}

fn presence() -> anyhow::Result<UpdatePresencePayload> {
    Ok(UpdatePresencePayload::new(
        [MinimalActivity {
            name: "/help".to_string(),
            kind: ActivityType::Listening,
            url: None,
        }
        .into()],
        false,
        None,
        Status::Online,
    )?)
}

async fn init_lavalink_client(
    config: &Config,
    user_id: Id<UserMarker>,
    music: MusicContext,
) -> Arc<LavalinkClient> {
    let events = LavalinkEventsModel::Events {
        ready: Some(lavalink_events::ready_event),
        track_end: Some(lavalink_events::track_end),
        track_exception: Some(lavalink_events::track_exception),
        ..Default::default()
    };

    let node = NodeBuilder {
        hostname: config.lavalink_address(),
        is_ssl: config.lavalink_ssl,
        events: LavalinkEventsModel::Events::default(),
        password: config.lavalink_password.clone(),
        user_id: user_id.into(),
        session_id: None,
    };

    let client = LavalinkClient::new_with_data(
        events,
        vec![node],
        NodeDistributionStrategy::round_robin(),
        Arc::new(music),
    )
    .await;
    Arc::new(client)
}

fn init_songbird_client(
    shard_sender: twilight_gateway::MessageSender,
    shard_id_number: u32,
    user_id: Id<UserMarker>,
) -> Arc<Songbird> {
    let senders = TwilightMap::new(HashMap::from([(shard_id_number, shard_sender)]));
    Arc::new(Songbird::twilight(Arc::new(senders), user_id))
}

async fn register_bot_commands(state: &State) -> anyhow::Result<()> {
    let commands = slash_definitions();
    let application_id = state
        .http
        .current_user_application()
        .await
        .context("Failed to get current user application")?
        .model()
        .await
        .context("Failed to model current user application")?
        .id;
    let interaction_client = state.http.interaction(application_id);

    let result = match state.config.guild_id {
        Some(guild_id) => interaction_client
            .set_guild_commands(guild_id, &commands)
            .await
            .map(|_| {
                tracing::info!(%guild_id, count = commands.len(), "Registered guild commands")
            }),
        None => interaction_client
            .set_global_commands(&commands)
            .await
            .map(|_| tracing::info!(count = commands.len(), "Registered global commands")),
    };
    if let Err(error) = result {
        tracing::error!(?error, "Failed to register commands");
    }
    Ok(())
}

/// Closes overdue tickets now and every hour after, re-arming the rest.
async fn start_ticket_sweep(state: Arc<State>) -> anyhow::Result<JobScheduler> {
    if let Err(e) = flow::sweep(&state).await {
        tracing::error!(error = ?e, "Startup ticket sweep failed");
    }

    let scheduler = JobScheduler::new().await?;
    let job = Job::new_async(TICKET_SWEEP_SCHEDULE, move |_uuid, _lock| {
        let state = state.clone();
        Box::pin(async move {
            if let Err(e) = flow::sweep(&state).await {
                tracing::error!(error = ?e, "Hourly ticket sweep failed");
            }
        })
    })?;
    scheduler.add(job).await?;
    scheduler.start().await?;
    tracing::info!("Ticket sweep scheduled");
    Ok(scheduler)
}

pub async fn initialize_and_run_bot() -> anyhow::Result<()> {
    init_tracing().context("Failed to initialize tracing")?;
    tracing::info!("Hearth starting up");

    let (shard_info_tx, mut shard_info_rx) = mpsc::channel::<ShardInfo>(32);

    let config = load_config().context("Failed to load configuration")?;
    let http = Arc::new(HttpClient::new(config.token.clone()));
    let store: SharedStore = store::connect(config.mongodb_uri.as_deref(), &config.mongodb_database)
        .await
        .context("Failed to open the data store")?;

    let current_user_id = http
        .current_user()
        .await
        .context("Failed to get current user from Discord")?
        .model()
        .await
        .context("Failed to model current user data")?
        .id;

    let music = Arc::new(MusicQueues::new());
    let music_context = MusicContext {
        queues: music.clone(),
        http: http.clone(),
        store: store.clone(),
    };
    let lavalink = init_lavalink_client(&config, current_user_id, music_context).await;

    let shard = init_shard(&config, presence()?);
    let songbird = init_songbird_client(shard.sender(), shard.id().number(), current_user_id);

    let cache = InMemoryCache::builder()
        .message_cache_size(MESSAGE_CACHE_SIZE)
        .build();

    let state = Arc::new(State {
        http: http.clone(),
        cache: Arc::new(cache),
        lavalink,
        songbird,
        reqwest: reqwest::Client::new(),
        store: store.clone(),
        music,
        reminders: ReminderScheduler::new(),
        ticket_timers: TicketTimers::new(),
        temp_voice: TempVoiceRegistry::new(),
        lfg: LfgBoard::new(),
        chat_history: ChatHistory::new(),
        latency_ms: Mutex::new(None),
        config,
    });

    register_bot_commands(&state)
        .await
        .context("Failed to register bot commands")?;

    let reminder_task = state
        .reminders
        .spawn(store, Arc::new(DiscordReminderSink::new(http)));
    let _ticket_scheduler = start_ticket_sweep(state.clone())
        .await
        .context("Failed to schedule the ticket sweep")?;

    let latency_state = state.clone();
    tokio::spawn(async move {
        while let Some(info) = shard_info_rx.recv().await {
            if let Some(latency) = info.latency_ms {
                *latency_state.latency_ms.lock().await = Some(latency);
                tracing::debug!(latency_ms = latency, "Latency updated");
            }
        }
        tracing::info!("Shard info channel closed, latency updates will stop.");
    });

    let bot = Bot {
        shard,
        state,
        shard_info_tx,
    };

    tracing::info!("Bot initialized. Connecting to gateway and running event loop...");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let runner_handle = tokio::spawn(async move { runner(bot, shutdown_rx).await });

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl+C received. Initiating graceful shutdown..."),
        Err(e) => tracing::error!(error = ?e, "Failed to listen for ctrl_c signal"),
    }
    if shutdown_tx.send(()).is_err() {
        tracing::warn!("Gateway runner already exited before the shutdown signal.");
    }

    tracing::info!("Waiting for gateway runner to complete...");
    match runner_handle.await {
        Ok(Ok(())) => tracing::info!("Gateway runner finished successfully."),
        Ok(Err(e)) => tracing::error!(error = ?e, "Gateway runner failed."),
        Err(e) => tracing::error!(error = ?e, "Gateway runner task panicked or was cancelled."),
    }
    reminder_task.abort();

    tracing::info!("Shutdown complete.");
    Ok(())
}
