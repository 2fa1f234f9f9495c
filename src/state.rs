use std::sync::Arc;

use lavalink_rs::client::LavalinkClient;
use songbird::Songbird;
use tokio::sync::Mutex;
use twilight_cache_inmemory::InMemoryCache;
use twilight_http::Client as HttpClient;

use crate::command_handler::{HasHttpClient, StateExt};
use crate::config::Config;
use crate::features::{chatbot::ChatHistory, lfg::LfgBoard, tempvc::TempVoiceRegistry};
use crate::music::{MusicContext, MusicQueues};
use crate::reminders::ReminderScheduler;
use crate::store::SharedStore;
use crate::tickets::TicketTimers;

/// Process-wide state handed to every handler as `Arc<State>`.
pub struct State {
    pub http: Arc<HttpClient>,
    pub cache: Arc<InMemoryCache>,
    pub lavalink: Arc<LavalinkClient>,
    pub songbird: Arc<Songbird>,
    pub reqwest: reqwest::Client,
    pub store: SharedStore,
    pub music: Arc<MusicQueues>,
    pub reminders: ReminderScheduler,
    pub ticket_timers: TicketTimers,
    pub temp_voice: TempVoiceRegistry,
    pub lfg: LfgBoard,
    pub chat_history: ChatHistory,
    pub latency_ms: Mutex<Option<u128>>,
    pub config: Config,
}

impl State {
    pub fn music_context(&self) -> MusicContext {
        MusicContext {
            queues: self.music.clone(),
            http: self.http.clone(),
            store: self.store.clone(),
        }
    }
}

impl HasHttpClient for Arc<State> {
    fn http_client(&self) -> Arc<HttpClient> {
        self.http.clone()
    }
}

impl StateExt for Arc<State> {
    fn lavalink(&self) -> Arc<LavalinkClient> {
        self.lavalink.clone()
    }

    fn songbird(&self) -> Arc<Songbird> {
        self.songbird.clone()
    }

    fn store(&self) -> SharedStore {
        self.store.clone()
    }
}
