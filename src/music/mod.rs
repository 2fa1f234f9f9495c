pub mod filters;
pub mod player;
pub mod queue;
pub mod search;

use std::sync::Arc;

use anyhow::anyhow;
use lavalink_rs::client::LavalinkClient;
use twilight_http::Client as HttpClient;
use twilight_model::id::{Id, marker::GuildMarker};

use crate::store::SharedStore;

pub use filters::FilterPreset;
pub use queue::{GuildQueue, LoopMode, MusicQueues, QueuedTrack};
pub use search::{LoadOutcome, SearchSource, build_query};

pub const MUSIC_COLOR: u32 = 0x1db954;

/// What the Lavalink event hooks need to keep playback going. Installed as the
/// client's user data.
#[derive(Clone)]
pub struct MusicContext {
    pub queues: Arc<MusicQueues>,
    pub http: Arc<HttpClient>,
    pub store: SharedStore,
}

/// Loads `query` (already built with [`build_query`]) on the guild's node.
pub async fn load(
    lavalink: &LavalinkClient,
    guild_id: Id<GuildMarker>,
    query: &str,
) -> anyhow::Result<LoadOutcome> {
    let tracks = lavalink.load_tracks(guild_id, query).await?;
    Ok(LoadOutcome::from(tracks.data))
}

/// Lyrics for whatever the guild's player is on.
pub async fn lyrics(
    lavalink: &LavalinkClient,
    reqwest: &reqwest::Client,
    guild_id: Id<GuildMarker>,
) -> anyhow::Result<Option<String>> {
    let node = lavalink.get_node_for_guild(guild_id).await;
    let session_id = node.session_id.load();
    let token = node
        .http
        .headers
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| anyhow!("Lavalink node has no Authorization header"))?;

    crate::utils::lyrics::get_lyrics(
        &node.http.rest_address_versionless,
        &session_id,
        &guild_id.to_string(),
        reqwest,
        token,
    )
    .await
}
