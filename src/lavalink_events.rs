use lavalink_rs::{
    client::LavalinkClient,
    hook,
    model::events::{self, TrackEndReason},
};
use twilight_model::id::Id;

use crate::music::{MusicContext, player};

#[hook]
pub async fn ready_event(client: LavalinkClient, session_id: String, event: &events::Ready) {
    if let Err(e) = client.delete_all_player_contexts().await {
        tracing::warn!(error = ?e, "Failed to clear stale player contexts");
    }
    tracing::info!(%session_id, resumed = event.resumed, "Lavalink node ready");
}

/// Plays the next queued track once the current one finished on its own.
/// Skips, stops and replacements drive the queue themselves.
#[hook]
pub async fn track_end(client: LavalinkClient, _session_id: String, event: &events::TrackEnd) {
    if !matches!(event.reason, TrackEndReason::Finished | TrackEndReason::LoadFailed) {
        return;
    }
    let Some(guild_id) = Id::new_checked(event.guild_id.0) else {
        return;
    };
    let ctx = match client.data::<MusicContext>() {
        Ok(ctx) => ctx,
        Err(e) => {
            tracing::error!(error = ?e, "Lavalink client carries no music context");
            return;
        }
    };
    if let Err(e) = player::start_next(&client, &ctx, guild_id, false).await {
        tracing::warn!(error = ?e, %guild_id, "Failed to start the next track");
    }
}

#[hook]
pub async fn track_exception(
    _client: LavalinkClient,
    _session_id: String,
    event: &events::TrackException,
) {
    tracing::warn!(
        guild_id = event.guild_id.0,
        title = %event.track.info.title,
        message = ?event.exception.message,
        "Track failed while playing"
    );
}
