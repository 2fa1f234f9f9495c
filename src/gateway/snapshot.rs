use twilight_cache_inmemory::InMemoryCache;
use twilight_gateway::Event;
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, UserMarker},
};

/// A message as it was cached before it went away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedContent {
    pub author_id: Id<UserMarker>,
    pub content: String,
}

/// Cache state an event is about to overwrite. The runner updates the
/// cache before handlers run, so anything a handler needs from before the
/// event is captured here first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub deleted_message: Option<CachedContent>,
    pub previous_content: Option<String>,
    pub previous_voice_channel: Option<Id<ChannelMarker>>,
}

impl Snapshot {
    pub fn take(cache: &InMemoryCache, event: &Event) -> Self {
        match event {
            Event::MessageDelete(delete) => Self {
                deleted_message: cache.message(delete.id).map(|message| CachedContent {
                    author_id: message.author(),
                    content: message.content().to_string(),
                }),
                ..Self::default()
            },
            Event::MessageUpdate(update) => Self {
                previous_content: cache
                    .message(update.id)
                    .map(|message| message.content().to_string()),
                ..Self::default()
            },
            Event::VoiceStateUpdate(update) => Self {
                previous_voice_channel: update.guild_id.and_then(|guild_id| {
                    cache
                        .voice_state(update.user_id, guild_id)
                        .map(|state| state.channel_id())
                }),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}
