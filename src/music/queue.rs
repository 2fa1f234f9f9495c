use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::one::RefMut;
use lavalink_rs::model::track::TrackData;
use rand::seq::SliceRandom;
use twilight_model::id::{
    Id,
    marker::{ChannelMarker, GuildMarker, UserMarker},
};

use crate::models::TrackEntry;

use super::filters::FilterPreset;

pub const PAGE_SIZE: usize = 10;
pub const MAX_VOLUME: u16 = 150;
pub const DEFAULT_VOLUME: u16 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl LoopMode {
    /// Off → Track → Queue → Off, used by the loop button.
    pub fn cycle(self) -> Self {
        match self {
            LoopMode::Off => LoopMode::Track,
            LoopMode::Track => LoopMode::Queue,
            LoopMode::Queue => LoopMode::Off,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LoopMode::Off => "off",
            LoopMode::Track => "track",
            LoopMode::Queue => "queue",
        }
    }
}

impl fmt::Display for LoopMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" | "disable" => Ok(LoopMode::Off),
            "track" | "song" | "one" => Ok(LoopMode::Track),
            "queue" | "all" => Ok(LoopMode::Queue),
            other => Err(format!("unknown loop mode `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueuedTrack {
    pub track: TrackData,
    pub requester: Id<UserMarker>,
}

impl QueuedTrack {
    pub fn new(track: TrackData, requester: Id<UserMarker>) -> Self {
        Self { track, requester }
    }

    pub fn title(&self) -> &str {
        &self.track.info.title
    }

    pub fn history_entry(&self, played_at: DateTime<Utc>) -> TrackEntry {
        TrackEntry {
            title: self.track.info.title.clone(),
            author: self.track.info.author.clone(),
            uri: self.track.info.uri.clone(),
            length_ms: self.track.info.length,
            played_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GuildQueue {
    pub current: Option<QueuedTrack>,
    pub upcoming: VecDeque<QueuedTrack>,
    pub loop_mode: LoopMode,
    pub volume: u16,
    pub filter: FilterPreset,
    pub text_channel: Option<Id<ChannelMarker>>,
}

impl Default for GuildQueue {
    fn default() -> Self {
        Self {
            current: None,
            upcoming: VecDeque::new(),
            loop_mode: LoopMode::Off,
            volume: DEFAULT_VOLUME,
            filter: FilterPreset::Off,
            text_channel: None,
        }
    }
}

pub struct QueuePage<'a> {
    pub page: usize,
    pub total_pages: usize,
    /// (1-based position, track)
    pub entries: Vec<(usize, &'a QueuedTrack)>,
}

impl GuildQueue {
    /// Appends tracks; returns true when nothing was playing, i.e. the caller
    /// should start playback.
    pub fn enqueue(&mut self, tracks: impl IntoIterator<Item = QueuedTrack>) -> bool {
        let idle = self.current.is_none();
        self.upcoming.extend(tracks);
        idle
    }

    /// Moves to the next track and returns it. A finished track repeats under
    /// `Track` loop unless it was skipped; under `Queue` loop it goes to the
    /// back.
    pub fn advance(&mut self, was_skipped: bool) -> Option<&QueuedTrack> {
        let finished = self.current.take();
        match (self.loop_mode, finished) {
            (LoopMode::Track, Some(track)) if !was_skipped => {
                self.current = Some(track);
                return self.current.as_ref();
            }
            (LoopMode::Queue, Some(track)) => self.upcoming.push_back(track),
            _ => {}
        }
        self.current = self.upcoming.pop_front();
        self.current.as_ref()
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.upcoming.clear();
    }

    pub fn shuffle(&mut self) {
        self.upcoming.make_contiguous().shuffle(&mut rand::rng());
    }

    /// Removes the track at 1-based `position` in the upcoming list.
    pub fn remove_at(&mut self, position: usize) -> Option<QueuedTrack> {
        position.checked_sub(1).and_then(|index| self.upcoming.remove(index))
    }

    /// Moves a track between 1-based positions.
    pub fn move_track(&mut self, from: usize, to: usize) -> bool {
        let len = self.upcoming.len();
        if from == 0 || to == 0 || from > len || to > len {
            return false;
        }
        if let Some(track) = self.upcoming.remove(from - 1) {
            self.upcoming.insert(to - 1, track);
        }
        true
    }

    /// Drops everything before 1-based `position` so it plays next.
    pub fn jump(&mut self, position: usize) -> bool {
        if position == 0 || position > self.upcoming.len() {
            return false;
        }
        self.upcoming.drain(..position - 1);
        true
    }

    pub fn set_volume(&mut self, volume: u16) -> u16 {
        self.volume = volume.min(MAX_VOLUME);
        self.volume
    }

    pub fn total_pages(&self, per_page: usize) -> usize {
        self.upcoming.len().div_ceil(per_page.max(1)).max(1)
    }

    /// One page of upcoming tracks; `page` is 1-based and clamped.
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage<'_> {
        let per_page = per_page.max(1);
        let total_pages = self.total_pages(per_page);
        let page = page.clamp(1, total_pages);
        let start = (page - 1) * per_page;
        let entries = self
            .upcoming
            .iter()
            .enumerate()
            .skip(start)
            .take(per_page)
            .map(|(index, track)| (index + 1, track))
            .collect();
        QueuePage {
            page,
            total_pages,
            entries,
        }
    }
}

/// Per-guild queues shared by commands, buttons and the track-end hook.
#[derive(Default)]
pub struct MusicQueues {
    queues: DashMap<Id<GuildMarker>, GuildQueue>,
}

impl MusicQueues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, guild_id: Id<GuildMarker>) -> RefMut<'_, Id<GuildMarker>, GuildQueue> {
        self.queues.entry(guild_id).or_default()
    }

    /// Runs `f` on the guild's queue, creating it if needed. The lock is held
    /// only for the duration of `f`.
    pub fn with<R>(&self, guild_id: Id<GuildMarker>, f: impl FnOnce(&mut GuildQueue) -> R) -> R {
        let mut queue = self.entry(guild_id);
        f(&mut queue)
    }

    pub fn snapshot(&self, guild_id: Id<GuildMarker>) -> Option<GuildQueue> {
        self.queues.get(&guild_id).map(|queue| queue.clone())
    }

    pub fn remove(&self, guild_id: Id<GuildMarker>) -> Option<GuildQueue> {
        self.queues.remove(&guild_id).map(|(_, queue)| queue)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn track(title: &str) -> TrackData {
        serde_json::from_value(serde_json::json!({
            "encoded": format!("encoded-{title}"),
            "info": {
                "identifier": title,
                "isSeekable": true,
                "author": "Artist",
                "length": 180000,
                "isStream": false,
                "position": 0,
                "title": title,
                "uri": format!("https://example.com/{title}"),
                "artworkUrl": null,
                "isrc": null,
                "sourceName": "youtube"
            },
            "pluginInfo": {},
            "userData": {}
        }))
        .expect("valid lavalink track json")
    }

    fn queued(title: &str) -> QueuedTrack {
        QueuedTrack::new(track(title), Id::new(1))
    }

    fn titles(queue: &GuildQueue) -> Vec<&str> {
        queue.upcoming.iter().map(QueuedTrack::title).collect()
    }

    #[test]
    fn test_enqueue_and_advance() {
        let mut queue = GuildQueue::default();
        assert!(queue.enqueue([queued("a"), queued("b")]));
        assert_eq!(queue.advance(false).map(QueuedTrack::title), Some("a"));
        assert!(!queue.enqueue([queued("c")]));
        assert_eq!(queue.advance(false).map(QueuedTrack::title), Some("b"));
        assert_eq!(queue.advance(true).map(QueuedTrack::title), Some("c"));
        assert!(queue.advance(false).is_none());
        assert!(queue.current.is_none());
    }

    #[test]
    fn test_track_loop_repeats_unless_skipped() {
        let mut queue = GuildQueue::default();
        queue.enqueue([queued("a"), queued("b")]);
        queue.advance(false);
        queue.loop_mode = LoopMode::Track;
        assert_eq!(queue.advance(false).map(QueuedTrack::title), Some("a"));
        assert_eq!(queue.advance(true).map(QueuedTrack::title), Some("b"));
    }

    #[test]
    fn test_queue_loop_rotates() {
        let mut queue = GuildQueue::default();
        queue.enqueue([queued("a"), queued("b")]);
        queue.loop_mode = LoopMode::Queue;
        queue.advance(false);
        assert_eq!(queue.advance(false).map(QueuedTrack::title), Some("b"));
        assert_eq!(titles(&queue), ["a"]);
        assert_eq!(queue.advance(true).map(QueuedTrack::title), Some("a"));
    }

    #[test]
    fn test_remove_move_jump() {
        let mut queue = GuildQueue::default();
        queue.enqueue(["a", "b", "c", "d"].map(queued));
        assert_eq!(queue.remove_at(2).map(|t| t.title().to_string()).as_deref(), Some("b"));
        assert!(queue.remove_at(0).is_none());
        assert!(queue.move_track(3, 1));
        assert_eq!(titles(&queue), ["d", "a", "c"]);
        assert!(!queue.move_track(1, 9));
        assert!(queue.jump(3));
        assert_eq!(titles(&queue), ["c"]);
        assert!(!queue.jump(5));
    }

    #[test]
    fn test_pagination() {
        let mut queue = GuildQueue::default();
        queue.enqueue((0..23).map(|i| queued(&format!("t{i}"))));
        assert_eq!(queue.total_pages(PAGE_SIZE), 3);
        let last = queue.page(3, PAGE_SIZE);
        assert_eq!(last.entries.len(), 3);
        assert_eq!(last.entries[0].0, 21);
        assert_eq!(queue.page(99, PAGE_SIZE).page, 3);
        assert_eq!(GuildQueue::default().page(1, PAGE_SIZE).entries.len(), 0);
    }

    #[test]
    fn test_shuffle_keeps_tracks() {
        let mut queue = GuildQueue::default();
        queue.enqueue((0..10).map(|i| queued(&format!("t{i}"))));
        queue.shuffle();
        let mut names: Vec<String> = titles(&queue).into_iter().map(String::from).collect();
        names.sort();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "t0");
    }

    #[test]
    fn test_volume_is_capped() {
        let mut queue = GuildQueue::default();
        assert_eq!(queue.set_volume(400), MAX_VOLUME);
        assert_eq!("all".parse::<LoopMode>(), Ok(LoopMode::Queue));
        assert_eq!(LoopMode::Queue.cycle(), LoopMode::Off);
    }
}
