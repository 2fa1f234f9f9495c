use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use twilight_model::id::{
    Id,
    marker::{GuildMarker, UserMarker},
};

pub const FREE_HISTORY_LIMIT: usize = 50;
pub const PREMIUM_HISTORY_LIMIT: usize = 200;
pub const MAX_PLAYLISTS: usize = 25;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPreferences {
    pub timezone: String,
    pub default_volume: u16,
    pub search_source: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            default_volume: 100,
            search_source: "yt".to_string(),
        }
    }
}

/// A played or saved track, reduced to what can be shown or searched again.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackEntry {
    pub title: String,
    pub author: String,
    pub uri: Option<String>,
    pub length_ms: u64,
    pub played_at: DateTime<Utc>,
}

impl TrackEntry {
    fn same_track(&self, other: &TrackEntry) -> bool {
        match (&self.uri, &other.uri) {
            (Some(a), Some(b)) => a == b,
            _ => self.title == other.title && self.author == other.author,
        }
    }

    /// The query that loads this track again.
    pub fn query(&self) -> String {
        self.uri
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.author, self.title))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Playlist {
    pub name: String,
    pub tracks: Vec<TrackEntry>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserGuildSettings {
    pub dj_mode: bool,
    pub announce_tracks: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user_id: Id<UserMarker>,
    #[serde(default)]
    pub preferences: UserPreferences,
    #[serde(default)]
    pub premium: bool,
    #[serde(default)]
    pub premium_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub history: Vec<TrackEntry>,
    #[serde(default)]
    pub playlists: Vec<Playlist>,
    #[serde(default)]
    pub favorites: Vec<TrackEntry>,
    #[serde(default)]
    pub guild_settings: BTreeMap<Id<GuildMarker>, UserGuildSettings>,
    #[serde(default)]
    pub commands_used: u64,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl UserProfile {
    pub fn new(user_id: Id<UserMarker>) -> Self {
        Self {
            user_id,
            preferences: UserPreferences::default(),
            premium: false,
            premium_expires_at: None,
            history: Vec::new(),
            playlists: Vec::new(),
            favorites: Vec::new(),
            guild_settings: BTreeMap::new(),
            commands_used: 0,
            last_seen: None,
        }
    }

    pub fn is_premium(&self, now: DateTime<Utc>) -> bool {
        self.premium && self.premium_expires_at.is_none_or(|expiry| expiry > now)
    }

    pub fn history_limit(&self, now: DateTime<Utc>) -> usize {
        if self.is_premium(now) {
            PREMIUM_HISTORY_LIMIT
        } else {
            FREE_HISTORY_LIMIT
        }
    }

    /// Inserts at the front and truncates to the tier limit. A replay of the
    /// track already at the front only refreshes its timestamp.
    pub fn push_history(&mut self, entry: TrackEntry, now: DateTime<Utc>) {
        if self
            .history
            .first()
            .is_some_and(|latest| latest.same_track(&entry))
        {
            self.history.remove(0);
        }
        self.history.insert(0, entry);
        let limit = self.history_limit(now);
        self.history.truncate(limit);
    }

    /// Returns false when the track is already a favorite.
    pub fn add_favorite(&mut self, entry: TrackEntry) -> bool {
        if self.favorites.iter().any(|f| f.same_track(&entry)) {
            return false;
        }
        self.favorites.insert(0, entry);
        true
    }

    pub fn playlist(&self, name: &str) -> Option<&Playlist> {
        self.playlists
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn create_playlist(&mut self, name: &str, now: DateTime<Utc>) -> anyhow::Result<()> {
        let name = name.trim();
        if name.is_empty() {
            anyhow::bail!("Playlist names cannot be empty.");
        }
        if self.playlist(name).is_some() {
            anyhow::bail!("You already have a playlist called `{}`.", name);
        }
        if self.playlists.len() >= MAX_PLAYLISTS {
            anyhow::bail!("You can keep at most {} playlists.", MAX_PLAYLISTS);
        }
        self.playlists.push(Playlist {
            name: name.to_string(),
            tracks: Vec::new(),
            created_at: now,
        });
        Ok(())
    }

    pub fn add_to_playlist(&mut self, name: &str, entry: TrackEntry) -> anyhow::Result<usize> {
        let playlist = self
            .playlists
            .iter_mut()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow::anyhow!("No playlist called `{}`.", name))?;
        playlist.tracks.push(entry);
        Ok(playlist.tracks.len())
    }

    pub fn remove_playlist(&mut self, name: &str) -> bool {
        let before = self.playlists.len();
        self.playlists.retain(|p| !p.name.eq_ignore_ascii_case(name));
        before != self.playlists.len()
    }

    pub fn record_command(&mut self, now: DateTime<Utc>) {
        self.commands_used += 1;
        self.last_seen = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
    }

    fn entry(n: usize) -> TrackEntry {
        TrackEntry {
            title: format!("Song {n}"),
            author: "Artist".to_string(),
            uri: Some(format!("https://example.com/{n}")),
            length_ms: 180_000,
            played_at: now(),
        }
    }

    #[test]
    fn test_history_is_most_recent_first() {
        let mut user = UserProfile::new(Id::new(1));
        user.push_history(entry(1), now());
        user.push_history(entry(2), now());
        assert_eq!(user.history[0].title, "Song 2");
        assert_eq!(user.history[1].title, "Song 1");
    }

    #[test]
    fn test_history_caps_free_users_at_50() {
        let mut user = UserProfile::new(Id::new(1));
        for n in 0..75 {
            user.push_history(entry(n), now());
        }
        assert_eq!(user.history.len(), FREE_HISTORY_LIMIT);
        assert_eq!(user.history[0].title, "Song 74");
        assert_eq!(user.history[49].title, "Song 25");
    }

    #[test]
    fn test_history_caps_premium_users_at_200() {
        let mut user = UserProfile::new(Id::new(1));
        user.premium = true;
        for n in 0..250 {
            user.push_history(entry(n), now());
        }
        assert_eq!(user.history.len(), PREMIUM_HISTORY_LIMIT);
        assert_eq!(user.history[0].title, "Song 249");
    }

    #[test]
    fn test_expired_premium_uses_free_limit() {
        let mut user = UserProfile::new(Id::new(1));
        user.premium = true;
        user.premium_expires_at = Some(now() - Duration::days(1));
        assert!(!user.is_premium(now()));
        assert_eq!(user.history_limit(now()), FREE_HISTORY_LIMIT);
    }

    #[test]
    fn test_replaying_front_track_does_not_duplicate() {
        let mut user = UserProfile::new(Id::new(1));
        user.push_history(entry(1), now());
        user.push_history(entry(1), now());
        assert_eq!(user.history.len(), 1);
    }

    #[test]
    fn test_favorites_reject_duplicates() {
        let mut user = UserProfile::new(Id::new(1));
        assert!(user.add_favorite(entry(1)));
        assert!(!user.add_favorite(entry(1)));
        assert_eq!(user.favorites.len(), 1);
    }

    #[test]
    fn test_playlists() {
        let mut user = UserProfile::new(Id::new(1));
        user.create_playlist("Chill", now()).unwrap();
        assert!(user.create_playlist("chill", now()).is_err());
        assert_eq!(user.add_to_playlist("CHILL", entry(3)).unwrap(), 1);
        assert!(user.add_to_playlist("missing", entry(3)).is_err());
        assert!(user.remove_playlist("Chill"));
        assert!(user.playlists.is_empty());
    }
}
