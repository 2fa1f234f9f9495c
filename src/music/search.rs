use std::fmt;
use std::str::FromStr;

use lavalink_rs::model::track::{TrackData, TrackLoadData};

/// Search providers Lavalink (with its plugins) understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchSource {
    #[default]
    YouTube,
    YouTubeMusic,
    SoundCloud,
    Spotify,
    AppleMusic,
    Deezer,
}

impl SearchSource {
    pub const ALL: [SearchSource; 6] = [
        SearchSource::YouTube,
        SearchSource::YouTubeMusic,
        SearchSource::SoundCloud,
        SearchSource::Spotify,
        SearchSource::AppleMusic,
        SearchSource::Deezer,
    ];

    pub fn code(self) -> &'static str {
        match self {
            SearchSource::YouTube => "yt",
            SearchSource::YouTubeMusic => "ytm",
            SearchSource::SoundCloud => "sc",
            SearchSource::Spotify => "sp",
            SearchSource::AppleMusic => "am",
            SearchSource::Deezer => "dz",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SearchSource::YouTube => "YouTube",
            SearchSource::YouTubeMusic => "YouTube Music",
            SearchSource::SoundCloud => "SoundCloud",
            SearchSource::Spotify => "Spotify",
            SearchSource::AppleMusic => "Apple Music",
            SearchSource::Deezer => "Deezer",
        }
    }

    fn search_prefix(self) -> String {
        format!("{}search", self.code())
    }
}

impl fmt::Display for SearchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SearchSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        let squashed = wanted.replace(' ', "");
        SearchSource::ALL
            .into_iter()
            .find(|source| {
                source.code() == wanted
                    || source.label().to_ascii_lowercase().replace(' ', "") == squashed
            })
            .ok_or_else(|| format!("unknown search source `{s}`"))
    }
}

fn has_search_prefix(input: &str) -> bool {
    input.split_once(':').is_some_and(|(head, _)| {
        SearchSource::ALL
            .iter()
            .any(|source| head.eq_ignore_ascii_case(&source.search_prefix()))
    })
}

/// URLs and explicit `xxsearch:` queries pass through untouched; anything
/// else becomes a search on `source`.
pub fn build_query(input: &str, source: SearchSource) -> String {
    let input = input.trim();
    if input.starts_with("http://") || input.starts_with("https://") || has_search_prefix(input) {
        input.to_string()
    } else {
        format!("{}:{}", source.search_prefix(), input)
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    Track(TrackData),
    Playlist { name: String, tracks: Vec<TrackData> },
    Search(Vec<TrackData>),
    Empty,
    Error(String),
}

impl LoadOutcome {
    /// Tracks to enqueue: the whole playlist, or the first search hit.
    pub fn into_tracks(self) -> Vec<TrackData> {
        match self {
            LoadOutcome::Track(track) => vec![track],
            LoadOutcome::Playlist { tracks, .. } => tracks,
            LoadOutcome::Search(results) => results.into_iter().take(1).collect(),
            LoadOutcome::Empty | LoadOutcome::Error(_) => Vec::new(),
        }
    }
}

impl From<Option<TrackLoadData>> for LoadOutcome {
    fn from(data: Option<TrackLoadData>) -> Self {
        match data {
            Some(TrackLoadData::Track(track)) => LoadOutcome::Track(track),
            Some(TrackLoadData::Playlist(playlist)) if playlist.tracks.is_empty() => {
                LoadOutcome::Empty
            }
            Some(TrackLoadData::Playlist(playlist)) => LoadOutcome::Playlist {
                name: playlist.info.name,
                tracks: playlist.tracks,
            },
            Some(TrackLoadData::Search(results)) if results.is_empty() => LoadOutcome::Empty,
            Some(TrackLoadData::Search(results)) => LoadOutcome::Search(results),
            Some(TrackLoadData::Error(error)) => LoadOutcome::Error(error.message),
            None => LoadOutcome::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_query() {
        assert_eq!(build_query("never gonna", SearchSource::YouTube), "ytsearch:never gonna");
        assert_eq!(build_query("  lofi  ", SearchSource::SoundCloud), "scsearch:lofi");
        assert_eq!(build_query("x", SearchSource::Deezer), "dzsearch:x");
        assert_eq!(
            build_query("https://youtu.be/dQw4w9WgXcQ", SearchSource::Spotify),
            "https://youtu.be/dQw4w9WgXcQ"
        );
        assert_eq!(build_query("spsearch:artist", SearchSource::YouTube), "spsearch:artist");
        assert_eq!(build_query("song: part 2", SearchSource::YouTube), "ytsearch:song: part 2");
    }

    #[test]
    fn test_source_parsing() {
        assert_eq!("ytm".parse::<SearchSource>(), Ok(SearchSource::YouTubeMusic));
        assert_eq!("Apple Music".parse::<SearchSource>(), Ok(SearchSource::AppleMusic));
        assert_eq!("SP".parse::<SearchSource>(), Ok(SearchSource::Spotify));
        assert!("napster".parse::<SearchSource>().is_err());
    }

    #[test]
    fn test_empty_results() {
        assert!(matches!(LoadOutcome::from(None), LoadOutcome::Empty));
        assert!(matches!(
            LoadOutcome::from(Some(TrackLoadData::Search(Vec::new()))),
            LoadOutcome::Empty
        ));
    }
}
