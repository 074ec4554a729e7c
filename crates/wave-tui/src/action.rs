//! Action enum: everything a key press can ask the App to do.

use wave_proto::track::TrackRef;

/// Top-level panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Search,
    Trending,
    Genres,
    Artist,
    History,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Search,
        Tab::Trending,
        Tab::Genres,
        Tab::Artist,
        Tab::History,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Tab::Search => "Search",
            Tab::Trending => "Trending",
            Tab::Genres => "Genres",
            Tab::Artist => "Artist",
            Tab::History => "History",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn next(&self) -> Tab {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    pub fn prev(&self) -> Tab {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// A search the App should send to the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub seq: u64,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    // ── Playback ─────────────────────────────────────────────────────────────
    Play(TrackRef),
    TogglePause,
    /// Absolute position as a fraction of the track.
    Seek(f64),
    ClosePlayer,

    // ── Catalog ──────────────────────────────────────────────────────────────
    RunSearch(SearchRequest),
    LoadTrending,
    LoadGenre(String),
    LoadSpotlight,

    // ── History ──────────────────────────────────────────────────────────────
    RemoveHistory(String),
    ClearHistory,

    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tab_cycle() {
        assert_eq!(Tab::Search.next(), Tab::Trending);
        assert_eq!(Tab::History.next(), Tab::Search);
        assert_eq!(Tab::Search.prev(), Tab::History);
    }
}
