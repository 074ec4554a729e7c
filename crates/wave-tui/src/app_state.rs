//! AppState — everything the UI shows, and the key handling that changes it.
//!
//! Pure state: no terminal, no network.  Key presses and async results come
//! in, `Action`s for the App to carry out go out.  The draw code only reads
//! it.

use std::time::Instant;

use ratatui::crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use tracing::debug;

use wave_proto::catalog::SearchResults;
use wave_proto::config::Config;
use wave_proto::debounce::Debounce;
use wave_proto::discover::{GenreChange, GenreSelection, Spotlight};
use wave_proto::history::HistoryEntry;
use wave_proto::protocol::{Broadcast, NowPlaying, PlayerState};
use wave_proto::track::{TrackCard, TrackRef};

use crate::action::{Action, SearchRequest, Tab};
use crate::widgets::search_input::{InputAction, SearchInput};
use crate::widgets::toast::Toasts;

/// Seek step for `,` / `.`, seconds.
const SEEK_STEP_SECS: f64 = 5.0;

// ── list panes ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PaneStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    /// Loaded but nothing to show; carries the message.
    Empty(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ListPane<T> {
    items: Vec<T>,
    selected: usize,
    status: PaneStatus,
}

impl<T> Default for ListPane<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected: 0,
            status: PaneStatus::Idle,
        }
    }
}

impl<T> ListPane<T> {
    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&T> {
        self.items.get(self.selected)
    }

    pub fn status(&self) -> &PaneStatus {
        &self.status
    }

    pub fn set_loading(&mut self) {
        self.status = PaneStatus::Loading;
    }

    pub fn set_items(&mut self, items: Vec<T>, empty_message: impl Into<String>) {
        self.status = if items.is_empty() {
            PaneStatus::Empty(empty_message.into())
        } else {
            PaneStatus::Ready
        };
        self.items = items;
        self.selected = self.selected.min(self.items.len().saturating_sub(1));
    }

    /// Replace the items, keeping the status.
    pub fn replace_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.selected = self.selected.min(self.items.len().saturating_sub(1));
    }

    pub fn set_failed(&mut self, message: impl Into<String>) {
        self.items.clear();
        self.selected = 0;
        self.status = PaneStatus::Failed(message.into());
    }

    pub fn move_by(&mut self, delta: isize) {
        if self.items.is_empty() {
            return;
        }
        let max = self.items.len() - 1;
        self.selected = self.selected.saturating_add_signed(delta).min(max);
    }

    pub fn first(&mut self) {
        self.selected = 0;
    }

    pub fn last(&mut self) {
        self.selected = self.items.len().saturating_sub(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenreFocus {
    Tiles,
    Tracks,
}

// ── app state ─────────────────────────────────────────────────────────────────

pub struct AppState {
    pub tab: Tab,

    // search
    pub search_input: SearchInput,
    debounce: Debounce<String>,
    next_seq: u64,
    latest_seq: u64,
    latest_done: bool,
    pub search: ListPane<TrackCard>,
    pub search_info: String,
    pub chips: Vec<String>,
    pub chip_cursor: usize,

    pub trending: ListPane<TrackRef>,

    // genres
    pub genres: Vec<String>,
    pub genre_cursor: usize,
    pub genre_selection: GenreSelection,
    pub genre_focus: GenreFocus,
    pub genre_tracks: ListPane<TrackCard>,

    pub featured_artist: String,
    pub spotlight: Option<Spotlight>,
    pub spotlight_status: PaneStatus,

    pub history: ListPane<HistoryEntry>,
    pub confirm_clear: bool,

    pub now_playing: NowPlaying,
    pub toasts: Toasts,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            tab: Tab::Search,
            search_input: SearchInput::new("Search songs, artists, albums..."),
            debounce: Debounce::new(config.ui.debounce()),
            next_seq: 0,
            latest_seq: 0,
            latest_done: true,
            search: ListPane::default(),
            search_info: String::new(),
            chips: config.discover.chips.clone(),
            chip_cursor: 0,
            trending: ListPane::default(),
            genres: config.discover.genres.clone(),
            genre_cursor: 0,
            genre_selection: GenreSelection::default(),
            genre_focus: GenreFocus::Tiles,
            genre_tracks: ListPane::default(),
            featured_artist: config.discover.featured_artist.clone(),
            spotlight: None,
            spotlight_status: PaneStatus::Idle,
            history: ListPane::default(),
            confirm_clear: false,
            now_playing: NowPlaying::default(),
            toasts: Toasts::new(),
            should_quit: false,
        }
    }

    /// Work to start right after launch.
    pub fn startup_actions(&mut self) -> Vec<Action> {
        self.trending.set_loading();
        self.spotlight_status = PaneStatus::Loading;
        vec![Action::LoadTrending, Action::LoadSpotlight]
    }

    // ── search ────────────────────────────────────────────────────────────────

    fn issue_search(&mut self, term: String) -> Action {
        self.next_seq += 1;
        self.latest_seq = self.next_seq;
        self.latest_done = false;
        self.search.set_loading();
        self.search_info.clear();
        debug!("search #{}: {:?}", self.latest_seq, term);
        Action::RunSearch(SearchRequest {
            seq: self.latest_seq,
            term,
        })
    }

    /// Keystroke in the search box.  Blank input never searches.
    pub fn on_search_changed(&mut self, text: &str, now: Instant) {
        let term = text.trim();
        if term.is_empty() {
            self.debounce.cancel();
        } else {
            self.debounce.push(term.to_string(), now);
        }
    }

    /// Explicit submit: bypasses the debounce.
    pub fn submit_search(&mut self, text: &str) -> Option<Action> {
        self.debounce.cancel();
        let term = text.trim();
        if term.is_empty() {
            return None;
        }
        Some(self.issue_search(term.to_string()))
    }

    pub fn run_chip(&mut self, index: usize) -> Option<Action> {
        let chip = self.chips.get(index)?.clone();
        self.search_input.set_value(&chip);
        self.submit_search(&chip)
    }

    /// Fire the debounced search once the input has been quiet long enough.
    pub fn poll_debounce(&mut self, now: Instant) -> Option<Action> {
        let term = self.debounce.poll(now)?;
        Some(self.issue_search(term))
    }

    /// Apply a finished search.  Results are shown in arrival order; the
    /// loading state only ends with the most recent request.
    pub fn apply_search(&mut self, seq: u64, term: &str, result: Result<SearchResults, String>) {
        if seq == self.latest_seq {
            self.latest_done = true;
        } else {
            debug!("search #{} arrived after #{} was issued", seq, self.latest_seq);
        }
        match result {
            Ok(results) => {
                self.search_info = if results.is_empty() {
                    format!("No results found for \"{term}\". Try a different search.")
                } else {
                    format!("Found {} results for \"{term}\"", results.result_count)
                };
                let message = self.search_info.clone();
                self.search.set_items(results.cards(), message);
            }
            Err(e) => {
                debug!("search #{} failed: {}", seq, e);
                self.search_info = "Something went wrong. Please try again.".to_string();
                self.search.set_failed(self.search_info.clone());
            }
        }
        if !self.latest_done {
            self.search.set_loading();
        }
    }

    pub fn search_pending(&self) -> bool {
        self.debounce.is_pending() || !self.latest_done
    }

    // ── discovery results ─────────────────────────────────────────────────────

    pub fn apply_trending(&mut self, result: Result<Vec<TrackRef>, String>) {
        match result {
            Ok(tracks) => self.trending.set_items(tracks, "No trending tracks right now."),
            Err(_) => self.trending.set_failed("Could not load trending tracks."),
        }
    }

    /// Results for a genre that is no longer open are dropped.
    pub fn apply_genre(&mut self, genre: &str, result: Result<Vec<TrackCard>, String>) {
        if self.genre_selection.active() != Some(genre) {
            debug!("dropping results for closed genre {:?}", genre);
            return;
        }
        match result {
            Ok(cards) => self.genre_tracks.set_items(cards, "No tracks in this genre."),
            Err(_) => self.genre_tracks.set_failed("Could not load tracks."),
        }
    }

    pub fn apply_spotlight(&mut self, result: Result<Option<Spotlight>, String>) {
        match result {
            Ok(Some(spotlight)) => {
                self.spotlight = Some(spotlight);
                self.spotlight_status = PaneStatus::Ready;
            }
            Ok(None) => {
                self.spotlight = None;
                self.spotlight_status = PaneStatus::Empty("Could not load artist data.".into());
            }
            Err(_) => {
                self.spotlight = None;
                self.spotlight_status = PaneStatus::Failed("Could not load artist spotlight.".into());
            }
        }
    }

    fn toggle_genre(&mut self, genre: &str) -> Option<Action> {
        match self.genre_selection.toggle(genre) {
            GenreChange::Opened(genre) => {
                self.genre_tracks = ListPane::default();
                self.genre_tracks.set_loading();
                self.genre_focus = GenreFocus::Tracks;
                Some(Action::LoadGenre(genre))
            }
            GenreChange::Closed => {
                self.genre_tracks = ListPane::default();
                self.genre_focus = GenreFocus::Tiles;
                None
            }
        }
    }

    // ── history ───────────────────────────────────────────────────────────────

    pub fn set_history(&mut self, entries: Vec<HistoryEntry>) {
        self.history.set_items(entries, "No songs played yet.");
        if self.history.items().is_empty() {
            self.confirm_clear = false;
        }
    }

    pub fn history_count(&self) -> usize {
        self.history.items().len()
    }

    // ── player broadcasts ─────────────────────────────────────────────────────

    /// True when history should be reloaded.
    pub fn apply_broadcast(&mut self, msg: Broadcast) -> bool {
        match msg {
            Broadcast::Started { track } => {
                self.now_playing.track = Some(track);
                self.now_playing.progress = Default::default();
                self.now_playing.ended = false;
                true
            }
            Broadcast::State { data } => {
                self.now_playing = data;
                false
            }
            Broadcast::Progress { data } => {
                self.now_playing.progress = data;
                false
            }
            Broadcast::Ended { .. } => {
                self.now_playing.ended = true;
                false
            }
            Broadcast::Error { message } => {
                self.toasts.error(message);
                false
            }
        }
    }

    pub fn is_current(&self, track: &TrackRef) -> bool {
        self.now_playing.track.as_ref().is_some_and(|t| t.id() == track.id())
    }

    // ── keys ──────────────────────────────────────────────────────────────────

    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> Vec<Action> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return vec![Action::Quit];
        }

        if self.confirm_clear {
            return self.handle_confirm_key(key);
        }

        if self.search_input.is_active() {
            return match self.search_input.handle_key(key) {
                InputAction::Changed(text) => {
                    self.on_search_changed(&text, now);
                    vec![]
                }
                InputAction::Submitted(text) => self.submit_search(&text).into_iter().collect(),
                InputAction::Blurred | InputAction::None => vec![],
            };
        }

        if let Some(actions) = self.handle_global_key(key) {
            return actions;
        }

        match self.tab {
            Tab::Search => self.handle_search_key(key),
            Tab::Trending => self.handle_trending_key(key),
            Tab::Genres => self.handle_genres_key(key),
            Tab::Artist => self.handle_artist_key(key),
            Tab::History => self.handle_history_key(key),
        }
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                self.confirm_clear = false;
                vec![Action::ClearHistory]
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.confirm_clear = false;
                vec![]
            }
            _ => vec![],
        }
    }

    fn handle_global_key(&mut self, key: KeyEvent) -> Option<Vec<Action>> {
        let actions = match key.code {
            KeyCode::Char('q') => vec![Action::Quit],
            KeyCode::Char('/') => {
                self.tab = Tab::Search;
                self.search_input.activate();
                vec![]
            }
            KeyCode::Char(c @ '1'..='5') => {
                let idx = c as usize - '1' as usize;
                self.tab = Tab::ALL[idx];
                vec![]
            }
            KeyCode::Tab => {
                self.tab = self.tab.next();
                vec![]
            }
            KeyCode::BackTab => {
                self.tab = self.tab.prev();
                vec![]
            }
            KeyCode::Char(' ') => self.player_action(Action::TogglePause),
            KeyCode::Char('x') => self.player_action(Action::ClosePlayer),
            KeyCode::Char(',') => self.seek_step(-SEEK_STEP_SECS),
            KeyCode::Char('.') => self.seek_step(SEEK_STEP_SECS),
            _ => return None,
        };
        Some(actions)
    }

    fn player_action(&self, action: Action) -> Vec<Action> {
        if self.now_playing.state == PlayerState::Idle {
            vec![]
        } else {
            vec![action]
        }
    }

    fn seek_step(&self, delta_secs: f64) -> Vec<Action> {
        let progress = &self.now_playing.progress;
        match progress.duration_secs {
            Some(d) if d > 0.0 && self.now_playing.state != PlayerState::Idle => {
                vec![Action::Seek((progress.position_secs + delta_secs) / d)]
            }
            _ => vec![],
        }
    }

    fn list_nav<T>(pane: &mut ListPane<T>, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => pane.move_by(-1),
            KeyCode::Down | KeyCode::Char('j') => pane.move_by(1),
            KeyCode::PageUp => pane.move_by(-10),
            KeyCode::PageDown => pane.move_by(10),
            KeyCode::Home | KeyCode::Char('g') => pane.first(),
            KeyCode::End | KeyCode::Char('G') => pane.last(),
            _ => return false,
        }
        true
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if Self::list_nav(&mut self.search, &key) {
            return vec![];
        }
        match key.code {
            KeyCode::Enter => self
                .search
                .selected()
                .map(|c| Action::Play(c.track.clone()))
                .into_iter()
                .collect(),
            KeyCode::Left | KeyCode::Char('h') => {
                self.chip_cursor = self.chip_cursor.saturating_sub(1);
                vec![]
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if self.chip_cursor + 1 < self.chips.len() {
                    self.chip_cursor += 1;
                }
                vec![]
            }
            KeyCode::Char('s') => self.run_chip(self.chip_cursor).into_iter().collect(),
            _ => vec![],
        }
    }

    fn handle_trending_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if Self::list_nav(&mut self.trending, &key) {
            return vec![];
        }
        match key.code {
            KeyCode::Enter => self
                .trending
                .selected()
                .map(|t| Action::Play(t.clone()))
                .into_iter()
                .collect(),
            KeyCode::Char('r') => {
                self.trending.set_loading();
                vec![Action::LoadTrending]
            }
            _ => vec![],
        }
    }

    fn handle_genres_key(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => {
                self.genre_focus = GenreFocus::Tiles;
                return vec![];
            }
            KeyCode::Right | KeyCode::Char('l') => {
                if self.genre_selection.active().is_some() {
                    self.genre_focus = GenreFocus::Tracks;
                }
                return vec![];
            }
            KeyCode::Esc => {
                self.genre_selection.close();
                self.genre_tracks = ListPane::default();
                self.genre_focus = GenreFocus::Tiles;
                return vec![];
            }
            _ => {}
        }

        match self.genre_focus {
            GenreFocus::Tiles => match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    self.genre_cursor = self.genre_cursor.saturating_sub(1);
                    vec![]
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    if self.genre_cursor + 1 < self.genres.len() {
                        self.genre_cursor += 1;
                    }
                    vec![]
                }
                KeyCode::Enter => match self.genres.get(self.genre_cursor).cloned() {
                    Some(genre) => self.toggle_genre(&genre).into_iter().collect(),
                    None => vec![],
                },
                _ => vec![],
            },
            GenreFocus::Tracks => {
                if Self::list_nav(&mut self.genre_tracks, &key) {
                    return vec![];
                }
                match key.code {
                    KeyCode::Enter => self
                        .genre_tracks
                        .selected()
                        .map(|c| Action::Play(c.track.clone()))
                        .into_iter()
                        .collect(),
                    _ => vec![],
                }
            }
        }
    }

    fn handle_artist_key(&mut self, key: KeyEvent) -> Vec<Action> {
        match key.code {
            KeyCode::Char('r') => {
                self.spotlight_status = PaneStatus::Loading;
                vec![Action::LoadSpotlight]
            }
            _ => vec![],
        }
    }

    fn handle_history_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if Self::list_nav(&mut self.history, &key) {
            return vec![];
        }
        match key.code {
            KeyCode::Enter => self
                .history
                .selected()
                .map(|e| Action::Play(e.track().clone()))
                .into_iter()
                .collect(),
            KeyCode::Char('d') | KeyCode::Delete => self
                .history
                .selected()
                .map(|e| Action::RemoveHistory(e.id().to_string()))
                .into_iter()
                .collect(),
            KeyCode::Char('C') => {
                // nothing to confirm on an empty history
                self.confirm_clear = self.history_count() > 0;
                vec![]
            }
            _ => vec![],
        }
    }
}
