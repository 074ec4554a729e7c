//! App — terminal event loop.
//!
//! Architecture:
//! - `AppState` holds everything on screen; key handling returns `Vec<Action>`.
//! - A `tokio::mpsc` channel carries `AppMessage`s in from background tasks
//!   (terminal input, player broadcasts, catalog requests).
//! - The loop draws when something changed, then awaits the next message.
//! - Player commands go out through `cmd_tx` to the `PlayerCore` task.

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ratatui::crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use wave_proto::catalog::{CatalogClient, Entity, SearchResults};
use wave_proto::config::Config;
use wave_proto::discover::{self, Spotlight};
use wave_proto::history::HistoryLog;
use wave_proto::protocol::{Broadcast, Command};
use wave_proto::track::{TrackCard, TrackRef};

use crate::action::{Action, SearchRequest};
use crate::app_state::AppState;
use crate::ui;

// ── Internal event bus ────────────────────────────────────────────────────────

enum AppMessage {
    Event(Event),
    Broadcast(Broadcast),
    SearchDone {
        seq: u64,
        term: String,
        result: Result<SearchResults, String>,
    },
    TrendingDone(Result<Vec<TrackRef>, String>),
    GenreDone {
        genre: String,
        result: Result<Vec<TrackCard>, String>,
    },
    SpotlightDone(Result<Option<Spotlight>, String>),
}

pub struct App {
    state: AppState,
    config: Config,
    catalog: Arc<CatalogClient>,
    history: Arc<HistoryLog>,
    cmd_tx: mpsc::Sender<Command>,
    /// Set once `run` has created the message channel.
    msg_tx: Option<mpsc::Sender<AppMessage>>,
}

impl App {
    pub fn new(
        config: Config,
        catalog: CatalogClient,
        history: Arc<HistoryLog>,
        cmd_tx: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            state: AppState::new(&config),
            config,
            catalog: Arc::new(catalog),
            history,
            cmd_tx,
            msg_tx: None,
        }
    }

    // ── Main run loop ─────────────────────────────────────────────────────────

    pub async fn run(mut self, mut broadcast_rx: broadcast::Receiver<Broadcast>) -> anyhow::Result<()> {
        debug!("run(): enabling raw mode");
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal created, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);
        self.msg_tx = Some(tx.clone());

        // ── Background task: keyboard events ──────────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: player broadcasts ────────────────────────────────
        let bc_tx = tx.clone();
        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(msg) => {
                        if bc_tx.send(AppMessage::Broadcast(msg)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("broadcast receiver lagged by {} messages", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.reload_history();
        for action in self.state.startup_actions() {
            self.dispatch(action).await;
        }

        // Debounce polling and toast expiry.
        let mut ui_tick = tokio::time::interval(Duration::from_millis(100));
        ui_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // History timestamps ("5 minutes ago") age on their own.
        let mut clock_tick = tokio::time::interval(Duration::from_secs(30));
        clock_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // ── Main loop ─────────────────────────────────────────────────────────
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal.draw(|f| ui::draw(f, &self.state))?;
            }
            needs_redraw = false;

            if self.state.should_quit {
                break;
            }

            tokio::select! {
                Some(msg) = rx.recv() => {
                    let mut redraw = self.handle_message(msg).await;
                    while let Ok(next) = rx.try_recv() {
                        redraw |= self.handle_message(next).await;
                    }
                    needs_redraw = redraw;
                }

                _ = ui_tick.tick() => {
                    let now = Instant::now();
                    if let Some(action) = self.state.poll_debounce(now) {
                        self.dispatch(action).await;
                        needs_redraw = true;
                    }
                    needs_redraw |= self.state.toasts.tick(now);
                }

                _ = clock_tick.tick() => {
                    needs_redraw = self.state.history_count() > 0;
                }
            }
        }

        // ── Teardown ──────────────────────────────────────────────────────────
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;
        info!("soundwave exiting");

        Ok(())
    }

    /// Returns true when the screen needs a redraw.
    async fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                if key.kind == KeyEventKind::Release {
                    return false;
                }
                let actions = self.state.handle_key(key, Instant::now());
                for action in actions {
                    self.dispatch(action).await;
                }
                true
            }
            AppMessage::Event(Event::Resize(..)) => true,
            AppMessage::Event(_) => false,
            AppMessage::Broadcast(msg) => {
                if self.state.apply_broadcast(msg) {
                    self.reload_history();
                }
                true
            }
            AppMessage::SearchDone { seq, term, result } => {
                self.state.apply_search(seq, &term, result);
                true
            }
            AppMessage::TrendingDone(result) => {
                self.state.apply_trending(result);
                true
            }
            AppMessage::GenreDone { genre, result } => {
                self.state.apply_genre(&genre, result);
                true
            }
            AppMessage::SpotlightDone(result) => {
                self.state.apply_spotlight(result);
                true
            }
        }
    }

    fn reload_history(&mut self) {
        self.state.set_history(self.history.list());
    }

    async fn send_command(&self, cmd: Command) {
        if self.cmd_tx.send(cmd).await.is_err() {
            warn!("player core is gone; command dropped");
        }
    }

    /// Run `fut` in the background and post its message back to the loop.
    fn spawn_request<F>(&self, fut: F)
    where
        F: std::future::Future<Output = AppMessage> + Send + 'static,
    {
        let Some(tx) = self.msg_tx.clone() else {
            warn!("request issued before the event loop started");
            return;
        };
        tokio::spawn(async move {
            let _ = tx.send(fut.await).await;
        });
    }

    async fn dispatch(&mut self, action: Action) {
        debug!("dispatch {:?}", action);
        match action {
            Action::Play(track) => self.send_command(Command::Select { track }).await,
            Action::TogglePause => self.send_command(Command::TogglePause).await,
            Action::Seek(fraction) => self.send_command(Command::Seek { fraction }).await,
            Action::ClosePlayer => self.send_command(Command::Close).await,

            Action::RunSearch(SearchRequest { seq, term }) => {
                let catalog = self.catalog.clone();
                let limit = self.config.catalog.search_limit;
                self.spawn_request(async move {
                    let result = catalog
                        .search(&term, limit, Entity::Song)
                        .await
                        .map_err(|e| {
                            warn!("search {:?} failed: {}", term, e);
                            e.to_string()
                        });
                    AppMessage::SearchDone { seq, term, result }
                });
            }
            Action::LoadTrending => {
                let catalog = self.catalog.clone();
                let discover = self.config.discover.clone();
                self.spawn_request(async move {
                    let result = discover::trending(
                        &catalog,
                        &discover.trending_terms,
                        discover.trending_pick,
                        discover.trending_per_term,
                    )
                    .await
                    .map_err(|e| {
                        warn!("trending failed: {}", e);
                        e.to_string()
                    });
                    AppMessage::TrendingDone(result)
                });
            }
            Action::LoadGenre(genre) => {
                let catalog = self.catalog.clone();
                let limit = self.config.discover.genre_limit;
                self.spawn_request(async move {
                    let result = discover::genre_tracks(&catalog, &genre, limit)
                        .await
                        .map_err(|e| {
                            warn!("genre {:?} failed: {}", genre, e);
                            e.to_string()
                        });
                    AppMessage::GenreDone { genre, result }
                });
            }
            Action::LoadSpotlight => {
                let catalog = self.catalog.clone();
                let artist = self.config.discover.featured_artist.clone();
                self.spawn_request(async move {
                    let result = discover::artist_spotlight(&catalog, &artist)
                        .await
                        .map_err(|e| {
                            warn!("spotlight {:?} failed: {}", artist, e);
                            e.to_string()
                        });
                    AppMessage::SpotlightDone(result)
                });
            }

            Action::RemoveHistory(id) => {
                self.history.remove(&id);
                self.reload_history();
            }
            Action::ClearHistory => {
                self.history.clear();
                self.reload_history();
                self.state.toasts.info("Listening history cleared");
            }

            Action::Quit => self.state.should_quit = true,
        }
    }
}
