//! Playback controller: the single owner of the current preview session.
//!
//! The controller drives a [`MediaBackend`] and is the only place that turns
//! a track selection into a history record and a play event.  It is not
//! shared; the player core owns it and feeds it commands and media events
//! one at a time.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

use crate::error::PlaybackError;
use crate::history::HistoryLog;
use crate::playlog::PlayLogger;
use crate::protocol::{Broadcast, NowPlaying, PlayerState, Progress};
use crate::track::TrackRef;

/// Identifies one load of one track.  Allocated monotonically.
pub type SessionId = u64;

/// Something that can play a preview URL.
///
/// `load` replaces whatever was loaded before and starts playing at
/// `start_secs`.  Events produced afterwards must carry the `session` passed
/// to the most recent `load`.
#[async_trait]
pub trait MediaBackend: Send {
    async fn load(&mut self, session: SessionId, url: &str, start_secs: f64) -> anyhow::Result<()>;
    async fn set_paused(&mut self, paused: bool) -> anyhow::Result<()>;
    async fn seek_to(&mut self, secs: f64) -> anyhow::Result<()>;
    async fn stop(&mut self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEventKind {
    /// Playback clock, seconds.
    Position(f64),
    /// Length of the loaded media, seconds.
    Duration(f64),
    /// Natural end of media.
    Ended,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaEvent {
    pub session: SessionId,
    pub kind: MediaEventKind,
}

impl MediaEvent {
    pub fn new(session: SessionId, kind: MediaEventKind) -> Self {
        Self { session, kind }
    }
}

/// Result of a `select` or `toggle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectOutcome {
    /// A new session began (history recorded).
    Started,
    Paused,
    Resumed,
    /// The track has no preview; nothing happened.
    NotPlayable,
    /// Nothing is loaded.
    Ignored,
}

/// The live session.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub track: TrackRef,
    pub playing: bool,
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
    pub ended: bool,
}

impl Session {
    fn new(id: SessionId, track: TrackRef) -> Self {
        Self {
            id,
            track,
            playing: true,
            position_secs: 0.0,
            duration_secs: None,
            ended: false,
        }
    }

    fn progress(&self) -> Progress {
        Progress {
            position_secs: self.position_secs,
            duration_secs: self.duration_secs,
        }
    }
}

pub struct PlaybackController<B: MediaBackend> {
    backend: B,
    history: Arc<HistoryLog>,
    playlog: Option<PlayLogger>,
    session: Option<Session>,
    next_id: SessionId,
    tx: broadcast::Sender<Broadcast>,
}

impl<B: MediaBackend> PlaybackController<B> {
    pub fn new(backend: B, history: Arc<HistoryLog>, playlog: Option<PlayLogger>) -> Self {
        let (tx, _) = broadcast::channel(256);
        Self {
            backend,
            history,
            playlog,
            session: None,
            next_id: 1,
            tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.tx.subscribe()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn state(&self) -> PlayerState {
        match &self.session {
            None => PlayerState::Idle,
            Some(s) if s.playing => PlayerState::Playing,
            Some(_) => PlayerState::Paused,
        }
    }

    pub fn now_playing(&self) -> NowPlaying {
        NowPlaying {
            track: self.session.as_ref().map(|s| s.track.clone()),
            state: self.state(),
            progress: self.session.as_ref().map(Session::progress).unwrap_or_default(),
            ended: self.session.as_ref().is_some_and(|s| s.ended),
        }
    }

    fn emit(&self, msg: Broadcast) {
        // no subscribers is fine
        let _ = self.tx.send(msg);
    }

    /// Surface a failure to subscribers as a user-facing message.
    pub fn report_error(&self, message: impl Into<String>) {
        self.emit(Broadcast::Error {
            message: message.into(),
        });
    }

    fn emit_state(&self) {
        self.emit(Broadcast::State {
            data: self.now_playing(),
        });
    }

    fn allocate_id(&mut self) -> SessionId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// A track was clicked.  Same track toggles; a different one replaces
    /// the session.
    pub async fn select(&mut self, track: &TrackRef) -> Result<SelectOutcome, PlaybackError> {
        let url = match track.playable_url() {
            Ok(url) => url.to_string(),
            Err(e) => {
                debug!("playback: ignoring selection: {}", e);
                return Ok(SelectOutcome::NotPlayable);
            }
        };

        if self.session.as_ref().is_some_and(|s| s.track.id() == track.id()) {
            return self.toggle().await;
        }
        self.start(track.clone(), url).await
    }

    async fn start(&mut self, track: TrackRef, url: String) -> Result<SelectOutcome, PlaybackError> {
        if let Some(old) = self.session.take() {
            debug!("playback: tearing down session {} ({})", old.id, old.track.id());
        }
        let id = self.allocate_id();

        if let Err(e) = self.backend.load(id, &url, 0.0).await {
            error!("playback: failed to load {}: {}", track.id(), e);
            if let Err(e) = self.backend.stop().await {
                warn!("playback: stop after failed load: {}", e);
            }
            self.emit_state();
            return Err(PlaybackError::Backend(e.to_string()));
        }

        info!("playback: session {} -> {}", id, track.display());
        self.session = Some(Session::new(id, track.clone()));
        self.history.record(&track);
        if let Some(logger) = &self.playlog {
            logger.dispatch(&track);
        }

        self.emit(Broadcast::Started { track });
        self.emit_state();
        Ok(SelectOutcome::Started)
    }

    /// Play/pause on the current session.  Resuming a session that ended
    /// naturally reloads it: from the seek target if one was set since the
    /// end, otherwise from the beginning.
    pub async fn toggle(&mut self) -> Result<SelectOutcome, PlaybackError> {
        let Some(session) = &self.session else {
            return Ok(SelectOutcome::Ignored);
        };

        if session.playing {
            self.backend.set_paused(true).await?;
            if let Some(s) = self.session.as_mut() {
                s.playing = false;
            }
            self.emit_state();
            return Ok(SelectOutcome::Paused);
        }

        if session.ended {
            let url = session.track.playable_url()?.to_string();
            let start = match session.duration_secs {
                Some(d) if session.position_secs < d => session.position_secs.max(0.0),
                _ => 0.0,
            };
            let id = self.allocate_id();
            self.backend.load(id, &url, start).await?;
            if let Some(s) = self.session.as_mut() {
                debug!("playback: replaying {} as session {} from {:.1}s", s.track.id(), id, start);
                s.id = id;
                s.ended = false;
                s.position_secs = start;
                s.playing = true;
            }
        } else {
            self.backend.set_paused(false).await?;
            if let Some(s) = self.session.as_mut() {
                s.playing = true;
            }
        }
        self.emit_state();
        Ok(SelectOutcome::Resumed)
    }

    /// Jump to `fraction` of the track.  Returns the new progress, or `None`
    /// when nothing is loaded or the duration is not known yet.
    ///
    /// After a natural end the media is already unloaded; the target is kept
    /// and the next `toggle` resumes from it.
    pub async fn seek(&mut self, fraction: f64) -> Result<Option<Progress>, PlaybackError> {
        let Some(duration) = self
            .session
            .as_ref()
            .and_then(|s| s.duration_secs)
            .filter(|d| *d > 0.0)
        else {
            return Ok(None);
        };

        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        let target = fraction * duration;
        let ended = self.session.as_ref().is_some_and(|s| s.ended);
        if !ended {
            self.backend.seek_to(target).await?;
        }

        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };
        session.position_secs = target;
        let progress = session.progress();
        self.emit(Broadcast::Progress { data: progress });
        Ok(Some(progress))
    }

    /// Stop and release the session.  Backend failures are logged only.
    pub async fn close(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        info!("playback: closing session {}", session.id);
        if let Err(e) = self.backend.stop().await {
            warn!("playback: stop failed: {}", e);
        }
        self.emit_state();
    }

    /// Apply a backend report.  Events from any session but the current one
    /// are dropped.
    pub fn on_media_event(&mut self, event: MediaEvent) -> Option<Progress> {
        let Some(session) = self.session.as_mut() else {
            trace!("playback: event with no session: {:?}", event);
            return None;
        };
        if event.session != session.id {
            trace!("playback: stale event for session {}: {:?}", event.session, event.kind);
            return None;
        }

        match event.kind {
            MediaEventKind::Position(pos) => {
                if session.ended || !session.playing {
                    return None;
                }
                session.position_secs = pos.max(0.0);
            }
            MediaEventKind::Duration(d) => {
                if !(d.is_finite() && d > 0.0) {
                    return None;
                }
                session.duration_secs = Some(d);
            }
            MediaEventKind::Ended => {
                session.playing = false;
                session.ended = true;
                if let Some(d) = session.duration_secs {
                    session.position_secs = d;
                }
                let track_id = session.track.id().to_string();
                let progress = session.progress();
                info!("playback: session {} ended", session.id);
                self.emit(Broadcast::Ended { track_id });
                self.emit(Broadcast::Progress { data: progress });
                self.emit_state();
                return Some(progress);
            }
        }

        let progress = session.progress();
        self.emit(Broadcast::Progress { data: progress });
        Some(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemoryStore;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeBackend {
        calls: Vec<String>,
        fail_load: bool,
    }

    #[async_trait]
    impl MediaBackend for FakeBackend {
        async fn load(&mut self, session: SessionId, url: &str, start_secs: f64) -> anyhow::Result<()> {
            self.calls.push(format!("load {session} {url} @{start_secs}"));
            if self.fail_load {
                anyhow::bail!("no audio device");
            }
            Ok(())
        }
        async fn set_paused(&mut self, paused: bool) -> anyhow::Result<()> {
            self.calls.push(format!("pause {paused}"));
            Ok(())
        }
        async fn seek_to(&mut self, secs: f64) -> anyhow::Result<()> {
            self.calls.push(format!("seek {secs}"));
            Ok(())
        }
        async fn stop(&mut self) -> anyhow::Result<()> {
            self.calls.push("stop".into());
            Ok(())
        }
    }

    fn track(id: &str) -> TrackRef {
        TrackRef::new(id, format!("Song {id}"), "Artist", "", Some(format!("https://p/{id}")))
    }

    fn controller() -> (PlaybackController<FakeBackend>, Arc<HistoryLog>) {
        let history = Arc::new(HistoryLog::new(MemoryStore::new(), 50, Duration::from_secs(86_400)));
        let ctl = PlaybackController::new(FakeBackend::default(), Arc::clone(&history), None);
        (ctl, history)
    }

    fn history_ids(history: &HistoryLog) -> Vec<String> {
        history.list().iter().map(|e| e.id().to_string()).collect()
    }

    #[tokio::test]
    async fn test_select_same_track_toggles_without_recording() {
        let (mut ctl, history) = controller();
        let x = track("x");

        assert_eq!(ctl.select(&x).await.unwrap(), SelectOutcome::Started);
        assert_eq!(ctl.state(), PlayerState::Playing);
        assert_eq!(ctl.select(&x).await.unwrap(), SelectOutcome::Paused);
        assert_eq!(ctl.state(), PlayerState::Paused);
        assert_eq!(ctl.select(&x).await.unwrap(), SelectOutcome::Resumed);
        assert_eq!(ctl.state(), PlayerState::Playing);

        let entries = history.list();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id(), "x");
    }

    #[tokio::test]
    async fn test_switching_tracks_records_both() {
        let (mut ctl, history) = controller();
        ctl.select(&track("x")).await.unwrap();
        ctl.select(&track("y")).await.unwrap();

        assert_eq!(history_ids(&history), ["y", "x"]);
        assert_eq!(ctl.session().unwrap().track.id(), "y");
        assert_eq!(ctl.session().unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_track_without_preview_is_noop() {
        let (mut ctl, history) = controller();
        let silent = TrackRef::new("z", "t", "a", "", None);
        assert_eq!(ctl.select(&silent).await.unwrap(), SelectOutcome::NotPlayable);
        assert_eq!(ctl.state(), PlayerState::Idle);
        assert!(history.is_empty());
        assert!(ctl.backend().calls.is_empty());
    }

    #[tokio::test]
    async fn test_close_returns_to_idle() {
        let (mut ctl, _) = controller();
        ctl.select(&track("x")).await.unwrap();
        ctl.close().await;
        assert_eq!(ctl.state(), PlayerState::Idle);
        assert_eq!(ctl.backend().calls.last().map(String::as_str), Some("stop"));
        // toggle with nothing loaded
        assert_eq!(ctl.toggle().await.unwrap(), SelectOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_seek_clamps_and_waits_for_duration() {
        let (mut ctl, _) = controller();
        ctl.select(&track("x")).await.unwrap();
        assert_eq!(ctl.seek(0.5).await.unwrap(), None);

        ctl.on_media_event(MediaEvent::new(1, MediaEventKind::Duration(30.0)));
        let p = ctl.seek(1.7).await.unwrap().unwrap();
        assert_eq!(p.position_secs, 30.0);
        let p = ctl.seek(-0.2).await.unwrap().unwrap();
        assert_eq!(p.position_secs, 0.0);
        let p = ctl.seek(0.5).await.unwrap().unwrap();
        assert_eq!(p.position_secs, 15.0);
        assert_eq!(ctl.state(), PlayerState::Playing);
    }

    #[tokio::test]
    async fn test_natural_end_pauses_at_duration() {
        let (mut ctl, history) = controller();
        let x = track("x");
        ctl.select(&x).await.unwrap();
        ctl.on_media_event(MediaEvent::new(1, MediaEventKind::Duration(29.9)));
        ctl.on_media_event(MediaEvent::new(1, MediaEventKind::Position(12.0)));
        let p = ctl.on_media_event(MediaEvent::new(1, MediaEventKind::Ended)).unwrap();

        assert_eq!(p.position_secs, 29.9);
        assert_eq!(ctl.state(), PlayerState::Paused);
        assert!(ctl.now_playing().ended);

        // replay from the start, no new history entry
        assert_eq!(ctl.select(&x).await.unwrap(), SelectOutcome::Resumed);
        let s = ctl.session().unwrap();
        assert_eq!(s.position_secs, 0.0);
        assert!(!s.ended);
        assert_eq!(s.id, 2);
        assert_eq!(history.len(), 1);
        assert_eq!(
            ctl.backend().calls.last().map(String::as_str),
            Some("load 2 https://p/x @0")
        );
    }

    #[tokio::test]
    async fn test_seek_after_end_resumes_from_target() {
        let (mut ctl, history) = controller();
        let x = track("x");
        ctl.select(&x).await.unwrap();
        ctl.on_media_event(MediaEvent::new(1, MediaEventKind::Duration(30.0)));
        ctl.on_media_event(MediaEvent::new(1, MediaEventKind::Ended));

        let p = ctl.seek(0.5).await.unwrap().unwrap();
        assert_eq!(p.position_secs, 15.0);
        assert_eq!(ctl.state(), PlayerState::Paused);
        // nothing loaded to seek in
        assert!(!ctl.backend().calls.iter().any(|c| c.starts_with("seek")));

        assert_eq!(ctl.toggle().await.unwrap(), SelectOutcome::Resumed);
        let s = ctl.session().unwrap();
        assert_eq!(s.id, 2);
        assert_eq!(s.position_secs, 15.0);
        assert!(s.playing);
        assert!(!s.ended);
        assert_eq!(
            ctl.backend().calls.last().map(String::as_str),
            Some("load 2 https://p/x @15")
        );
        assert_eq!(history.len(), 1);

        // reports from the reloaded session move the clock on
        let p = ctl
            .on_media_event(MediaEvent::new(2, MediaEventKind::Position(16.0)))
            .unwrap();
        assert_eq!(p.position_secs, 16.0);
    }

    #[tokio::test]
    async fn test_stale_session_events_ignored() {
        let (mut ctl, _) = controller();
        ctl.select(&track("x")).await.unwrap();
        ctl.select(&track("y")).await.unwrap();

        assert_eq!(ctl.on_media_event(MediaEvent::new(1, MediaEventKind::Position(5.0))), None);
        assert_eq!(ctl.on_media_event(MediaEvent::new(1, MediaEventKind::Ended)), None);
        assert_eq!(ctl.state(), PlayerState::Playing);

        let p = ctl
            .on_media_event(MediaEvent::new(2, MediaEventKind::Position(1.5)))
            .unwrap();
        assert_eq!(p.position_secs, 1.5);
    }

    #[tokio::test]
    async fn test_failed_load_stays_idle_without_record() {
        let history = Arc::new(HistoryLog::new(MemoryStore::new(), 50, Duration::from_secs(60)));
        let backend = FakeBackend {
            fail_load: true,
            ..Default::default()
        };
        let mut ctl = PlaybackController::new(backend, Arc::clone(&history), None);

        let err = ctl.select(&track("x")).await.unwrap_err();
        assert!(matches!(err, PlaybackError::Backend(_)));
        assert_eq!(ctl.state(), PlayerState::Idle);
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_broadcasts_progress_while_playing() {
        let (mut ctl, _) = controller();
        let mut rx = ctl.subscribe();
        ctl.select(&track("x")).await.unwrap();
        ctl.on_media_event(MediaEvent::new(1, MediaEventKind::Position(3.0)));

        let mut saw_started = false;
        let mut last_progress = None;
        while let Ok(msg) = rx.try_recv() {
            match msg {
                Broadcast::Started { track } => saw_started = track.id() == "x",
                Broadcast::Progress { data } => last_progress = Some(data),
                _ => {}
            }
        }
        assert!(saw_started);
        assert_eq!(last_progress.map(|p| p.label()), Some("0:03".to_string()));
    }
}
