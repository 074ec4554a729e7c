/// PlayerCore: single-owner event loop for playback.
///
/// Runs as a task inside the TUI process.  The UI sends `Command`s over an
/// mpsc channel; the loop owns the `PlaybackController` (and through it the
/// mpv backend) exclusively and answers with `Broadcast`s from the
/// controller's channel.  mpv reports arrive as tagged `MediaEvent`s.
///
/// A heartbeat checks that mpv is still alive; if it died mid-track the
/// session is closed and an error is broadcast.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use wave_proto::config::Config;
use wave_proto::history::HistoryLog;
use wave_proto::playback::{MediaBackend, MediaEvent, PlaybackController, SelectOutcome};
use wave_proto::playlog::PlayLogger;
use wave_proto::protocol::{Broadcast, Command};

use crate::mpv::MpvBackend;

const HEARTBEAT: Duration = Duration::from_secs(5);

pub struct PlayerCore<B: MediaBackend> {
    controller: PlaybackController<B>,
}

impl PlayerCore<MpvBackend> {
    /// Core driving a real mpv process.  Returns the receiver the backend
    /// reports into.
    pub fn with_mpv(
        config: &Config,
        history: Arc<HistoryLog>,
    ) -> (Self, mpsc::Receiver<MediaEvent>) {
        let (media_tx, media_rx) = mpsc::channel(256);
        let backend = MpvBackend::new(config.playback.default_volume, media_tx);
        let playlog = PlayLogger::from_config(&config.playlog);
        (
            Self::new(PlaybackController::new(backend, history, playlog)),
            media_rx,
        )
    }

    /// Run until the command channel closes, then shut mpv down.
    pub async fn run(
        mut self,
        mut cmd_rx: mpsc::Receiver<Command>,
        mut media_rx: mpsc::Receiver<MediaEvent>,
    ) -> anyhow::Result<()> {
        info!("PlayerCore: starting event loop");
        let mut heartbeat = tokio::time::interval(HEARTBEAT);

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        info!("PlayerCore: command channel closed, shutting down");
                        break;
                    }
                },
                Some(event) = media_rx.recv() => {
                    self.handle_media_event(event);
                }
                _ = heartbeat.tick() => {
                    if !self.controller.backend_mut().check_alive() {
                        warn!("PlayerCore: heartbeat: mpv process died");
                        self.controller.close().await;
                        self.controller.report_error("Player stopped unexpectedly");
                    }
                }
            }
        }

        self.controller.backend_mut().shutdown().await;
        Ok(())
    }
}

impl<B: MediaBackend> PlayerCore<B> {
    pub fn new(controller: PlaybackController<B>) -> Self {
        Self { controller }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.controller.subscribe()
    }

    pub fn controller(&self) -> &PlaybackController<B> {
        &self.controller
    }

    pub async fn handle_command(&mut self, cmd: Command) {
        debug!("PlayerCore: command {:?}", cmd);
        let result = match cmd {
            Command::Select { track } => self.controller.select(&track).await.map(|outcome| {
                if outcome == SelectOutcome::NotPlayable {
                    debug!("PlayerCore: {} has no preview", track.id());
                }
            }),
            Command::TogglePause => self.controller.toggle().await.map(|_| ()),
            Command::Seek { fraction } => self.controller.seek(fraction).await.map(|_| ()),
            Command::Close => {
                self.controller.close().await;
                Ok(())
            }
        };

        if let Err(e) = result {
            error!("PlayerCore: command failed: {}", e);
            self.controller.report_error(format!("Playback failed: {e}"));
        }
    }

    pub fn handle_media_event(&mut self, event: MediaEvent) {
        self.controller.on_media_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::time::Duration;
    use wave_proto::history::MemoryStore;
    use wave_proto::playback::{MediaEventKind, SessionId};
    use wave_proto::protocol::PlayerState;
    use wave_proto::track::TrackRef;

    struct NullBackend {
        fail: bool,
    }

    #[async_trait]
    impl MediaBackend for NullBackend {
        async fn load(
            &mut self,
            _session: SessionId,
            _url: &str,
            _start_secs: f64,
        ) -> anyhow::Result<()> {
            if self.fail {
                anyhow::bail!("mpv binary not found");
            }
            Ok(())
        }
        async fn set_paused(&mut self, _paused: bool) -> anyhow::Result<()> {
            Ok(())
        }
        async fn seek_to(&mut self, _secs: f64) -> anyhow::Result<()> {
            Ok(())
        }
        async fn stop(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn core(fail: bool) -> PlayerCore<NullBackend> {
        let history = Arc::new(HistoryLog::new(MemoryStore::new(), 50, Duration::from_secs(600)));
        PlayerCore::new(PlaybackController::new(NullBackend { fail }, history, None))
    }

    fn track(id: &str) -> TrackRef {
        TrackRef::new(id, "t", "a", "", Some(format!("https://p/{id}")))
    }

    #[tokio::test]
    async fn test_commands_drive_controller() {
        let mut core = core(false);
        core.handle_command(Command::Select { track: track("1") }).await;
        assert_eq!(core.controller().state(), PlayerState::Playing);

        core.handle_media_event(MediaEvent::new(1, MediaEventKind::Duration(30.0)));
        core.handle_command(Command::Seek { fraction: 0.25 }).await;
        assert_eq!(core.controller().session().unwrap().position_secs, 7.5);

        core.handle_command(Command::TogglePause).await;
        assert_eq!(core.controller().state(), PlayerState::Paused);

        core.handle_command(Command::Close).await;
        assert_eq!(core.controller().state(), PlayerState::Idle);
    }

    #[tokio::test]
    async fn test_backend_failure_is_broadcast() {
        let mut core = core(true);
        let mut rx = core.subscribe();
        core.handle_command(Command::Select { track: track("1") }).await;

        let mut message = None;
        while let Ok(msg) = rx.try_recv() {
            if let Broadcast::Error { message: m } = msg {
                message = Some(m);
            }
        }
        assert!(message.unwrap().contains("mpv binary not found"));
        assert_eq!(core.controller().state(), PlayerState::Idle);
    }
}
