/// mpv IPC driver and the `MediaBackend` built on it.
///
/// ```text
///   MpvDriver::spawn_and_connect()
///         │
///         ├── writer_task   ← MpvRequest via mpsc, serialised → socket
///         └── reader_task   ← JSON lines from socket
///                                ├── response (has request_id) → matched oneshot::Sender
///                                └── event / property-change   → raw event channel
///
///   MpvBackend
///         └── tag_task      ← raw events → MediaEvent tagged with the session
/// ```
///
/// mpv is started lazily on the first `load` and respawned on the next
/// `load` after it dies.
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, trace, warn};

use async_trait::async_trait;
use wave_proto::playback::{MediaBackend, MediaEvent, MediaEventKind, SessionId};
use wave_proto::platform;

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observation property IDs ──────────────────────────────────────────────────

pub const OBS_TIME_POS: u64 = 1;
pub const OBS_DURATION: u64 = 2;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

struct PendingRequest {
    req_id: u64,
    payload: String,
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An unsolicited mpv message (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// `Some((obs_id, data))` for property-change events.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// `reason` of an `end-file` event ("eof", "stop", "error", ...).
    pub fn end_reason(&self) -> Option<&str> {
        self.raw.get("reason")?.as_str()
    }
}

// ── handle ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Replace the current file, starting at `start_secs`.  The `start`
    /// option sticks for later files, so it is set on every load.
    pub async fn load_file(&self, url: &str, start_secs: f64) -> anyhow::Result<()> {
        debug!("mpv: loadfile {} start={:.3}", url, start_secs);
        self.send(json!(["set_property", "start", start_option(start_secs)]))
            .await?;
        self.send(json!(["loadfile", url, "replace"])).await?;
        Ok(())
    }

    pub async fn stop(&self) -> anyhow::Result<()> {
        self.send(json!(["stop"])).await?;
        Ok(())
    }

    pub async fn set_pause(&self, paused: bool) -> anyhow::Result<()> {
        self.send(json!(["set_property", "pause", paused])).await?;
        Ok(())
    }

    pub async fn set_volume(&self, vol: f32) -> anyhow::Result<()> {
        let vol_pct = (vol * 100.0).clamp(0.0, 100.0);
        self.send(json!(["set_property", "volume", vol_pct])).await?;
        Ok(())
    }

    pub async fn seek_to(&self, secs: f64) -> anyhow::Result<()> {
        self.send(json!(["seek", secs, "absolute"])).await?;
        Ok(())
    }

    /// Register the properties the backend reports.  Needed after every
    /// fresh connection.
    pub async fn observe_properties(&self) {
        for (id, name) in [(OBS_TIME_POS, "time-pos"), (OBS_DURATION, "duration")] {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

// ── driver ────────────────────────────────────────────────────────────────────

/// Owns the mpv child process.
pub struct MpvDriver {
    socket_name: String,
    process: Option<tokio::process::Child>,
    volume: f32,
}

impl MpvDriver {
    pub fn new(volume: f32) -> Self {
        Self {
            socket_name: platform::mpv_socket_name(),
            process: None,
            volume,
        }
    }

    pub fn process_alive(&mut self) -> bool {
        let Some(child) = self.process.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                warn!("mpv process exited: {}", status);
                false
            }
            Err(e) => {
                warn!("mpv process_alive check failed: {}", e);
                false
            }
        }
    }

    pub async fn kill(&mut self) {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }
    }

    fn spawn_process(&mut self) -> anyhow::Result<()> {
        let mpv_binary =
            platform::find_mpv_binary().ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;
        let vol_arg = format!(
            "--volume={}",
            (self.volume * 100.0).clamp(0.0, 100.0).round() as i64
        );

        let data_dir = platform::data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let stderr_path = data_dir.join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;

        info!("mpv: spawning {:?}", mpv_binary);
        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg("--no-terminal")
            .arg(platform::mpv_socket_arg())
            .arg(vol_arg)
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true)
            .spawn()?;
        info!("mpv: spawned pid {:?}", child.id());
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;
        self.spawn_process()?;

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.kill().await;
        self.spawn_process()?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, Arc::clone(&pending)));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

async fn fail_pending(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_pending(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(Value::as_u64) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    }
                } else {
                    trace!("mpv reader: event {}", trimmed);
                    if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                        break;
                    }
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_pending(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // register before writing so the reader can match the reply
        pending.lock().await.insert(req.req_id, req.reply);
        trace!("mpv writer: req={} {}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── session tagging ───────────────────────────────────────────────────────────

/// Which session the file currently inside mpv belongs to.
///
/// `pending` is the session of the most recent `loadfile`; it becomes
/// `active` when mpv reports `start-file`.  Between `end-file` and the next
/// `start-file` nothing is active and property changes are dropped.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionTags {
    pub pending: Option<SessionId>,
    pub active: Option<SessionId>,
}

/// Turn a raw mpv event into a media event for the active session.
pub fn translate(event: &MpvEvent, tags: &mut SessionTags) -> Option<MediaEvent> {
    match event.event_name()? {
        "start-file" => {
            tags.active = tags.pending;
            None
        }
        "end-file" => {
            let active = tags.active.take()?;
            // stop/redirect/error: the file was replaced or failed
            (event.end_reason() == Some("eof")).then(|| MediaEvent::new(active, MediaEventKind::Ended))
        }
        "property-change" => {
            let session = tags.active?;
            let (id, data) = event.as_property_change()?;
            let value = data.as_f64()?;
            let kind = match id {
                OBS_TIME_POS => MediaEventKind::Position(value),
                OBS_DURATION => MediaEventKind::Duration(value),
                _ => return None,
            };
            Some(MediaEvent::new(session, kind))
        }
        _ => None,
    }
}

// ── backend ───────────────────────────────────────────────────────────────────

/// `MediaBackend` over a lazily spawned mpv process.
pub struct MpvBackend {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    tags: Arc<std::sync::Mutex<SessionTags>>,
    media_tx: mpsc::Sender<MediaEvent>,
    tag_task: Option<tokio::task::JoinHandle<()>>,
    volume: f32,
}

impl MpvBackend {
    pub fn new(volume: f32, media_tx: mpsc::Sender<MediaEvent>) -> Self {
        Self {
            driver: MpvDriver::new(volume),
            handle: None,
            tags: Arc::new(std::sync::Mutex::new(SessionTags::default())),
            media_tx,
            tag_task: None,
            volume,
        }
    }

    /// False once a spawned mpv has exited.
    pub fn check_alive(&mut self) -> bool {
        if self.handle.is_none() {
            return true;
        }
        if self.driver.process_alive() {
            return true;
        }
        self.handle = None;
        if let Some(task) = self.tag_task.take() {
            task.abort();
        }
        false
    }

    async fn connected(&mut self) -> anyhow::Result<MpvHandle> {
        if let Some(handle) = &self.handle {
            if self.driver.process_alive() {
                return Ok(handle.clone());
            }
            warn!("mpv: process gone, respawning");
        }

        if let Some(task) = self.tag_task.take() {
            task.abort();
        }
        let (raw_tx, mut raw_rx) = mpsc::channel::<MpvEvent>(256);
        let handle = self.driver.spawn_and_connect(raw_tx).await?;
        handle.observe_properties().await;
        if let Err(e) = handle.set_volume(self.volume).await {
            warn!("mpv: set volume failed: {}", e);
        }

        let tags = Arc::clone(&self.tags);
        let media_tx = self.media_tx.clone();
        self.tag_task = Some(tokio::spawn(async move {
            while let Some(raw) = raw_rx.recv().await {
                let event = {
                    let mut tags = tags.lock().unwrap_or_else(|p| p.into_inner());
                    translate(&raw, &mut tags)
                };
                if let Some(event) = event {
                    if media_tx.send(event).await.is_err() {
                        break;
                    }
                }
            }
            debug!("mpv: tag task exiting");
        }));

        self.handle = Some(handle.clone());
        Ok(handle)
    }

    fn set_tags(&self, f: impl FnOnce(&mut SessionTags)) {
        f(&mut self.tags.lock().unwrap_or_else(|p| p.into_inner()));
    }

    fn live_handle(&self) -> anyhow::Result<&MpvHandle> {
        self.handle
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("mpv is not running"))
    }

    pub async fn shutdown(&mut self) {
        if let Some(task) = self.tag_task.take() {
            task.abort();
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.send(json!(["quit"])).await;
        }
        self.driver.kill().await;
    }
}

/// Value for mpv's `start` option: absolute seconds.
fn start_option(secs: f64) -> String {
    if secs.is_finite() && secs > 0.0 {
        format!("{:.3}", secs)
    } else {
        "0".to_string()
    }
}

#[async_trait]
impl MediaBackend for MpvBackend {
    async fn load(&mut self, session: SessionId, url: &str, start_secs: f64) -> anyhow::Result<()> {
        let handle = self.connected().await?;
        self.set_tags(|t| t.pending = Some(session));
        handle.load_file(url, start_secs).await?;
        // loadfile keeps the pause flag from the previous file
        handle.set_pause(false).await
    }

    async fn set_paused(&mut self, paused: bool) -> anyhow::Result<()> {
        self.live_handle()?.set_pause(paused).await
    }

    async fn seek_to(&mut self, secs: f64) -> anyhow::Result<()> {
        self.live_handle()?.seek_to(secs).await
    }

    async fn stop(&mut self) -> anyhow::Result<()> {
        self.set_tags(|t| *t = SessionTags::default());
        match &self.handle {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        }
    }
}
