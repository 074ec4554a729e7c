//! Remote play-event log.
//!
//! Every track start can be mirrored to an external event sink.  Dispatch is
//! fire-and-forget: the event is sent from a spawned task after the local
//! history has been written, and any failure ends in a `warn!` line.  Nothing
//! here can fail or slow down playback.
//!
//! The bundled sink speaks the Firebase Realtime Database REST dialect:
//! `POST {database_url}/songLog/{users|guests}/{id}.json` appends a child
//! with a generated key.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::PlayLogConfig;
use crate::track::TrackRef;

/// Who played the track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    User {
        uid: String,
        name: Option<String>,
        email: Option<String>,
    },
    Guest {
        client_id: String,
    },
}

impl Identity {
    /// Collection the event is filed under.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::User { .. } => "users",
            Self::Guest { .. } => "guests",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Self::User { uid, .. } => uid,
            Self::Guest { client_id } => client_id,
        }
    }

    pub fn display_name(&self) -> String {
        match self {
            Self::User { name, email, .. } => name
                .clone()
                .or_else(|| email.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            Self::Guest { .. } => "Guest".to_string(),
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            Self::User { email, .. } => email.as_deref(),
            Self::Guest { .. } => None,
        }
    }
}

/// Structured record of one track start.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayEvent {
    pub track_id: String,
    pub title: String,
    pub artist: String,
    pub artwork: String,
    pub preview_url: Option<String>,
    pub user_name: String,
    pub user_email: Option<String>,
    pub date: String,
    pub time: String,
    pub timestamp: String,
    pub epoch_ms: i64,
}

impl PlayEvent {
    pub fn new(track: &TrackRef, identity: &Identity, at: DateTime<Utc>) -> Self {
        let local = at.with_timezone(&Local);
        Self {
            track_id: track.id().to_string(),
            title: track.title().to_string(),
            artist: track.artist().to_string(),
            artwork: track.art().to_string(),
            preview_url: track.preview().map(str::to_string),
            user_name: identity.display_name(),
            user_email: identity.email().map(str::to_string),
            date: local.format("%d/%m/%Y").to_string(),
            time: local.format("%I:%M:%S %P").to_string(),
            timestamp: at.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            epoch_ms: at.timestamp_millis(),
        }
    }
}

/// Destination for play events.
#[async_trait]
pub trait PlaySink: Send + Sync {
    async fn append(&self, identity: &Identity, event: &PlayEvent) -> anyhow::Result<()>;
}

/// Realtime Database REST sink.
pub struct RtdbSink {
    http: reqwest::Client,
    database_url: String,
}

impl RtdbSink {
    pub fn new(database_url: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            database_url: database_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn event_url(&self, identity: &Identity) -> String {
        format!(
            "{}/songLog/{}/{}.json",
            self.database_url,
            identity.kind(),
            identity.key()
        )
    }
}

#[async_trait]
impl PlaySink for RtdbSink {
    async fn append(&self, identity: &Identity, event: &PlayEvent) -> anyhow::Result<()> {
        let response = self
            .http
            .post(self.event_url(identity))
            .json(event)
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("sink returned status {}", response.status());
        }
        Ok(())
    }
}

/// Dispatches play events to a sink without ever blocking the caller.
#[derive(Clone)]
pub struct PlayLogger {
    sink: Arc<dyn PlaySink>,
    identity: Identity,
}

impl PlayLogger {
    pub fn new(sink: Arc<dyn PlaySink>, identity: Identity) -> Self {
        Self { sink, identity }
    }

    /// Build the configured logger.  `None` when no database is configured
    /// or the sink cannot be constructed.
    pub fn from_config(config: &PlayLogConfig) -> Option<Self> {
        let url = config.database_url.as_deref().filter(|u| !u.trim().is_empty())?;
        let sink = match RtdbSink::new(url) {
            Ok(s) => s,
            Err(e) => {
                warn!("playlog: disabled, cannot build sink: {}", e);
                return None;
            }
        };
        let identity = match &config.user {
            Some(user) => Identity::User {
                uid: user.uid.clone(),
                name: user.display_name.clone(),
                email: user.email.clone(),
            },
            None => Identity::Guest {
                client_id: guest_client_id(&config.client_id_file),
            },
        };
        info!("playlog: logging plays as {}/{}", identity.kind(), identity.key());
        Some(Self::new(Arc::new(sink), identity))
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Send the play event for `track` from a background task.
    pub fn dispatch(&self, track: &TrackRef) -> tokio::task::JoinHandle<()> {
        let event = PlayEvent::new(track, &self.identity, Utc::now());
        let sink = Arc::clone(&self.sink);
        let identity = self.identity.clone();
        tokio::spawn(async move {
            match sink.append(&identity, &event).await {
                Ok(()) => debug!("playlog: logged {:?} ({})", event.title, identity.kind()),
                Err(e) => warn!("playlog: failed to log {:?}: {}", event.title, e),
            }
        })
    }
}

/// Load the persistent guest id, creating it on first use.  A write failure
/// still yields a usable (per-run) id.
pub fn guest_client_id(path: &Path) -> String {
    if let Ok(existing) = std::fs::read_to_string(path) {
        let existing = existing.trim();
        if !existing.is_empty() {
            return existing.to_string();
        }
    }

    let id = generate_client_id(Utc::now().timestamp_millis());
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Err(e) = std::fs::write(path, &id) {
        warn!("playlog: could not persist guest id to {}: {}", path.display(), e);
    }
    id
}

/// `guest_<epoch ms>_<9 base-36 chars>`.
pub fn generate_client_id(epoch_ms: i64) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..9)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect();
    format!("guest_{}_{}", epoch_ms, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn track() -> TrackRef {
        TrackRef::new("42", "Tum Hi Ho", "Arijit Singh", "https://a/300x300.jpg", Some("https://p/42".into()))
    }

    #[test]
    fn test_identity_paths() {
        let user = Identity::User {
            uid: "u1".into(),
            name: None,
            email: Some("u@example.com".into()),
        };
        assert_eq!(user.kind(), "users");
        assert_eq!(user.display_name(), "u@example.com");
        let guest = Identity::Guest { client_id: "guest_1_abc".into() };
        assert_eq!(guest.kind(), "guests");
        assert_eq!(guest.display_name(), "Guest");
        assert_eq!(guest.email(), None);
    }

    #[test]
    fn test_event_fields() {
        let at = Utc.with_ymd_and_hms(2025, 3, 4, 5, 6, 7).unwrap();
        let guest = Identity::Guest { client_id: "g".into() };
        let ev = PlayEvent::new(&track(), &guest, at);
        assert_eq!(ev.track_id, "42");
        assert_eq!(ev.epoch_ms, at.timestamp_millis());
        assert_eq!(ev.timestamp, "2025-03-04T05:06:07.000Z");
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["previewUrl"], "https://p/42");
        assert_eq!(v["userName"], "Guest");
        assert!(v["userEmail"].is_null());
    }

    #[test]
    fn test_generate_client_id_shape() {
        let id = generate_client_id(1700000000000);
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts[0], "guest");
        assert_eq!(parts[1], "1700000000000");
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_sink_url() {
        let sink = RtdbSink::new("https://db.example/").unwrap();
        let guest = Identity::Guest { client_id: "guest_1_x".into() };
        assert_eq!(sink.event_url(&guest), "https://db.example/songLog/guests/guest_1_x.json");
    }

    #[test]
    fn test_disabled_without_database_url() {
        assert!(PlayLogger::from_config(&PlayLogConfig::default()).is_none());
    }
}
