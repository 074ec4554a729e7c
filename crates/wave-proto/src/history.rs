//! Listening history: a capped, deduplicated, most-recent-first log of
//! played tracks, persisted behind a small store interface.
//!
//! The persisted record carries its own expiry.  Every write pushes the
//! expiry forward by the retention window; a record read after it has expired
//! is treated exactly like a missing one.  Missing, expired and corrupt
//! records all load as an empty history.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::HistoryConfig;
use crate::error::StoreError;
use crate::track::TrackRef;

/// One played track plus the time it started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    track: TrackRef,
    #[serde(rename = "playedAt")]
    played_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(track: TrackRef, played_at: DateTime<Utc>) -> Self {
        Self { track, played_at }
    }

    pub fn track(&self) -> &TrackRef {
        &self.track
    }

    pub fn id(&self) -> &str {
        self.track.id()
    }

    pub fn played_at(&self) -> DateTime<Utc> {
        self.played_at
    }
}

// ── store interface ──────────────────────────────────────────────────────────

/// Backing storage for the history record.
///
/// `load` returns an empty list for a missing or expired record and
/// `StoreError::Corrupt` when the record cannot be decoded.
pub trait HistoryStore: Send + Sync {
    fn load(&self) -> Result<Vec<HistoryEntry>, StoreError>;
    fn save(&self, entries: &[HistoryEntry], ttl: Duration) -> Result<(), StoreError>;
}

/// On-disk envelope: the entries plus the instant after which they lapse.
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    expires_at: DateTime<Utc>,
    entries: Vec<HistoryEntry>,
}

fn encode(entries: &[HistoryEntry], ttl: Duration) -> Result<String, StoreError> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
    let now = Utc::now();
    let record = Record {
        expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        entries: entries.to_vec(),
    };
    serde_json::to_string(&record).map_err(|e| StoreError::Encode(e.to_string()))
}

fn decode(raw: &str) -> Result<Vec<HistoryEntry>, StoreError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    let record: Record =
        serde_json::from_str(raw).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    if record.expires_at <= Utc::now() {
        debug!("history record expired at {}", record.expires_at);
        return Ok(Vec::new());
    }
    Ok(record.entries)
}

/// JSON file store.  Writes go to a sibling temp file and are renamed into
/// place so a crash never leaves a half-written record.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistoryStore for FileStore {
    fn load(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => decode(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn save(&self, entries: &[HistoryEntry], ttl: Duration) -> Result<(), StoreError> {
        let content = encode(entries, ttl)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-process store holding the encoded record.  Used in tests and anywhere
/// persistence across runs is not wanted.
#[derive(Default)]
pub struct MemoryStore {
    raw: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with an arbitrary encoded record.
    pub fn with_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Mutex::new(Some(raw.into())),
        }
    }
}

impl HistoryStore for MemoryStore {
    fn load(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        let raw = self.raw.lock().unwrap_or_else(|p| p.into_inner());
        match raw.as_deref() {
            Some(raw) => decode(raw),
            None => Ok(Vec::new()),
        }
    }

    fn save(&self, entries: &[HistoryEntry], ttl: Duration) -> Result<(), StoreError> {
        let content = encode(entries, ttl)?;
        *self.raw.lock().unwrap_or_else(|p| p.into_inner()) = Some(content);
        Ok(())
    }
}

// ── history log ──────────────────────────────────────────────────────────────

/// The listening history.  All methods are infallible: storage problems are
/// logged and degrade to an empty (or unsaved) history, never to an error.
pub struct HistoryLog {
    store: Box<dyn HistoryStore>,
    max_entries: usize,
    retention: Duration,
    /// Serialises read-modify-write cycles between tasks sharing the log.
    write_lock: Mutex<()>,
}

impl HistoryLog {
    pub fn new(store: impl HistoryStore + 'static, max_entries: usize, retention: Duration) -> Self {
        Self {
            store: Box::new(store),
            max_entries,
            retention,
            write_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &HistoryConfig) -> Self {
        Self::new(
            FileStore::new(config.file.clone()),
            config.max_entries,
            config.retention(),
        )
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Entries, most recent first.
    pub fn list(&self) -> Vec<HistoryEntry> {
        match self.store.load() {
            Ok(entries) => entries,
            Err(e) => {
                warn!("history: unreadable record, starting empty: {}", e);
                Vec::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record a play that started now.
    pub fn record(&self, track: &TrackRef) {
        self.record_at(track, Utc::now());
    }

    /// Move `track` to the top of the history with the given play time.
    pub fn record_at(&self, track: &TrackRef, played_at: DateTime<Utc>) {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut entries = self.list();
        entries.retain(|e| e.id() != track.id());
        entries.insert(0, HistoryEntry::new(track.clone(), played_at));
        self.persist(entries);
    }

    pub fn remove(&self, id: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        let mut entries = self.list();
        entries.retain(|e| e.id() != id);
        self.persist(entries);
    }

    pub fn clear(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        self.persist(Vec::new());
    }

    fn persist(&self, mut entries: Vec<HistoryEntry>) {
        entries.truncate(self.max_entries);
        if let Err(e) = self.store.save(&entries, self.retention) {
            warn!("history: failed to persist {} entries: {}", entries.len(), e);
        }
    }
}
