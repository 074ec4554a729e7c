//! Error types shared across the crate.

use thiserror::Error;

/// Failures talking to the remote catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// The request never produced a response (DNS, refused, timeout, ...).
    #[error("catalog unreachable: {0}")]
    Transport(#[source] reqwest::Error),

    /// The catalog answered with a non-success status.
    #[error("catalog returned status {status}")]
    Remote { status: u16 },

    /// The body was not the JSON shape we expect.
    #[error("failed to decode catalog response: {0}")]
    Decode(String),

    #[error("invalid catalog url: {0}")]
    InvalidUrl(String),
}

/// Failures reading or writing the persisted history record.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("history store io: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted record exists but cannot be parsed.
    #[error("history record is corrupt: {0}")]
    Corrupt(String),

    #[error("failed to encode history: {0}")]
    Encode(String),
}

/// Failures from the playback controller.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// The track carries no preview URL.
    #[error("track {0} has no preview")]
    NotPlayable(String),

    /// The media backend rejected a command.
    #[error("media backend: {0}")]
    Backend(String),
}

impl From<anyhow::Error> for PlaybackError {
    fn from(e: anyhow::Error) -> Self {
        PlaybackError::Backend(e.to_string())
    }
}
