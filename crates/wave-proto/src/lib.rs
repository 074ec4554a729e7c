//! Shared model, catalog client, history log and playback controller for
//! the soundwave music discovery client.

pub mod catalog;
pub mod config;
pub mod debounce;
pub mod discover;
pub mod error;
pub mod format;
pub mod history;
pub mod platform;
pub mod playback;
pub mod playlog;
pub mod protocol;
pub mod track;
