use serde::{Deserialize, Serialize};

use crate::track::TrackRef;

/// Requests sent from the UI to the player core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum Command {
    /// Play `track`, or toggle pause when it is already loaded.
    Select { track: TrackRef },
    /// Play/pause button on the playback bar.
    TogglePause,
    /// Jump to `fraction` of the track (clamped to 0..=1).
    Seek { fraction: f64 },
    /// Stop and dismiss the playback bar.
    Close,
}

/// Coarse player state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum PlayerState {
    #[default]
    Idle,
    Playing,
    Paused,
}

/// Playback position report.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Progress {
    pub position_secs: f64,
    pub duration_secs: Option<f64>,
}

impl Progress {
    /// Completed share of the track, 0.0 while the duration is unknown.
    pub fn fraction(&self) -> f64 {
        match self.duration_secs {
            Some(d) if d > 0.0 => (self.position_secs / d).clamp(0.0, 1.0),
            _ => 0.0,
        }
    }

    /// `M:SS` elapsed label.
    pub fn label(&self) -> String {
        crate::format::clock(self.position_secs)
    }
}

/// Snapshot of the playback bar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NowPlaying {
    pub track: Option<TrackRef>,
    pub state: PlayerState,
    pub progress: Progress,
    /// The track reached its natural end.
    #[serde(default)]
    pub ended: bool,
}

/// Notifications from the player core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "broadcast")]
pub enum Broadcast {
    /// A new track started; the history now has it on top.
    Started { track: TrackRef },
    /// Player state changed (pause, resume, end, close).
    State { data: NowPlaying },
    Progress { data: Progress },
    /// Natural end of the current track.
    Ended { track_id: String },
    /// A command failed; the message is user-facing.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_tagging() {
        let cmd = Command::Select {
            track: TrackRef::new("1", "t", "a", "", Some("https://p".into())),
        };
        let v = serde_json::to_value(&cmd).unwrap();
        assert_eq!(v["cmd"], "Select");
        assert_eq!(v["track"]["id"], "1");

        let back: Command = serde_json::from_str(r#"{"cmd":"Seek","fraction":0.5}"#).unwrap();
        assert!(matches!(back, Command::Seek { fraction } if fraction == 0.5));
    }

    #[test]
    fn test_progress_fraction() {
        let p = Progress {
            position_secs: 15.0,
            duration_secs: Some(30.0),
        };
        assert_eq!(p.fraction(), 0.5);
        assert_eq!(p.label(), "0:15");

        let unknown = Progress {
            position_secs: 3.0,
            duration_secs: None,
        };
        assert_eq!(unknown.fraction(), 0.0);
    }
}
