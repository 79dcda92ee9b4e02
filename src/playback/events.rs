// What the session tells the outside world. Views subscribe to these
// instead of reaching into the session or its resource.

use super::progress::Progress;
use crate::library::{CategoryFilter, Track, TrackId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackStatus {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Ended,
    Failed,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackStatus::Idle => "idle",
            PlaybackStatus::Loading => "loading",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Ended => "ended",
            PlaybackStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Read-only view of the session, published after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub status: PlaybackStatus,
    pub track: Option<Track>,
    pub progress: Progress,
    pub category: CategoryFilter,
}

impl SessionSnapshot {
    pub fn track_id(&self) -> Option<&TrackId> {
        self.track.as_ref().map(|t| &t.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SessionEvent {
    StatusChanged {
        status: PlaybackStatus,
        track_id: Option<TrackId>,
    },
    TrackStarted {
        track: Track,
        timestamp: DateTime<Utc>,
    },
    Progress {
        track_id: TrackId,
        progress: Progress,
    },
    TrackEnded {
        track_id: TrackId,
        timestamp: DateTime<Utc>,
    },
    /// Resolution or decode failure. The session is already back to idle.
    Failed {
        track_id: Option<TrackId>,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// Next/previous had no list to work with; the current track restarted.
    Restarted {
        track_id: TrackId,
    },
    CategoryChanged(CategoryFilter),
}
