// Audio output through rodio
// Implements the playback engine seam; the session never touches rodio directly

pub mod player;

pub use player::{RodioEngine, RodioResource};

/// How often a loaded resource checks whether its sink ran dry.
pub const END_POLL_INTERVAL_MS: u64 = 250;
