// glowplay - playback session core for a mixed library/external music catalog
// One live track at a time, pluggable audio engine, tokio-driven session task

#[cfg(feature = "audio")]
pub mod audio;     // rodio engine
pub mod cli;       // interactive command parsing
pub mod config;    // settings and preferences
pub mod library;   // tracks, resolvers, catalogs
pub mod playback;  // session, navigation, progress

// Export the stuff other modules actually use
pub use config::Config;
pub use library::{CategoryFilter, Track, TrackId};
pub use playback::{spawn_session, PlaybackSession, PlaybackStatus, SessionEvent, SessionHandle};
