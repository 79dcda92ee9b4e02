// Playback session - the one live track, its lifecycle and navigation
// The engine behind it is pluggable; see audio/ for the rodio one

pub mod debounce;    // first-wins gate for user transitions
pub mod driver;      // session task, command handle
pub mod engine;      // resource/engine seams
pub mod events;      // status, snapshots, events for views
pub mod navigation;  // next/previous over mixed lists
pub mod progress;    // elapsed/total and time labels
pub mod session;     // the state machine

#[cfg(test)]
pub(crate) mod testing;

pub use driver::{spawn_session, SessionCommand, SessionHandle};
pub use engine::{EngineError, PlaybackEngine, PlaybackResource, ResourceObserver};
pub use events::{PlaybackStatus, SessionEvent, SessionSnapshot};
pub use navigation::{resolve_adjacent_track, Direction};
pub use progress::{format_time, Progress};
pub use session::{NavigationOutcome, PlaybackError, PlaybackSession, SeekOutcome};
