// Track catalog - ids, sources, and the services that resolve them
// Two provenances feed it: the REST library and the external content store

pub mod artwork;   // cover art URL cleanup
pub mod catalog;   // in-memory and merged track lists
pub mod external;  // external (uploaded) track list on disk
pub mod filename;  // titles from file names
#[cfg(feature = "remote")]
pub mod remote;    // REST API client
pub mod search;    // title/artist/genre search
pub mod source;    // resolver seams, resolved sources
pub mod track;     // track model, provenance, category filter

pub use catalog::{MergedCatalog, StaticCatalog};
pub use source::{ResolveError, ResolvedSource, TrackListProvider, TrackResolver};
pub use track::{AudioSource, CategoryFilter, Provenance, Track, TrackId, TrackMetadata};
