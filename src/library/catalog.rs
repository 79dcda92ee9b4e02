use super::source::{ResolveError, ResolvedSource, TrackListProvider, TrackResolver};
use super::track::{AudioSource, Track, TrackId, TrackMetadata};
use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;
use tracing::{debug, warn};

/// In-memory catalog. Serves direct sources and metadata for the tracks it
/// holds; used for offline play of the external list and as a test double.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    tracks: Vec<Track>,
}

impl StaticCatalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: &TrackId) -> Option<&Track> {
        self.tracks.iter().find(|track| &track.id == id)
    }
}

impl TrackResolver for StaticCatalog {
    fn resolve_audio_source<'a>(
        &'a self,
        id: &'a TrackId,
    ) -> BoxFuture<'a, Result<ResolvedSource, ResolveError>> {
        async move {
            let track = self.get(id).ok_or_else(|| ResolveError::NotFound(id.clone()))?;
            match &track.audio {
                AudioSource::Direct(source) => ResolvedSource::from_direct(source),
                AudioSource::Deferred => Err(ResolveError::NoAudio(id.clone())),
            }
        }
        .boxed()
    }

    fn resolve_metadata<'a>(
        &'a self,
        id: &'a TrackId,
    ) -> BoxFuture<'a, Result<TrackMetadata, ResolveError>> {
        async move {
            let track = self.get(id).ok_or_else(|| ResolveError::NotFound(id.clone()))?;
            Ok(TrackMetadata {
                title: track.title.clone(),
                artist: track.artist.clone(),
                genre: track.genre.clone(),
                image: track.image.clone(),
            })
        }
        .boxed()
    }
}

impl TrackListProvider for StaticCatalog {
    fn track_list(&self) -> BoxFuture<'_, Result<Vec<Track>, ResolveError>> {
        let tracks = self.tracks.clone();
        async move { Ok(tracks) }.boxed()
    }
}

/// Library list first, external list after. A failing library source still
/// yields the external part, so browsing survives an API outage.
pub struct MergedCatalog {
    library: Arc<dyn TrackListProvider>,
    external: Vec<Track>,
}

impl MergedCatalog {
    pub fn new(library: Arc<dyn TrackListProvider>, external: Vec<Track>) -> Self {
        Self { library, external }
    }
}

impl TrackListProvider for MergedCatalog {
    fn track_list(&self) -> BoxFuture<'_, Result<Vec<Track>, ResolveError>> {
        async move {
            let mut combined = match self.library.track_list().await {
                Ok(tracks) => tracks,
                Err(e) if !self.external.is_empty() => {
                    warn!("Library list unavailable, using external tracks only: {}", e);
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            let library_count = combined.len();
            combined.extend(self.external.iter().cloned());
            debug!(
                "Combined track list: {} items ({} library, {} external)",
                combined.len(),
                library_count,
                self.external.len()
            );
            Ok(combined)
        }
        .boxed()
    }
}
