// Audio source resolution - the seam between the session and whatever
// serves audio (REST API, content store, local files)

use super::track::{AudioSource, Track, TrackId, TrackMetadata};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("track {0} not found")]
    NotFound(TrackId),

    #[error("no audio data available for track {0}")]
    NoAudio(TrackId),

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid audio source: {0}")]
    InvalidSource(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A source the engine can open directly.
#[derive(Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// http(s) URL or local path.
    Url(String),
    /// Decoded audio bytes (base64 payloads, data URIs).
    Inline(Arc<[u8]>),
}

impl ResolvedSource {
    /// Turn a direct source string into something playable. `data:` URIs are
    /// decoded here so engines only ever see URLs or bytes.
    pub fn from_direct(source: &str) -> Result<Self, ResolveError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(ResolveError::InvalidSource("empty source".to_string()));
        }
        if source.starts_with("data:") {
            let (_, bytes) = parse_data_uri(source)
                .ok_or_else(|| ResolveError::InvalidSource("malformed data URI".to_string()))?;
            return Ok(ResolvedSource::Inline(bytes.into()));
        }
        Ok(ResolvedSource::Url(source.to_string()))
    }

    /// Decode a base64 payload as served by the audio endpoint. Empty bodies
    /// and the literal `null` mean the track has no audio.
    pub fn from_base64(id: &TrackId, payload: &str) -> Result<Self, ResolveError> {
        let payload = payload.trim();
        if payload.is_empty() || payload == "null" {
            return Err(ResolveError::NoAudio(id.clone()));
        }
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| ResolveError::InvalidSource(format!("bad base64 audio: {}", e)))?;
        if bytes.is_empty() {
            return Err(ResolveError::NoAudio(id.clone()));
        }
        Ok(ResolvedSource::Inline(bytes.into()))
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ResolvedSource::Url(url) if url.starts_with("http://") || url.starts_with("https://"))
    }
}

impl fmt::Debug for ResolvedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedSource::Url(url) => f.debug_tuple("Url").field(url).finish(),
            ResolvedSource::Inline(bytes) => write!(f, "Inline({} bytes)", bytes.len()),
        }
    }
}

/// Split a `data:<mime>;base64,<payload>` URI into mime type and bytes.
pub fn parse_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime = header.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    Some((mime.to_string(), bytes))
}

/// Resolves ids into audio and display metadata. Backed by the REST API,
/// a local catalog, or a test double.
pub trait TrackResolver: Send + Sync {
    fn resolve_audio_source<'a>(
        &'a self,
        id: &'a TrackId,
    ) -> BoxFuture<'a, Result<ResolvedSource, ResolveError>>;

    fn resolve_metadata<'a>(
        &'a self,
        id: &'a TrackId,
    ) -> BoxFuture<'a, Result<TrackMetadata, ResolveError>>;
}

/// Supplies the candidate list for next/previous. The session never caches it.
pub trait TrackListProvider: Send + Sync {
    fn track_list(&self) -> BoxFuture<'_, Result<Vec<Track>, ResolveError>>;
}

/// Resolve a track's audio: direct sources as-is, deferred ones by id.
pub async fn resolve_track_source(
    resolver: &dyn TrackResolver,
    track: &Track,
) -> Result<ResolvedSource, ResolveError> {
    match &track.audio {
        AudioSource::Direct(source) => ResolvedSource::from_direct(source),
        AudioSource::Deferred => resolver.resolve_audio_source(&track.id).await,
    }
}
