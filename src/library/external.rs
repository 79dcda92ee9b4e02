// External (content-store) track list. Uploads live outside the REST
// library, so their listing is kept as a JSON file next to the config.

use super::artwork::normalize_image_url;
use super::filename::guess_from_filename;
use super::track::{AudioSource, Track, TrackId, EXTERNAL_PREFIX};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// One entry as stored on disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExternalEntry {
    pub id: Option<String>,
    pub file_name: Option<String>,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
    pub display_index: Option<usize>,
    pub favorite: bool,
}

impl ExternalEntry {
    /// Normalize into a provenance-tagged `Track`. Entries without any id
    /// or file name cannot be addressed and are dropped.
    pub fn into_track(self) -> Option<Track> {
        let raw_id = self
            .id
            .as_deref()
            .or(self.file_name.as_deref())
            .map(str::trim)
            .filter(|id| !id.is_empty())?
            .to_string();
        let id = TrackId::external(&raw_id);

        let guessed = guess_from_filename(raw_id.trim_start_matches(EXTERNAL_PREFIX));
        let title = self.title.filter(|t| !t.trim().is_empty()).or(Some(guessed.title));
        let artist = self.artist.filter(|a| !a.trim().is_empty()).or(guessed.artist);

        let audio = match self.audio_url {
            Some(url) if !url.trim().is_empty() => AudioSource::Direct(url),
            _ => AudioSource::Deferred,
        };

        Some(Track {
            id,
            title,
            artist,
            genre: self.genre,
            audio,
            image: normalize_image_url(self.image_url.as_deref()),
            display_index: self.display_index,
            favorite: self.favorite,
        })
    }
}

/// Parse an external list from JSON text.
pub fn parse_external_list(json: &str) -> Result<Vec<Track>> {
    let entries: Vec<ExternalEntry> =
        serde_json::from_str(json).context("Failed to parse external track list")?;
    let total = entries.len();
    let tracks: Vec<Track> = entries.into_iter().filter_map(ExternalEntry::into_track).collect();
    if tracks.len() < total {
        warn!("Dropped {} external entries without an id", total - tracks.len());
    }
    Ok(tracks)
}

/// Load the external list. A missing file is an empty list, not an error.
pub fn load_external_list(path: &Path) -> Result<Vec<Track>> {
    if !path.exists() {
        info!("No external track list at {}", path.display());
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read external list {}", path.display()))?;
    let tracks = parse_external_list(&content)?;
    info!("Loaded {} external tracks from {}", tracks.len(), path.display());
    Ok(tracks)
}
