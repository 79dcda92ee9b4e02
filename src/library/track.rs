use serde::{Deserialize, Serialize};
use std::fmt;

/// Ids in the external (content-store) namespace carry this prefix.
pub const EXTERNAL_PREFIX: &str = "external-";

/// Opaque track identifier. Library ids are backend keys, external ids are
/// `external-<filename>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackId(String);

impl TrackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build an external id from a bare file name, keeping ids that are
    /// already prefixed untouched.
    pub fn external(name: &str) -> Self {
        if name.starts_with(EXTERNAL_PREFIX) {
            Self(name.to_string())
        } else {
            Self(format!("{EXTERNAL_PREFIX}{name}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn provenance(&self) -> Provenance {
        Provenance::of(&self.0)
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TrackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Which backing store a track id comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    Library,
    External,
}

impl Provenance {
    /// Prefix test on the trimmed id. Everything that is not external is library.
    pub fn of(id: &str) -> Self {
        if id.trim().starts_with(EXTERNAL_PREFIX) {
            Provenance::External
        } else {
            Provenance::Library
        }
    }
}

/// Scopes which part of a track list takes part in next/previous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryFilter {
    #[default]
    All,
    Library,
    External,
    Favorites,
}

impl CategoryFilter {
    pub fn admits(&self, track: &Track, provenance: Provenance) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Library => provenance == Provenance::Library,
            CategoryFilter::External => provenance == Provenance::External,
            CategoryFilter::Favorites => track.favorite,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "all" => Some(CategoryFilter::All),
            "library" | "lib" => Some(CategoryFilter::Library),
            "external" | "ext" => Some(CategoryFilter::External),
            "favorites" | "favourites" | "fav" => Some(CategoryFilter::Favorites),
            _ => None,
        }
    }
}

impl From<Provenance> for CategoryFilter {
    fn from(provenance: Provenance) -> Self {
        match provenance {
            Provenance::Library => CategoryFilter::Library,
            Provenance::External => CategoryFilter::External,
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CategoryFilter::All => "all",
            CategoryFilter::Library => "library",
            CategoryFilter::External => "external",
            CategoryFilter::Favorites => "favorites",
        };
        f.write_str(name)
    }
}

/// Where the audio for a track comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioSource {
    /// A playable URL, local path or `data:` URI.
    Direct(String),
    /// Ask the resolver for it by id when playback starts.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: TrackId,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub audio: AudioSource,
    pub image: Option<String>,
    pub display_index: Option<usize>,
    pub favorite: bool,
}

impl Track {
    /// A bare reference by id; audio and metadata get resolved on play.
    pub fn from_id(id: impl Into<TrackId>) -> Self {
        Self {
            id: id.into(),
            title: None,
            artist: None,
            genre: None,
            audio: AudioSource::Deferred,
            image: None,
            display_index: None,
            favorite: false,
        }
    }

    pub fn with_source(mut self, url: impl Into<String>) -> Self {
        self.audio = AudioSource::Direct(url.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_display_index(mut self, index: usize) -> Self {
        self.display_index = Some(index);
        self
    }

    pub fn favorited(mut self) -> Self {
        self.favorite = true;
        self
    }

    pub fn provenance(&self) -> Provenance {
        self.id.provenance()
    }

    /// Fill display fields the track is missing from resolved metadata.
    pub fn merge_metadata(&mut self, metadata: TrackMetadata) {
        if self.title.is_none() {
            self.title = metadata.title;
        }
        if self.artist.is_none() {
            self.artist = metadata.artist;
        }
        if self.genre.is_none() {
            self.genre = metadata.genre;
        }
        if self.image.is_none() {
            self.image = metadata.image;
        }
    }

    /// "Title - Artist" for status lines, falling back to the id.
    pub fn display_name(&self) -> String {
        match (&self.title, &self.artist) {
            (Some(title), Some(artist)) => format!("{} - {}", title, artist),
            (Some(title), None) => title.clone(),
            _ => self.id.to_string(),
        }
    }
}

/// Display metadata the resolver can supply for an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub image: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_by_prefix() {
        assert_eq!(Provenance::of("42"), Provenance::Library);
        assert_eq!(Provenance::of("external-song.mp3"), Provenance::External);
        assert_eq!(Provenance::of("  external-song.mp3"), Provenance::External);
        assert_eq!(Provenance::of("my-external-song"), Provenance::Library);
    }

    #[test]
    fn test_external_id_is_not_double_prefixed() {
        assert_eq!(TrackId::external("a.mp3").as_str(), "external-a.mp3");
        assert_eq!(TrackId::external("external-a.mp3").as_str(), "external-a.mp3");
    }

    #[test]
    fn test_category_admits() {
        let lib = Track::from_id("7");
        let fav = Track::from_id("external-x.mp3").favorited();

        assert!(CategoryFilter::All.admits(&lib, lib.provenance()));
        assert!(CategoryFilter::Library.admits(&lib, lib.provenance()));
        assert!(!CategoryFilter::External.admits(&lib, lib.provenance()));
        assert!(CategoryFilter::External.admits(&fav, fav.provenance()));
        assert!(CategoryFilter::Favorites.admits(&fav, fav.provenance()));
        assert!(!CategoryFilter::Favorites.admits(&lib, lib.provenance()));
    }

    #[test]
    fn test_merge_metadata_keeps_existing_fields() {
        let mut track = Track::from_id("1").with_title("Kept");
        track.merge_metadata(TrackMetadata {
            title: Some("Ignored".into()),
            artist: Some("Filled".into()),
            genre: None,
            image: Some("https://img".into()),
        });

        assert_eq!(track.title.as_deref(), Some("Kept"));
        assert_eq!(track.artist.as_deref(), Some("Filled"));
        assert_eq!(track.image.as_deref(), Some("https://img"));
        assert_eq!(track.display_name(), "Kept - Filled");
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(CategoryFilter::parse("Library"), Some(CategoryFilter::Library));
        assert_eq!(CategoryFilter::parse("fav"), Some(CategoryFilter::Favorites));
        assert_eq!(CategoryFilter::parse("nope"), None);
    }
}
