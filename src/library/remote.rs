// REST catalog client. Talks to the music endpoints of the backend API;
// everything else the API offers (auth, favorites, playlists) is not ours.

use super::artwork::normalize_image_url;
use super::source::{ResolveError, ResolvedSource, TrackListProvider, TrackResolver};
use super::track::{AudioSource, Track, TrackId, TrackMetadata};
use crate::config::ApiConfig;
use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

/// Music record as returned by the API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicDto {
    pub music_id: i64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub time: Option<i64>,
    pub audio_url: Option<String>,
    pub image_url: Option<String>,
}

impl MusicDto {
    pub fn into_track(self, position: usize) -> Track {
        let audio = match self.audio_url {
            Some(url) if !url.trim().is_empty() => AudioSource::Direct(url),
            _ => AudioSource::Deferred,
        };
        Track {
            id: TrackId::new(self.music_id.to_string()),
            title: self.title,
            artist: self.artist,
            genre: self.genre,
            audio,
            image: normalize_image_url(self.image_url.as_deref()),
            display_index: Some(position),
            favorite: false,
        }
    }
}

pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(network)?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn fetch_music(&self, id: &TrackId) -> Result<MusicDto, ResolveError> {
        let url = self.url(&format!("/api/music/getMusic/{}?includeAudioData=false", id));
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await.map_err(network)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ResolveError::NotFound(id.clone()));
        }
        let response = response.error_for_status().map_err(network)?;
        response.json::<MusicDto>().await.map_err(network)
    }

    async fn fetch_audio_payload(&self, id: &TrackId) -> Result<ResolvedSource, ResolveError> {
        let url = self.url(&format!("/api/music/audio/{}", id));
        debug!("GET {}", url);
        let response = self.client.get(&url).send().await.map_err(network)?;
        if !response.status().is_success() {
            return Err(ResolveError::NoAudio(id.clone()));
        }
        let body = response.text().await.map_err(network)?;
        ResolvedSource::from_base64(id, &body)
    }
}

fn network(e: reqwest::Error) -> ResolveError {
    ResolveError::Network(e.to_string())
}

impl TrackResolver for ApiClient {
    fn resolve_audio_source<'a>(
        &'a self,
        id: &'a TrackId,
    ) -> BoxFuture<'a, Result<ResolvedSource, ResolveError>> {
        async move {
            let music = self.fetch_music(id).await?;
            match music.audio_url.as_deref().map(str::trim) {
                Some(url) if !url.is_empty() => {
                    info!("Using external URL for track {}", id);
                    ResolvedSource::from_direct(url)
                }
                _ => self.fetch_audio_payload(id).await,
            }
        }
        .boxed()
    }

    fn resolve_metadata<'a>(
        &'a self,
        id: &'a TrackId,
    ) -> BoxFuture<'a, Result<TrackMetadata, ResolveError>> {
        async move {
            let music = self.fetch_music(id).await?;
            Ok(TrackMetadata {
                title: music.title,
                artist: music.artist,
                genre: music.genre,
                image: normalize_image_url(music.image_url.as_deref()),
            })
        }
        .boxed()
    }
}

impl TrackListProvider for ApiClient {
    fn track_list(&self) -> BoxFuture<'_, Result<Vec<Track>, ResolveError>> {
        async move {
            let url = self.url("/api/music/getAllMusic");
            debug!("GET {}", url);
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(network)?;
            let music: Vec<MusicDto> = response.json().await.map_err(network)?;
            Ok(music
                .into_iter()
                .enumerate()
                .map(|(position, dto)| dto.into_track(position))
                .collect())
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_music_dto_conversion() {
        let json = r#"{"musicId": 12, "title": "Glow", "artist": "Astro", "genre": "pop",
                       "time": 215, "playlistIds": [1], "imageUrl": "cdn/glow.jpg"}"#;
        let dto: MusicDto = serde_json::from_str(json).unwrap();
        let track = dto.into_track(4);

        assert_eq!(track.id.as_str(), "12");
        assert_eq!(track.audio, AudioSource::Deferred);
        assert_eq!(track.display_index, Some(4));
        assert_eq!(track.image.as_deref(), Some("https://cdn/glow.jpg"));
    }

    #[test]
    fn test_music_dto_with_audio_url() {
        let json = r#"{"musicId": 3, "audioUrl": "https://store/3.mp3"}"#;
        let dto: MusicDto = serde_json::from_str(json).unwrap();
        assert_eq!(
            dto.into_track(0).audio,
            AudioSource::Direct("https://store/3.mp3".into())
        );
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = ApiClient::new(&ApiConfig {
            base_url: "http://localhost:8080/".into(),
            timeout_secs: 5,
        })
        .unwrap();
        assert_eq!(client.url("/api/x"), "http://localhost:8080/api/x");
    }
}
