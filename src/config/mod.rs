// Configuration management for glowplay
// Handles loading/saving settings, with sensible defaults when config is missing

use crate::library::CategoryFilter;
use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub library: LibraryConfig,
    pub playback: PlaybackSettings,
    pub audio: AudioSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// JSON list of external (uploaded) tracks
    pub external_list: PathBuf,
    /// Skip the REST API and play from the external list only
    pub offline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    pub progress_interval_ms: u64,
    pub release_grace_ms: u64,
    pub debounce_ms: u64,
    pub skip_seconds: u64,
    pub default_category: CategoryFilter,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub volume: f32, // 0.0 to 1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub filter: String,
}

fn app_dir() -> PathBuf {
    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glowplay")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            library: LibraryConfig::default(),
            playback: PlaybackSettings::default(),
            audio: AudioSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            external_list: app_dir().join("external-music-list.json"),
            offline: false,
        }
    }
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            progress_interval_ms: 500,
            release_grace_ms: 100,
            debounce_ms: 300,
            skip_seconds: 10,
            default_category: CategoryFilter::All,
        }
    }
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self { volume: 0.8 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: app_dir().join("logs"),
            filter: "info,glowplay=debug".to_string(),
        }
    }
}

impl PlaybackSettings {
    /// Progress polling period, kept within 0.5-1s.
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms.clamp(500, 1000))
    }

    pub fn release_grace(&self) -> Duration {
        Duration::from_millis(self.release_grace_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn skip_step(&self) -> f64 {
        self.skip_seconds as f64
    }
}

impl Config {
    /// Load from the default location, writing defaults on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.audio.volume) {
            anyhow::bail!("audio.volume must be between 0.0 and 1.0");
        }
        if self.api.base_url.trim().is_empty() {
            anyhow::bail!("api.base_url must not be empty");
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("glowplay");

        Ok(config_dir.join("config.toml"))
    }
}
