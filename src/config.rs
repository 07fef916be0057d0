//! Application configuration
//!
//! Stored as TOML in the platform config directory. Missing files and
//! missing keys fall back to defaults.

use directories::{ProjectDirs, UserDirs};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_PLAYBACK_RATE, DEFAULT_VOLUME, MAX_PLAYBACK_RATE, MAX_VOLUME, MIN_PLAYBACK_RATE,
    MIN_VOLUME,
};
use crate::error::{Error, Result};

const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub playback: PlaybackConfig,
    pub export: ExportConfig,
}

/// Output device selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Device name as reported by the host; default device when unset
    pub output_device: Option<String>,
    /// Fixed buffer size in frames; host default when unset
    pub buffer_size: Option<u32>,
}

/// Initial transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub volume: f32,
    pub playback_rate: f32,
    /// Start playing as soon as a new summary has been generated
    pub auto_play: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            playback_rate: DEFAULT_PLAYBACK_RATE,
            auto_play: true,
        }
    }
}

impl PlaybackConfig {
    /// Copy with volume and rate forced into their valid ranges
    pub fn clamped(&self) -> Self {
        Self {
            volume: self.volume.clamp(MIN_VOLUME, MAX_VOLUME),
            playback_rate: self.playback_rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE),
            auto_play: self.auto_play,
        }
    }
}

/// Where downloaded WAV files go
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub output_dir: Option<PathBuf>,
}

impl ExportConfig {
    /// Configured directory, else the user's download directory, else the
    /// current directory
    pub fn resolve_output_dir(&self) -> PathBuf {
        if let Some(dir) = &self.output_dir {
            return dir.clone();
        }
        UserDirs::new()
            .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl AppConfig {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "spoken-summary").map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }
}
