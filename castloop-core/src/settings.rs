//! RTMP endpoint settings and their JSON file store.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Errors raised while persisting settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Settings I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Settings serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Target endpoint and encoding parameters for a streaming session.
///
/// A session takes one snapshot at start and never reloads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSettings {
    pub rtmp_url: String,
    pub stream_key: String,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    /// Video bitrate in kbps
    #[serde(default = "default_bitrate")]
    pub bitrate: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_resolution() -> String {
    "1920x1080".to_string()
}

fn default_bitrate() -> u32 {
    2500
}

fn default_fps() -> u32 {
    30
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            rtmp_url: "rtmp://example.com/live".to_string(),
            stream_key: "your_stream_key".to_string(),
            resolution: default_resolution(),
            bitrate: default_bitrate(),
            fps: default_fps(),
        }
    }
}

impl StreamSettings {
    /// Full publish address: the base URL with the stream key as last segment.
    pub fn destination(&self) -> String {
        format!(
            "{}/{}",
            self.rtmp_url.trim_end_matches('/'),
            self.stream_key.trim_start_matches('/')
        )
    }
}

/// Source of the settings snapshot taken when a session starts.
pub trait SettingsProvider: Send + Sync {
    fn current(&self) -> StreamSettings;
}

/// Settings persisted as pretty-printed JSON.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored settings.
    ///
    /// A missing file is seeded with defaults. An unreadable or malformed
    /// file is logged and defaults are returned without touching it.
    pub fn load(&self) -> StreamSettings {
        if !self.path.exists() {
            let defaults = StreamSettings::default();
            match self.save(&defaults) {
                Ok(()) => info!("Wrote default settings to {}", self.path.display()),
                Err(e) => warn!("Failed to write default settings: {}", e),
            }
            return defaults;
        }

        let parsed = std::fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                serde_json::from_str::<StreamSettings>(&raw).map_err(|e| e.to_string())
            });

        match parsed {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Error loading settings from {}: {}", self.path.display(), e);
                StreamSettings::default()
            }
        }
    }

    /// Persists `settings`, replacing the previous file.
    ///
    /// # Errors
    /// - `SettingsError::Json` - Settings could not be serialized
    /// - `SettingsError::Io` - File could not be written
    pub fn save(&self, settings: &StreamSettings) -> Result<(), SettingsError> {
        let body = serde_json::to_string_pretty(settings)?;
        std::fs::write(&self.path, body).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl SettingsProvider for JsonSettingsStore {
    fn current(&self) -> StreamSettings {
        self.load()
    }
}
