//! Centralized configuration for Castloop.
//!
//! File locations, process timing and server binding live here so that the
//! supervisor and the HTTP layer never hard-code them.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Central configuration for all Castloop components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct CastloopConfig {
    pub paths: PathsConfig,
    pub supervisor: SupervisorConfig,
    pub server: ServerConfig,
}

/// On-disk locations of the video directory and the JSON state files.
#[derive(Debug, Clone)]
pub struct PathsConfig {
    /// Directory holding the uploaded video files
    pub videos_dir: PathBuf,
    /// Persisted play queue
    pub queue_file: PathBuf,
    /// Persisted RTMP settings
    pub settings_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            videos_dir: PathBuf::from("videos"),
            queue_file: PathBuf::from("queue.json"),
            settings_file: PathBuf::from("settings.json"),
        }
    }
}

/// Stream process supervision parameters.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Transcoder executable, resolved through `PATH` when relative
    pub ffmpeg_path: PathBuf,
    /// How long a terminated process may take to exit before it is killed
    pub grace_period: Duration,
    /// Pause after a failed video before the next queue item is tried
    pub failure_pause: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            grace_period: Duration::from_secs(5),
            failure_pause: Duration::from_secs(1),
        }
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl CastloopConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Values that fail to parse are ignored and the default is kept.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("CASTLOOP_VIDEOS_DIR") {
            config.paths.videos_dir = PathBuf::from(dir);
        }

        if let Ok(file) = std::env::var("CASTLOOP_QUEUE_FILE") {
            config.paths.queue_file = PathBuf::from(file);
        }

        if let Ok(file) = std::env::var("CASTLOOP_SETTINGS_FILE") {
            config.paths.settings_file = PathBuf::from(file);
        }

        if let Ok(binary) = std::env::var("CASTLOOP_FFMPEG") {
            config.supervisor.ffmpeg_path = PathBuf::from(binary);
        }

        if let Ok(grace) = std::env::var("CASTLOOP_GRACE_SECS")
            && let Ok(seconds) = grace.parse::<u64>()
        {
            config.supervisor.grace_period = Duration::from_secs(seconds);
        }

        if let Ok(pause) = std::env::var("CASTLOOP_FAILURE_PAUSE_MS")
            && let Ok(millis) = pause.parse::<u64>()
        {
            config.supervisor.failure_pause = Duration::from_millis(millis);
        }

        if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.parse::<u16>()
        {
            config.server.port = port;
        }

        config
    }

    /// Creates a configuration rooted in `root` with short timings for tests.
    pub fn for_testing(root: &Path) -> Self {
        Self {
            paths: PathsConfig {
                videos_dir: root.join("videos"),
                queue_file: root.join("queue.json"),
                settings_file: root.join("settings.json"),
            },
            supervisor: SupervisorConfig {
                grace_period: Duration::from_millis(500),
                failure_pause: Duration::from_millis(20),
                ..SupervisorConfig::default()
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
            },
        }
    }
}
