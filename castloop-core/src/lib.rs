//! Castloop Core - unattended queue-driven RTMP streaming
//!
//! Plays a persisted queue of video files, one after another, to a single
//! RTMP endpoint by supervising an external transcoder process. Provides the
//! queue store, process supervision, the streaming run loop, status
//! reporting and the collaborators they rely on.

pub mod config;
pub mod library;
pub mod queue;
pub mod settings;
pub mod streaming;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::CastloopConfig;
pub use library::{LibraryError, LocalVideoLibrary, VideoLibrary};
pub use queue::{JsonQueueFile, PersistenceError, QueueStore};
pub use settings::{JsonSettingsStore, SettingsError, StreamSettings};
pub use streaming::{ProcessError, StreamError, StreamStatus, StreamSupervisor};

/// Core errors that can bubble up from any Castloop subsystem.
#[derive(Debug, thiserror::Error)]
pub enum CastloopError {
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Library error: {0}")]
    Library(#[from] LibraryError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CastloopError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            CastloopError::Stream(e) => match e {
                StreamError::AlreadyActive => "Stream is already active".to_string(),
                StreamError::EmptyQueue => {
                    "Queue is empty. Add videos to queue first.".to_string()
                }
                StreamError::NotActive => "No active stream".to_string(),
                StreamError::NotFound { .. } => "Video not found".to_string(),
                StreamError::InUse { .. } => {
                    "Cannot delete video that is currently streaming".to_string()
                }
            },
            CastloopError::Library(e) => match e {
                LibraryError::NotFound { .. } => "Video not found".to_string(),
                LibraryError::UnsupportedFormat { .. } => {
                    "Invalid file type. Only MP4, MKV, AVI, and MOV are supported.".to_string()
                }
                LibraryError::InvalidName { .. } => "Invalid file name".to_string(),
                LibraryError::UploadInterrupted { .. } => "Upload was interrupted".to_string(),
                LibraryError::Io(_) => "Video storage error occurred".to_string(),
            },
            CastloopError::Settings(e) => format!("Failed to save settings: {e}"),
            CastloopError::Io(_) => "File system error occurred".to_string(),
        }
    }

    /// Checks if this error was caused by the request rather than the system.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            CastloopError::Stream(_)
                | CastloopError::Library(
                    LibraryError::NotFound { .. }
                        | LibraryError::UnsupportedFormat { .. }
                        | LibraryError::InvalidName { .. }
                        | LibraryError::UploadInterrupted { .. }
                )
        )
    }
}

pub type Result<T> = std::result::Result<T, CastloopError>;
