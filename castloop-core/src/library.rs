//! Video files available for streaming.

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Container extensions accepted for upload and listing.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov"];

/// Errors from video library operations.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Video not found: {video_id}")]
    NotFound { video_id: String },

    #[error("Unsupported video format: {file_name}")]
    UnsupportedFormat { file_name: String },

    #[error("Invalid video name: {name}")]
    InvalidName { name: String },

    #[error("Upload of {file_name} interrupted: {reason}")]
    UploadInterrupted { file_name: String, reason: String },

    #[error("Video library I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lookup of queued video identifiers on disk.
pub trait VideoLibrary: Send + Sync {
    /// Whether `video_id` refers to an existing file.
    fn exists(&self, video_id: &str) -> bool;

    /// Location of `video_id`, whether or not it currently exists.
    fn path(&self, video_id: &str) -> PathBuf;

    /// Deletes the stored file.
    ///
    /// # Errors
    /// - `LibraryError::NotFound` - No such video
    /// - `LibraryError::Io` - File could not be removed
    fn remove(&self, video_id: &str) -> Result<(), LibraryError>;
}

/// Listing entry for a stored video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoMetadata {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Video library backed by a flat directory; the identifier is the file name.
#[derive(Debug, Clone)]
pub struct LocalVideoLibrary {
    root: PathBuf,
}

impl LocalVideoLibrary {
    /// Opens the library, creating `root` if needed.
    ///
    /// # Errors
    /// - `LibraryError::Io` - Directory could not be created
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, LibraryError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Lists supported video files, newest first.
    ///
    /// # Errors
    /// - `LibraryError::Io` - Directory could not be read
    pub fn list(&self) -> Result<Vec<VideoMetadata>, LibraryError> {
        let mut videos = Vec::new();

        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || !is_supported(&path) {
                continue;
            }

            match metadata_for(&path) {
                Ok(metadata) => videos.push(metadata),
                Err(e) => warn!("Skipping unreadable video {}: {}", path.display(), e),
            }
        }

        videos.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(videos)
    }

    /// Stores an upload as `<unix_secs>_<file_name>`, writing chunks to disk
    /// as they arrive.
    ///
    /// The partial file is removed when the body or the write fails.
    ///
    /// # Errors
    /// - `LibraryError::InvalidName` - Name is empty or contains a path
    /// - `LibraryError::UnsupportedFormat` - Extension is not a known container
    /// - `LibraryError::UploadInterrupted` - The body stream failed
    /// - `LibraryError::Io` - File could not be written
    pub async fn import<S, B, E>(&self, file_name: &str, chunks: S) -> Result<VideoMetadata, LibraryError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: Display,
    {
        validate_name(file_name)?;
        if !is_supported(Path::new(file_name)) {
            return Err(LibraryError::UnsupportedFormat {
                file_name: file_name.to_string(),
            });
        }

        let stamp = Utc::now().timestamp();
        let path = self.root.join(format!("{stamp}_{file_name}"));

        match write_chunks(&path, file_name, chunks).await {
            Ok(written) => {
                debug!("Stored upload {} ({} bytes)", path.display(), written);
                Ok(metadata_for(&path)?)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&path).await
                    && cleanup.kind() != std::io::ErrorKind::NotFound
                {
                    warn!("Failed to remove partial upload {}: {}", path.display(), cleanup);
                }
                Err(e)
            }
        }
    }
}

impl VideoLibrary for LocalVideoLibrary {
    fn exists(&self, video_id: &str) -> bool {
        validate_name(video_id).is_ok() && self.path(video_id).is_file()
    }

    fn path(&self, video_id: &str) -> PathBuf {
        self.root.join(video_id)
    }

    fn remove(&self, video_id: &str) -> Result<(), LibraryError> {
        if !self.exists(video_id) {
            return Err(LibraryError::NotFound {
                video_id: video_id.to_string(),
            });
        }
        std::fs::remove_file(self.path(video_id))?;
        Ok(())
    }
}

async fn write_chunks<S, B, E>(path: &Path, file_name: &str, chunks: S) -> Result<u64, LibraryError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mut chunks = std::pin::pin!(chunks);
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(|e| LibraryError::UploadInterrupted {
            file_name: file_name.to_string(),
            reason: e.to_string(),
        })?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await?;
        written += bytes.len() as u64;
    }

    file.flush().await?;
    Ok(written)
}

fn validate_name(name: &str) -> Result<(), LibraryError> {
    let plain = Path::new(name)
        .file_name()
        .is_some_and(|file_name| file_name == name);

    if name.is_empty() || name == "." || name == ".." || !plain || name.contains(['/', '\\']) {
        return Err(LibraryError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn is_supported(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

fn metadata_for(path: &Path) -> std::io::Result<VideoMetadata> {
    let metadata = std::fs::metadata(path)?;
    let created: SystemTime = metadata.created().or_else(|_| metadata.modified())?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(VideoMetadata {
        id: name.clone(),
        name,
        size: metadata.len(),
        created_at: DateTime::<Utc>::from(created),
    })
}
