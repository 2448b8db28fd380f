//! Ordered, duplicate-free play queue persisted on every mutation.
//!
//! The store itself is not synchronized; the stream supervisor keeps it
//! inside the same critical section as the session state.

use std::collections::HashSet;
use std::path::PathBuf;

use tracing::warn;

/// Queue persistence failure. Always logged, never surfaced to callers.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Queue I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Queue serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable backing for the queue contents.
pub trait QueuePersistence: Send + Sync {
    /// Reads the last saved order. Failures yield an empty queue.
    fn load(&self) -> Vec<String>;

    /// Replaces the saved order.
    ///
    /// # Errors
    /// - `PersistenceError` - The order could not be written
    fn save(&self, entries: &[String]) -> Result<(), PersistenceError>;
}

/// Queue persisted as a pretty-printed JSON array of video identifiers.
#[derive(Debug, Clone)]
pub struct JsonQueueFile {
    path: PathBuf,
}

impl JsonQueueFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl QueuePersistence for JsonQueueFile {
    fn load(&self) -> Vec<String> {
        if !self.path.exists() {
            return Vec::new();
        }

        let parsed = std::fs::read_to_string(&self.path)
            .map_err(|e| e.to_string())
            .and_then(|raw| serde_json::from_str::<Vec<String>>(&raw).map_err(|e| e.to_string()));

        match parsed {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Error loading queue from {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    fn save(&self, entries: &[String]) -> Result<(), PersistenceError> {
        let body = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, body).map_err(|source| PersistenceError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Persistence that keeps nothing, for ephemeral queues.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPersistence;

impl QueuePersistence for NoPersistence {
    fn load(&self) -> Vec<String> {
        Vec::new()
    }

    fn save(&self, _entries: &[String]) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// FIFO of video identifiers; insertion order is playback order.
pub struct QueueStore {
    entries: Vec<String>,
    persistence: Box<dyn QueuePersistence>,
}

impl QueueStore {
    /// Restores the queue from `persistence`, dropping repeated identifiers.
    pub fn load(persistence: Box<dyn QueuePersistence>) -> Self {
        let mut seen = HashSet::new();
        let entries = persistence
            .load()
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        Self {
            entries,
            persistence,
        }
    }

    /// Queue that lives only in memory.
    pub fn in_memory() -> Self {
        Self::load(Box::new(NoPersistence))
    }

    /// Appends `video_id` unless already queued. Returns whether it was added.
    pub fn enqueue(&mut self, video_id: &str) -> bool {
        if self.contains(video_id) {
            return false;
        }
        self.entries.push(video_id.to_string());
        self.persist();
        true
    }

    /// Removes `video_id` if queued. Returns whether it was present.
    pub fn dequeue(&mut self, video_id: &str) -> bool {
        let Some(index) = self.entries.iter().position(|id| id == video_id) else {
            return false;
        };
        self.entries.remove(index);
        self.persist();
        true
    }

    /// Removes and returns the head of the queue.
    pub fn pop_front(&mut self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let head = self.entries.remove(0);
        self.persist();
        Some(head)
    }

    /// Copy of the current order.
    pub fn snapshot(&self) -> Vec<String> {
        self.entries.clone()
    }

    pub fn contains(&self, video_id: &str) -> bool {
        self.entries.iter().any(|id| id == video_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // In-memory order stays authoritative when the write fails.
    fn persist(&self) {
        if let Err(e) = self.persistence.save(&self.entries) {
            warn!("Error saving queue: {}", e);
        }
    }
}

impl std::fmt::Debug for QueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueStore")
            .field("entries", &self.entries)
            .finish_non_exhaustive()
    }
}
