//! Public entry point for queue edits and session control.

use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::StreamError;
use super::process::ProcessLauncher;
use super::session::{ControlRequest, SharedState, StreamStatus};
use super::stream_loop::StreamLoop;
use crate::config::SupervisorConfig;
use crate::library::VideoLibrary;
use crate::queue::QueueStore;
use crate::settings::SettingsProvider;

/// Owns the play queue and the single streaming session.
///
/// Queue contents and session fields sit behind one mutex that is never
/// held across an await. Cloning yields another handle to the same state.
#[derive(Clone)]
pub struct StreamSupervisor {
    shared: Arc<Mutex<SharedState>>,
    library: Arc<dyn VideoLibrary>,
    settings: Arc<dyn SettingsProvider>,
    launcher: Arc<dyn ProcessLauncher>,
    config: SupervisorConfig,
}

impl StreamSupervisor {
    pub fn new(
        config: SupervisorConfig,
        queue: QueueStore,
        library: Arc<dyn VideoLibrary>,
        settings: Arc<dyn SettingsProvider>,
        launcher: Arc<dyn ProcessLauncher>,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(SharedState::new(queue))),
            library,
            settings,
            launcher,
            config,
        }
    }

    /// Appends a known video to the queue; already queued ids are left alone.
    ///
    /// Returns the queue after the call.
    ///
    /// # Errors
    /// - `StreamError::NotFound` - The library has no such video
    pub fn enqueue(&self, video_id: &str) -> Result<Vec<String>, StreamError> {
        if !self.library.exists(video_id) {
            return Err(StreamError::NotFound {
                video_id: video_id.to_string(),
            });
        }

        let mut shared = self.shared.lock();
        if shared.queue.enqueue(video_id) {
            debug!("Queued {}", video_id);
        }
        Ok(shared.queue.snapshot())
    }

    /// Removes `video_id` from the queue if present. Returns the queue after.
    pub fn dequeue(&self, video_id: &str) -> Vec<String> {
        let mut shared = self.shared.lock();
        if shared.queue.dequeue(video_id) {
            debug!("Removed {} from queue", video_id);
        }
        shared.queue.snapshot()
    }

    pub fn queue(&self) -> Vec<String> {
        self.shared.lock().queue.snapshot()
    }

    /// Deletes a stored video and drops it from the queue.
    ///
    /// The check and the removal happen in the same critical section in
    /// which the loop picks its next video, so the loop never starts a
    /// video that is being deleted.
    ///
    /// # Errors
    /// - `LibraryError::NotFound` - No such video
    /// - `StreamError::InUse` - The video is streaming right now
    /// - `LibraryError::Io` - File could not be removed
    pub fn delete_video(&self, video_id: &str) -> crate::Result<()> {
        let mut shared = self.shared.lock();
        if shared.current_video() == Some(video_id) {
            return Err(StreamError::InUse {
                video_id: video_id.to_string(),
            }
            .into());
        }

        self.library.remove(video_id)?;
        if shared.queue.dequeue(video_id) {
            debug!("Removed deleted video {} from queue", video_id);
        }
        info!("Deleted video {}", video_id);
        Ok(())
    }

    /// Starts a session that plays the queue in the background.
    ///
    /// The settings snapshot is taken here and kept for the whole session.
    ///
    /// # Errors
    /// - `StreamError::AlreadyActive` - A session is running
    /// - `StreamError::EmptyQueue` - Nothing to play
    pub async fn start(&self) -> Result<(), StreamError> {
        let (control_tx, control_rx) = mpsc::unbounded_channel();

        let session_id = {
            let mut shared = self.shared.lock();
            if shared.session.is_some() {
                return Err(StreamError::AlreadyActive);
            }
            if shared.queue.is_empty() {
                return Err(StreamError::EmptyQueue);
            }
            shared.begin_session(control_tx)
        };

        let settings = self.settings.current();
        let stream_loop = StreamLoop {
            session_id,
            shared: Arc::clone(&self.shared),
            library: Arc::clone(&self.library),
            launcher: Arc::clone(&self.launcher),
            settings,
            grace_period: self.config.grace_period,
            failure_pause: self.config.failure_pause,
            control: control_rx,
        };

        tokio::spawn(stream_loop.run());
        info!("Stream started (session {})", session_id);
        Ok(())
    }

    /// Ends the session.
    ///
    /// Returns once the current process has exited or been killed; the
    /// session is idle from then on.
    ///
    /// # Errors
    /// - `StreamError::NotActive` - No session, or a stop is already underway
    pub async fn stop(&self) -> Result<(), StreamError> {
        let (session_id, control) = {
            let mut shared = self.shared.lock();
            let session = match shared.session.as_mut() {
                Some(session) if !session.stop_requested => session,
                _ => return Err(StreamError::NotActive),
            };
            session.stop_requested = true;
            (session.id, session.control.clone())
        };

        let (responder, acknowledged) = oneshot::channel();
        if control.send(ControlRequest::Stop { responder }).is_ok() {
            // Err means the loop already finished on its own
            let _ = acknowledged.await;
        }

        self.shared.lock().end_session(session_id);
        info!("Stream stopped (session {})", session_id);
        Ok(())
    }

    /// Ends the current video early; the session moves on to the next one.
    ///
    /// The skipped video is not queued again.
    ///
    /// # Errors
    /// - `StreamError::NotActive` - No session to skip in
    pub async fn skip(&self) -> Result<(), StreamError> {
        let control = {
            let shared = self.shared.lock();
            match shared.session.as_ref() {
                Some(session) if !session.stop_requested => session.control.clone(),
                _ => return Err(StreamError::NotActive),
            }
        };

        let (responder, acknowledged) = oneshot::channel();
        if control.send(ControlRequest::Skip { responder }).is_ok() {
            let _ = acknowledged.await;
        }
        Ok(())
    }

    pub fn status(&self) -> StreamStatus {
        self.shared.lock().status(Utc::now())
    }

    pub fn is_active(&self) -> bool {
        self.shared.lock().session.is_some()
    }

    /// Video currently being streamed, if any.
    pub fn current_video(&self) -> Option<String> {
        self.shared.lock().current_video().map(str::to_string)
    }

    /// Stops any running session; used on process shutdown.
    pub async fn shutdown(&self) {
        if self.stop().await.is_ok() {
            info!("Active stream stopped for shutdown");
        }
    }
}
