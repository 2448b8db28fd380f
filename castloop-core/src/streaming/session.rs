//! Shared session and queue state plus the status snapshot derived from it.
//!
//! Everything here lives behind the supervisor's single mutex. Methods that
//! take a session id ignore calls from a loop whose session has already been
//! replaced, so a stopped loop finishing late cannot clobber a new session.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::queue::QueueStore;

/// Requests delivered to the running stream loop.
pub(crate) enum ControlRequest {
    /// Terminate the current video and continue with the next one.
    Skip { responder: oneshot::Sender<()> },
    /// Terminate the current video and end the session.
    Stop { responder: oneshot::Sender<()> },
}

/// The one active streaming session.
pub(crate) struct Session {
    pub id: u64,
    pub current_video: Option<String>,
    /// Set when the first video of the session starts
    pub started_at: Option<DateTime<Utc>>,
    pub stop_requested: bool,
    pub control: mpsc::UnboundedSender<ControlRequest>,
}

/// State guarded by the supervisor's mutex.
pub(crate) struct SharedState {
    pub queue: QueueStore,
    pub session: Option<Session>,
    next_session_id: u64,
}

impl SharedState {
    pub fn new(queue: QueueStore) -> Self {
        Self {
            queue,
            session: None,
            next_session_id: 1,
        }
    }

    /// Installs a new session; the caller has already checked none is active.
    pub fn begin_session(&mut self, control: mpsc::UnboundedSender<ControlRequest>) -> u64 {
        let id = self.next_session_id;
        self.next_session_id += 1;
        self.session = Some(Session {
            id,
            current_video: None,
            started_at: None,
            stop_requested: false,
            control,
        });
        id
    }

    /// Session `id` if it is still the live one.
    pub fn session_mut(&mut self, id: u64) -> Option<&mut Session> {
        self.session.as_mut().filter(|session| session.id == id)
    }

    /// Pops the next video for session `id`, or `None` once the queue is
    /// exhausted, a stop was requested, or the session was replaced.
    pub fn next_video(&mut self, id: u64) -> Option<String> {
        let session = self.session.as_ref()?;
        if session.id != id || session.stop_requested {
            return None;
        }
        self.queue.pop_front()
    }

    pub fn mark_playing(&mut self, id: u64, video_id: &str) {
        if let Some(session) = self.session_mut(id) {
            session.current_video = Some(video_id.to_string());
            session.started_at.get_or_insert_with(Utc::now);
        }
    }

    pub fn current_video(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|session| session.current_video.as_deref())
    }

    pub fn clear_current(&mut self, id: u64) {
        if let Some(session) = self.session_mut(id) {
            session.current_video = None;
        }
    }

    pub fn stop_requested(&self, id: u64) -> bool {
        match &self.session {
            Some(session) if session.id == id => session.stop_requested,
            _ => true,
        }
    }

    /// Clears session `id`. Returns whether it was still live.
    pub fn end_session(&mut self, id: u64) -> bool {
        if self.session.as_ref().is_some_and(|session| session.id == id) {
            self.session = None;
            return true;
        }
        false
    }

    /// Consistent snapshot of session and queue as of `now`.
    pub fn status(&self, now: DateTime<Utc>) -> StreamStatus {
        let (is_active, current_video_id, started_at) = match &self.session {
            Some(session) => (true, session.current_video.clone(), session.started_at),
            None => (false, None, None),
        };

        let uptime = started_at
            .map(|started| (now - started).num_seconds().max(0) as u64)
            .unwrap_or(0);

        StreamStatus {
            is_active,
            current_video_id,
            uptime,
            status: if is_active {
                StreamPhase::Streaming
            } else {
                StreamPhase::Idle
            },
            queue: self.queue.snapshot(),
            started_at,
        }
    }
}

/// Coarse textual state reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamPhase {
    Streaming,
    Idle,
}

/// Point-in-time view of the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub is_active: bool,
    pub current_video_id: Option<String>,
    /// Whole seconds since the session's first video started
    pub uptime: u64,
    pub status: StreamPhase,
    pub queue: Vec<String>,
    #[serde(skip_serializing)]
    pub started_at: Option<DateTime<Utc>>,
}
