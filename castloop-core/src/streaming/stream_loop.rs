//! Background run loop consuming the queue one video at a time.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::ProcessError;
use super::process::{ExitOutcome, ProcessHandle, ProcessLauncher};
use super::session::{ControlRequest, SharedState};
use crate::library::VideoLibrary;
use crate::settings::StreamSettings;

/// What the loop does after handling one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// One session's loop. Owns every process it launches.
pub(crate) struct StreamLoop {
    pub session_id: u64,
    pub shared: Arc<Mutex<SharedState>>,
    pub library: Arc<dyn VideoLibrary>,
    pub launcher: Arc<dyn ProcessLauncher>,
    pub settings: StreamSettings,
    pub grace_period: Duration,
    pub failure_pause: Duration,
    pub control: mpsc::UnboundedReceiver<ControlRequest>,
}

impl StreamLoop {
    pub async fn run(mut self) {
        let id = self.session_id;
        info!("Stream session {} started", id);

        loop {
            if self.drain_control() == Flow::Stop {
                break;
            }

            let Some(video_id) = self.shared.lock().next_video(id) else {
                break;
            };

            // Checked under the lock so a concurrent delete either wins
            // outright or sees the video as playing.
            let found = {
                let mut shared = self.shared.lock();
                let found = self.library.exists(&video_id);
                if found {
                    shared.mark_playing(id, &video_id);
                }
                found
            };
            if !found {
                warn!("Video {} not found. Skipping.", video_id);
                continue;
            }

            let path = self.library.path(&video_id);

            let flow = match self.launcher.launch(&path, &self.settings) {
                Ok(handle) => self.supervise(handle, &video_id).await,
                Err(e) => {
                    error!("Error streaming {}: {}", video_id, e);
                    self.pause_after_failure().await
                }
            };

            self.shared.lock().clear_current(id);
            if flow == Flow::Stop {
                break;
            }
        }

        let stopped = {
            let mut shared = self.shared.lock();
            let stopped = shared.stop_requested(id);
            shared.end_session(id);
            stopped
        };

        if stopped {
            info!("Stream session {} stopped", id);
        } else {
            info!("Queue is empty. Stream session {} ended", id);
        }
    }

    /// Blocks until the process exits or a control request ends it early.
    async fn supervise(&mut self, mut handle: ProcessHandle, video_id: &str) -> Flow {
        let request = tokio::select! {
            result = handle.wait() => {
                return self.report_exit(&mut handle, video_id, result).await;
            }
            Some(request) = self.control.recv() => request,
        };

        handle.terminate(self.grace_period).await;
        match request {
            ControlRequest::Skip { responder } => {
                info!("Skipped {}", video_id);
                let _ = responder.send(());
                Flow::Continue
            }
            ControlRequest::Stop { responder } => {
                let _ = responder.send(());
                Flow::Stop
            }
        }
    }

    async fn report_exit(
        &mut self,
        handle: &mut ProcessHandle,
        video_id: &str,
        result: Result<ExitOutcome, ProcessError>,
    ) -> Flow {
        if self.shared.lock().stop_requested(self.session_id) {
            return Flow::Stop;
        }

        match result {
            Ok(outcome) if outcome.success() => {
                info!("Finished streaming {}", video_id);
                Flow::Continue
            }
            Ok(outcome) => {
                let tail = handle.stderr_tail().await;
                let failure = ProcessError::Exit { code: outcome.code };
                error!("Error streaming {}: {}: {}", video_id, failure, tail.trim());
                self.pause_after_failure().await
            }
            Err(e) => {
                error!("Error streaming {}: {}", video_id, e);
                self.pause_after_failure().await
            }
        }
    }

    /// Short pause so a queue of broken entries does not spin, cut short by
    /// any control request.
    async fn pause_after_failure(&mut self) -> Flow {
        tokio::select! {
            _ = tokio::time::sleep(self.failure_pause) => Flow::Continue,
            Some(request) = self.control.recv() => Self::acknowledge(request),
        }
    }

    /// Handles requests that arrived while no process was running.
    fn drain_control(&mut self) -> Flow {
        let mut flow = Flow::Continue;
        while let Ok(request) = self.control.try_recv() {
            if Self::acknowledge(request) == Flow::Stop {
                flow = Flow::Stop;
            }
        }
        flow
    }

    fn acknowledge(request: ControlRequest) -> Flow {
        match request {
            ControlRequest::Skip { responder } => {
                debug!("Skip requested with nothing playing");
                let _ = responder.send(());
                Flow::Continue
            }
            ControlRequest::Stop { responder } => {
                let _ = responder.send(());
                Flow::Stop
            }
        }
    }
}
