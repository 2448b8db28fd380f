//! Ownership and shutdown of the external streaming process.
//!
//! A [`ProcessHandle`] moves through `Running -> Exited` on its own or
//! `Running -> Terminating -> Exited` when stopped; it never leaves `Exited`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::ProcessError;
use crate::settings::StreamSettings;

/// Bytes of stderr kept for failure reports.
const STDERR_TAIL_BYTES: usize = 2048;

/// How long to wait for the stderr reader after the process has exited.
const STDERR_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// How a supervised process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitOutcome {
    /// Exit code, `None` when ended by a signal
    pub code: Option<i32>,
    /// Ended by `terminate`/`kill` rather than on its own
    pub forced: bool,
}

impl ExitOutcome {
    pub fn success(&self) -> bool {
        !self.forced && self.code == Some(0)
    }
}

/// Lifecycle of a process handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Running,
    Terminating,
    Exited(ExitOutcome),
}

/// Sole owner of one running child process.
///
/// Dropping a handle whose process is still alive kills it.
pub struct ProcessHandle {
    child: Child,
    label: String,
    state: ProcessState,
    stderr: Option<JoinHandle<String>>,
}

impl ProcessHandle {
    /// Spawns `command` with stdout discarded and stderr captured.
    ///
    /// # Errors
    /// - `ProcessError::Spawn` - Executable missing or not runnable
    pub fn spawn(mut command: Command, label: impl Into<String>) -> Result<Self, ProcessError> {
        let program = command
            .as_std()
            .get_program()
            .to_string_lossy()
            .into_owned();

        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|e| ProcessError::Spawn {
            program,
            reason: e.to_string(),
        })?;

        let stderr = child.stderr.take().map(|pipe| tokio::spawn(collect_tail(pipe)));
        let label = label.into();
        debug!("Spawned {} (pid {:?})", label, child.id());

        Ok(Self {
            child,
            label,
            state: ProcessState::Running,
            stderr,
        })
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Blocks until the process exits.
    ///
    /// Returns the recorded outcome when it already has.
    ///
    /// # Errors
    /// - `ProcessError::Wait` - The OS wait call failed
    pub async fn wait(&mut self) -> Result<ExitOutcome, ProcessError> {
        if let ProcessState::Exited(outcome) = self.state {
            return Ok(outcome);
        }

        let status = self.child.wait().await.map_err(|e| ProcessError::Wait {
            reason: e.to_string(),
        })?;
        let forced = self.state == ProcessState::Terminating;
        Ok(self.finish(status, forced))
    }

    /// Asks the process to stop, then kills it if it is still alive after
    /// `grace`. No-op on an exited process.
    pub async fn terminate(&mut self, grace: Duration) -> ExitOutcome {
        if let ProcessState::Exited(outcome) = self.state {
            return outcome;
        }

        self.state = ProcessState::Terminating;
        if !self.signal_graceful() {
            return self.kill().await;
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!("{} stopped", self.label);
                self.finish(status, true)
            }
            Ok(Err(e)) => {
                warn!("Failed waiting for {} to stop: {}", self.label, e);
                self.kill().await
            }
            Err(_) => {
                warn!(
                    "{} did not exit within {:?}, killing it",
                    self.label, grace
                );
                self.kill().await
            }
        }
    }

    /// Forced termination. Errors are logged; the handle always ends `Exited`.
    pub async fn kill(&mut self) -> ExitOutcome {
        if let ProcessState::Exited(outcome) = self.state {
            return outcome;
        }

        self.state = ProcessState::Terminating;
        if let Err(e) = self.child.kill().await {
            warn!("Failed to kill {}: {}", self.label, e);
        }

        let code = match self.child.try_wait() {
            Ok(Some(status)) => status.code(),
            _ => None,
        };
        let outcome = ExitOutcome { code, forced: true };
        self.state = ProcessState::Exited(outcome);
        outcome
    }

    /// Last bytes the process wrote to stderr, available once it has exited.
    pub async fn stderr_tail(&mut self) -> String {
        let Some(reader) = self.stderr.take() else {
            return String::new();
        };

        match tokio::time::timeout(STDERR_DRAIN_TIMEOUT, reader).await {
            Ok(Ok(tail)) => tail,
            Ok(Err(e)) => {
                debug!("stderr reader for {} failed: {}", self.label, e);
                String::new()
            }
            Err(_) => String::new(),
        }
    }

    fn finish(&mut self, status: ExitStatus, forced: bool) -> ExitOutcome {
        let outcome = ExitOutcome {
            code: status.code(),
            forced,
        };
        self.state = ProcessState::Exited(outcome);
        outcome
    }

    #[cfg(unix)]
    fn signal_graceful(&self) -> bool {
        let Some(pid) = self.child.id() else {
            return false;
        };
        let Ok(pid) = libc::pid_t::try_from(pid) else {
            return false;
        };

        // SAFETY: pid belongs to our child, which has not been reaped yet.
        let result = unsafe { libc::kill(pid, libc::SIGTERM) };
        if result != 0 {
            warn!(
                "Failed to signal {}: {}",
                self.label,
                std::io::Error::last_os_error()
            );
            return false;
        }
        true
    }

    #[cfg(not(unix))]
    fn signal_graceful(&self) -> bool {
        false
    }
}

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        if !matches!(self.state, ProcessState::Exited(_)) {
            // Best effort cleanup
            let _ = self.child.start_kill();
        }
        if let Some(reader) = self.stderr.take() {
            reader.abort();
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("label", &self.label)
            .field("pid", &self.child.id())
            .field("state", &self.state)
            .finish()
    }
}

async fn collect_tail(mut pipe: ChildStderr) -> String {
    let mut tail: Vec<u8> = Vec::with_capacity(STDERR_TAIL_BYTES);
    let mut chunk = [0u8; 4096];

    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(read) => {
                tail.extend_from_slice(&chunk[..read]);
                if tail.len() > STDERR_TAIL_BYTES {
                    tail.drain(..tail.len() - STDERR_TAIL_BYTES);
                }
            }
        }
    }

    String::from_utf8_lossy(&tail).into_owned()
}

/// Starts the process that publishes one video.
pub trait ProcessLauncher: Send + Sync {
    /// # Errors
    /// - `ProcessError::Spawn` - Process could not be started
    fn launch(
        &self,
        video_path: &Path,
        settings: &StreamSettings,
    ) -> Result<ProcessHandle, ProcessError>;
}

/// Launches `ffmpeg` re-encoding a file in real time to the RTMP endpoint.
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    ffmpeg_path: PathBuf,
}

impl FfmpegLauncher {
    pub fn new(ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Check if the binary runs at all
    pub fn is_available(&self) -> bool {
        std::process::Command::new(&self.ffmpeg_path)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|status| status.success())
    }
}

impl Default for FfmpegLauncher {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl ProcessLauncher for FfmpegLauncher {
    fn launch(
        &self,
        video_path: &Path,
        settings: &StreamSettings,
    ) -> Result<ProcessHandle, ProcessError> {
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args(ffmpeg_args(video_path, settings));

        let label = format!(
            "ffmpeg[{}]",
            video_path
                .file_name()
                .map(|name| name.to_string_lossy())
                .unwrap_or_default()
        );
        info!("Starting stream: {}", video_path.display());
        ProcessHandle::spawn(cmd, label)
    }
}

/// Transcoder arguments for publishing `video_path` with `settings`.
pub fn ffmpeg_args(video_path: &Path, settings: &StreamSettings) -> Vec<OsString> {
    let bitrate = format!("{}k", settings.bitrate);
    let bufsize = format!("{}k", u64::from(settings.bitrate) * 2);
    let fps = settings.fps.to_string();
    let destination = settings.destination();

    let mut args: Vec<OsString> = vec!["-re".into(), "-i".into(), video_path.into()];
    args.extend(
        [
            "-c:v",
            "libx264",
            "-preset",
            "veryfast",
            "-b:v",
            bitrate.as_str(),
            "-maxrate",
            bitrate.as_str(),
            "-bufsize",
            bufsize.as_str(),
            "-pix_fmt",
            "yuv420p",
            "-g",
            "50",
            "-s",
            settings.resolution.as_str(),
            "-r",
            fps.as_str(),
            "-c:a",
            "aac",
            "-b:a",
            "128k",
            "-ar",
            "44100",
            "-f",
            "flv",
            destination.as_str(),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args
}
