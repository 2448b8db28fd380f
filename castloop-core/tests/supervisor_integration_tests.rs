//! Integration tests for the stream supervisor.
//!
//! Each "video" is a small shell script and the launcher runs it with `sh`,
//! so tests control how long a stream lasts, how it exits and whether it
//! honours SIGTERM.
#![cfg(unix)]

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use castloop_core::config::CastloopConfig;
use castloop_core::streaming::{ProcessHandle, ProcessLauncher, StreamPhase};
use castloop_core::{
    CastloopError, JsonQueueFile, JsonSettingsStore, LibraryError, LocalVideoLibrary,
    ProcessError, QueueStore, StreamError, StreamSettings, StreamSupervisor, VideoLibrary,
};
use parking_lot::Mutex;
use tempfile::TempDir;
use tokio::process::Command;

const LONG_RUNNING: &str = "exec sleep 30";
const QUICK_SUCCESS: &str = "exit 0";

/// Runs each video file as a shell script and records what was launched.
#[derive(Default)]
struct ScriptLauncher {
    launches: Mutex<Vec<String>>,
}

impl ProcessLauncher for ScriptLauncher {
    fn launch(
        &self,
        video_path: &Path,
        _settings: &StreamSettings,
    ) -> Result<ProcessHandle, ProcessError> {
        let name = video_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.launches.lock().push(name.clone());

        let program = if name.starts_with("broken") {
            "/nonexistent/castloop-transcoder"
        } else {
            "sh"
        };
        let mut cmd = Command::new(program);
        cmd.arg(video_path);
        ProcessHandle::spawn(cmd, name)
    }
}

/// Test fixture owning a scratch directory and a supervisor rooted in it.
struct SupervisorFixture {
    dir: TempDir,
    config: CastloopConfig,
    library: Arc<LocalVideoLibrary>,
    launcher: Arc<ScriptLauncher>,
    supervisor: StreamSupervisor,
}

impl SupervisorFixture {
    fn new() -> Self {
        Self::with_failure_pause(None)
    }

    /// Fixture whose loop waits `pause` after a failed video.
    fn with_failure_pause(pause: Option<Duration>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = CastloopConfig::for_testing(dir.path());
        if let Some(pause) = pause {
            config.supervisor.failure_pause = pause;
        }
        let library = Arc::new(LocalVideoLibrary::open(&config.paths.videos_dir).unwrap());
        let launcher = Arc::new(ScriptLauncher::default());
        let supervisor = Self::build_supervisor(&config, &library, &launcher);

        Self {
            dir,
            config,
            library,
            launcher,
            supervisor,
        }
    }

    /// A second supervisor over the same files, as after a restart.
    fn restart(&self) -> StreamSupervisor {
        Self::build_supervisor(&self.config, &self.library, &self.launcher)
    }

    fn build_supervisor(
        config: &CastloopConfig,
        library: &Arc<LocalVideoLibrary>,
        launcher: &Arc<ScriptLauncher>,
    ) -> StreamSupervisor {
        let queue = QueueStore::load(Box::new(JsonQueueFile::new(&config.paths.queue_file)));
        StreamSupervisor::new(
            config.supervisor.clone(),
            queue,
            library.clone(),
            Arc::new(JsonSettingsStore::new(&config.paths.settings_file)),
            launcher.clone(),
        )
    }

    /// Creates a video whose "stream" runs `script`, and queues it.
    fn queue_video(&self, video_id: &str, script: &str) {
        std::fs::write(self.config.paths.videos_dir.join(video_id), script).unwrap();
        self.supervisor.enqueue(video_id).unwrap();
    }

    fn remove_video_file(&self, video_id: &str) {
        std::fs::remove_file(self.config.paths.videos_dir.join(video_id)).unwrap();
    }

    fn launches(&self) -> Vec<String> {
        self.launcher.launches.lock().clone()
    }

    async fn wait_for_current(&self, video_id: &str) {
        let supervisor = self.supervisor.clone();
        let expected = video_id.to_string();
        wait_until(move || supervisor.current_video().as_deref() == Some(expected.as_str())).await;
    }

    async fn wait_for_idle(&self) {
        let supervisor = self.supervisor.clone();
        wait_until(move || !supervisor.is_active()).await;
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !condition() {
        assert!(Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_start_with_empty_queue_fails() {
    let fixture = SupervisorFixture::new();

    let result = fixture.supervisor.start().await;

    assert_eq!(result, Err(StreamError::EmptyQueue));
    assert!(!fixture.supervisor.status().is_active);
    assert!(fixture.launches().is_empty());
    // A rejected start takes no settings snapshot
    assert!(!fixture.config.paths.settings_file.exists());
}

#[tokio::test]
async fn test_enqueue_unknown_video_fails() {
    let fixture = SupervisorFixture::new();

    let result = fixture.supervisor.enqueue("ghost.mp4");

    assert!(matches!(result, Err(StreamError::NotFound { .. })));
    assert!(fixture.supervisor.queue().is_empty());
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("a.mp4", LONG_RUNNING);
    fixture.queue_video("b.mp4", LONG_RUNNING);

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_current("a.mp4").await;

    assert_eq!(fixture.supervisor.start().await, Err(StreamError::AlreadyActive));

    let status = fixture.supervisor.status();
    assert!(status.is_active);
    assert_eq!(status.current_video_id.as_deref(), Some("a.mp4"));
    assert_eq!(status.queue, vec!["b.mp4"]);
    assert_eq!(fixture.launches(), vec!["a.mp4"]);

    fixture.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_then_immediate_restart() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("a.mp4", LONG_RUNNING);
    fixture.queue_video("b.mp4", LONG_RUNNING);

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_current("a.mp4").await;
    fixture.supervisor.stop().await.unwrap();

    let status = fixture.supervisor.status();
    assert!(!status.is_active);
    assert_eq!(status.status, StreamPhase::Idle);
    assert_eq!(status.current_video_id, None);
    assert_eq!(status.uptime, 0);

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_current("b.mp4").await;
    assert_eq!(fixture.launches(), vec!["a.mp4", "b.mp4"]);

    fixture.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_second_stop_reports_not_active() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("a.mp4", LONG_RUNNING);

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_current("a.mp4").await;

    assert_eq!(fixture.supervisor.stop().await, Ok(()));
    let after_first = fixture.supervisor.status();

    assert_eq!(fixture.supervisor.stop().await, Err(StreamError::NotActive));
    assert_eq!(fixture.supervisor.status(), after_first);
}

#[tokio::test]
async fn test_skip_advances_without_requeue() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("a.mp4", LONG_RUNNING);
    fixture.queue_video("b.mp4", LONG_RUNNING);
    fixture.queue_video("c.mp4", LONG_RUNNING);

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_current("a.mp4").await;
    assert_eq!(fixture.supervisor.queue(), vec!["b.mp4", "c.mp4"]);

    fixture.supervisor.skip().await.unwrap();
    fixture.wait_for_current("b.mp4").await;

    let status = fixture.supervisor.status();
    assert!(status.is_active);
    assert_eq!(status.queue, vec!["c.mp4"]);
    assert_eq!(fixture.launches(), vec!["a.mp4", "b.mp4"]);

    fixture.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_skip_without_session_fails() {
    let fixture = SupervisorFixture::new();

    assert_eq!(fixture.supervisor.skip().await, Err(StreamError::NotActive));
}

#[tokio::test]
async fn test_missing_video_is_skipped() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("a.mp4", LONG_RUNNING);
    fixture.queue_video("b.mp4", LONG_RUNNING);
    fixture.remove_video_file("a.mp4");

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_current("b.mp4").await;

    assert!(fixture.supervisor.status().is_active);
    assert_eq!(fixture.launches(), vec!["b.mp4"]);

    fixture.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_session_ends_when_queue_drains() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("a.mp4", QUICK_SUCCESS);
    fixture.queue_video("b.mp4", QUICK_SUCCESS);

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_idle().await;

    let status = fixture.supervisor.status();
    assert_eq!(status.status, StreamPhase::Idle);
    assert!(status.queue.is_empty());
    assert_eq!(status.started_at, None);
    assert_eq!(fixture.launches(), vec!["a.mp4", "b.mp4"]);
    assert_eq!(fixture.supervisor.stop().await, Err(StreamError::NotActive));
}

#[tokio::test]
async fn test_failures_do_not_end_session() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("a.mp4", "echo 'rtmp handshake failed' >&2; exit 1");
    fixture.queue_video("broken.mp4", QUICK_SUCCESS);
    fixture.queue_video("c.mp4", LONG_RUNNING);

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_current("c.mp4").await;

    assert!(fixture.supervisor.is_active());
    assert_eq!(fixture.launches(), vec!["a.mp4", "broken.mp4", "c.mp4"]);

    fixture.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_kills_process_ignoring_sigterm() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("stubborn.mp4", "trap '' TERM; exec sleep 30");

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_current("stubborn.mp4").await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    fixture.supervisor.stop().await.unwrap();

    assert!(started.elapsed() >= fixture.config.supervisor.grace_period);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!fixture.supervisor.is_active());
}

#[tokio::test]
async fn test_dequeue_while_streaming() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("a.mp4", LONG_RUNNING);
    fixture.queue_video("b.mp4", LONG_RUNNING);
    fixture.queue_video("c.mp4", LONG_RUNNING);

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_current("a.mp4").await;

    assert_eq!(fixture.supervisor.dequeue("b.mp4"), vec!["c.mp4"]);
    assert_eq!(fixture.supervisor.dequeue("b.mp4"), vec!["c.mp4"]);

    fixture.supervisor.skip().await.unwrap();
    fixture.wait_for_current("c.mp4").await;

    fixture.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_queue_survives_restart() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("b.mp4", QUICK_SUCCESS);
    fixture.queue_video("a.mp4", QUICK_SUCCESS);
    fixture.queue_video("c.mp4", QUICK_SUCCESS);
    fixture.supervisor.dequeue("a.mp4");
    let before = fixture.supervisor.status().queue;

    let restarted = fixture.restart();

    assert_eq!(restarted.status().queue, before);
    assert_eq!(before, vec!["b.mp4", "c.mp4"]);
    assert!(fixture.dir.path().join("queue.json").exists());
}

#[tokio::test]
async fn test_uptime_spans_videos() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("a.mp4", "sleep 1");
    fixture.queue_video("b.mp4", LONG_RUNNING);

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_current("a.mp4").await;
    let first_start = fixture.supervisor.status().started_at;
    fixture.wait_for_current("b.mp4").await;

    let status = fixture.supervisor.status();
    assert!(first_start.is_some());
    assert_eq!(status.started_at, first_start);
    assert!(status.uptime >= 1);

    fixture.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_skip_cuts_failure_pause_short() {
    let fixture = SupervisorFixture::with_failure_pause(Some(Duration::from_secs(30)));
    fixture.queue_video("a.mp4", "exit 1");
    fixture.queue_video("b.mp4", LONG_RUNNING);

    fixture.supervisor.start().await.unwrap();
    wait_until(|| fixture.launches() == vec!["a.mp4"]).await;
    // Let the failed process exit so the loop is pausing
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    fixture.supervisor.skip().await.unwrap();
    assert!(started.elapsed() < Duration::from_secs(5));

    fixture.wait_for_current("b.mp4").await;
    assert_eq!(fixture.launches(), vec!["a.mp4", "b.mp4"]);

    fixture.supervisor.stop().await.unwrap();
}

#[tokio::test]
async fn test_stop_cuts_failure_pause_short() {
    let fixture = SupervisorFixture::with_failure_pause(Some(Duration::from_secs(30)));
    fixture.queue_video("a.mp4", "exit 1");
    fixture.queue_video("b.mp4", LONG_RUNNING);

    fixture.supervisor.start().await.unwrap();
    wait_until(|| fixture.launches() == vec!["a.mp4"]).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    fixture.supervisor.stop().await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!fixture.supervisor.is_active());
    assert_eq!(fixture.supervisor.queue(), vec!["b.mp4"]);
    assert_eq!(fixture.launches(), vec!["a.mp4"]);
}

#[tokio::test]
async fn test_delete_streaming_video_is_rejected() {
    let fixture = SupervisorFixture::new();
    fixture.queue_video("a.mp4", LONG_RUNNING);
    fixture.queue_video("b.mp4", LONG_RUNNING);

    fixture.supervisor.start().await.unwrap();
    fixture.wait_for_current("a.mp4").await;

    let result = fixture.supervisor.delete_video("a.mp4");
    assert!(matches!(
        result,
        Err(CastloopError::Stream(StreamError::InUse { .. }))
    ));
    assert!(fixture.library.exists("a.mp4"));

    fixture.supervisor.delete_video("b.mp4").unwrap();
    assert!(!fixture.library.exists("b.mp4"));
    assert!(fixture.supervisor.queue().is_empty());

    assert!(matches!(
        fixture.supervisor.delete_video("b.mp4"),
        Err(CastloopError::Library(LibraryError::NotFound { .. }))
    ));

    fixture.supervisor.stop().await.unwrap();
}
