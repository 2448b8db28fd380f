//! Queue-driven streaming: process supervision, the run loop and status.
//!
//! One session at a time pulls videos off the queue and hands each to an
//! external transcoder publishing to the configured RTMP endpoint.

pub mod process;
pub mod session;
mod stream_loop;
pub mod supervisor;

pub use process::{
    ExitOutcome, FfmpegLauncher, ProcessHandle, ProcessLauncher, ProcessState, ffmpeg_args,
};
pub use session::{StreamPhase, StreamStatus};
pub use supervisor::StreamSupervisor;

/// Caller-misuse conditions raised by the public supervisor operations.
///
/// None of these mutate state.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("Stream is already active")]
    AlreadyActive,

    #[error("Queue is empty. Add videos to queue first.")]
    EmptyQueue,

    #[error("No active stream")]
    NotActive,

    #[error("Video not found: {video_id}")]
    NotFound { video_id: String },

    #[error("Video {video_id} is currently streaming")]
    InUse { video_id: String },
}

/// Failures of a single streaming process.
///
/// The run loop handles these itself by moving on to the next video.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to start {program}: {reason}")]
    Spawn { program: String, reason: String },

    #[error("Stream process exited with {code:?}")]
    Exit { code: Option<i32> },

    #[error("Failed waiting for stream process: {reason}")]
    Wait { reason: String },
}
