//! Stream control, queue and status handlers

use axum::extract::{Path, State};
use axum::response::Json;
use castloop_core::StreamStatus;
use serde::Deserialize;
use serde_json::{Value, json};

use super::ApiError;
use crate::server::AppState;

/// Body of a queue addition request.
#[derive(Debug, Deserialize)]
pub struct QueueItem {
    /// Identifier of a stored video
    pub video_id: String,
}

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({
        "message": "Castloop stream control API",
        "status": "online",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Current session and queue snapshot.
pub async fn get_status(State(state): State<AppState>) -> Json<StreamStatus> {
    Json(state.supervisor.status())
}

/// Starts streaming the queue.
///
/// # Errors
/// - `400` - Already streaming or the queue is empty
pub async fn start_stream(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.supervisor.start().await?;
    Ok(Json(json!({ "message": "Stream started successfully" })))
}

/// Stops the active stream.
///
/// # Errors
/// - `400` - No active stream
pub async fn stop_stream(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.supervisor.stop().await?;
    Ok(Json(json!({ "message": "Stream stopped successfully" })))
}

/// Skips the current video.
///
/// # Errors
/// - `400` - No active stream
pub async fn skip_stream(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.supervisor.skip().await?;
    Ok(Json(json!({ "message": "Skipped to next video" })))
}

/// Appends a stored video to the queue.
///
/// # Errors
/// - `404` - No such video
pub async fn add_to_queue(
    State(state): State<AppState>,
    Json(item): Json<QueueItem>,
) -> Result<Json<Value>, ApiError> {
    let queue = state.supervisor.enqueue(&item.video_id)?;
    Ok(Json(json!({ "message": "Video added to queue", "queue": queue })))
}

/// Removes a video from the queue; absent ids are not an error.
pub async fn remove_from_queue(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Json<Value> {
    let queue = state.supervisor.dequeue(&video_id);
    Json(json!({ "message": "Video removed from queue", "queue": queue }))
}

/// Current queue order.
pub async fn get_queue(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "queue": state.supervisor.queue() }))
}
