//! Video library and RTMP settings handlers

use axum::body::Body;
use axum::extract::{Path, State};
use axum::response::Json;
use castloop_core::StreamSettings;
use castloop_core::library::VideoMetadata;
use serde_json::{Value, json};

use super::ApiError;
use crate::server::AppState;

/// Stored videos, newest first.
///
/// # Errors
/// - `500` - Video directory unreadable
pub async fn list_videos(State(state): State<AppState>) -> Result<Json<Vec<VideoMetadata>>, ApiError> {
    Ok(Json(state.library.list()?))
}

/// Streams the request body to disk as a new video named after `file_name`.
///
/// # Errors
/// - `400` - Unsupported extension, invalid name or interrupted body
/// - `500` - Write failure
pub async fn upload_video(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
    body: Body,
) -> Result<Json<Value>, ApiError> {
    let video = state
        .library
        .import(&file_name, body.into_data_stream())
        .await?;

    Ok(Json(json!({
        "message": "File uploaded successfully",
        "video": video,
    })))
}

/// Deletes a stored video and drops it from the queue.
///
/// # Errors
/// - `404` - No such video
/// - `400` - The video is streaming right now
pub async fn delete_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.supervisor.delete_video(&video_id)?;

    Ok(Json(json!({
        "message": "Video deleted successfully",
        "video_id": video_id,
    })))
}

/// Stored RTMP settings.
pub async fn get_settings(State(state): State<AppState>) -> Json<StreamSettings> {
    Json(state.settings.load())
}

/// Replaces the RTMP settings; a running session keeps its snapshot.
///
/// # Errors
/// - `500` - Settings could not be written
pub async fn update_settings(
    State(state): State<AppState>,
    Json(settings): Json<StreamSettings>,
) -> Result<Json<Value>, ApiError> {
    state.settings.save(&settings)?;
    Ok(Json(json!({
        "message": "Settings updated successfully",
        "settings": settings,
    })))
}
