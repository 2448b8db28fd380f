//! HTTP request handlers organized by functionality

pub mod error;
pub mod library;
pub mod stream;

// Re-export handler functions
pub use error::ApiError;
pub use library::{delete_video, get_settings, list_videos, update_settings, upload_video};
pub use stream::{
    QueueItem, add_to_queue, get_queue, get_status, health, remove_from_queue, skip_stream,
    start_stream, stop_stream,
};
