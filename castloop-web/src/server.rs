//! HTTP server wiring for the Castloop control API.

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use castloop_core::config::CastloopConfig;
use castloop_core::streaming::FfmpegLauncher;
use castloop_core::{
    JsonQueueFile, JsonSettingsStore, LocalVideoLibrary, QueueStore, StreamSupervisor,
};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::handlers::{
    add_to_queue, delete_video, get_queue, get_settings, get_status, health, list_videos,
    remove_from_queue, skip_stream, start_stream, stop_stream, update_settings, upload_video,
};

/// Shared handles passed to every request handler.
#[derive(Clone)]
pub struct AppState {
    /// Queue and session control
    pub supervisor: StreamSupervisor,
    /// Uploaded videos
    pub library: Arc<LocalVideoLibrary>,
    /// Persisted RTMP settings
    pub settings: Arc<JsonSettingsStore>,
}

impl AppState {
    /// Builds the supervisor and its collaborators from `config`.
    ///
    /// # Errors
    /// - `castloop_core::LibraryError::Io` - Video directory could not be created
    pub fn from_config(config: &CastloopConfig) -> Result<Self, castloop_core::LibraryError> {
        let library = Arc::new(LocalVideoLibrary::open(&config.paths.videos_dir)?);
        let settings = Arc::new(JsonSettingsStore::new(&config.paths.settings_file));
        let queue = QueueStore::load(Box::new(JsonQueueFile::new(&config.paths.queue_file)));

        let launcher = FfmpegLauncher::new(&config.supervisor.ffmpeg_path);
        if !launcher.is_available() {
            warn!(
                "{} is not runnable; streams will fail until it is installed",
                config.supervisor.ffmpeg_path.display()
            );
        }

        let supervisor = StreamSupervisor::new(
            config.supervisor.clone(),
            queue,
            library.clone(),
            settings.clone(),
            Arc::new(launcher),
        );

        Ok(Self {
            supervisor,
            library,
            settings,
        })
    }
}

/// Routes of the JSON API.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/status", get(get_status))
        // Video library
        .route("/videos", get(list_videos))
        .route(
            "/upload/{file_name}",
            post(upload_video).layer(DefaultBodyLimit::disable()),
        )
        .route("/video/{video_id}", delete(delete_video))
        // RTMP settings
        .route("/settings", get(get_settings).post(update_settings))
        // Stream control
        .route("/stream/start", post(start_stream))
        .route("/stream/stop", post(stop_stream))
        .route("/stream/skip", post(skip_stream))
        // Queue
        .route("/queue", get(get_queue))
        .route("/queue/add", post(add_to_queue))
        .route("/queue/remove/{video_id}", delete(remove_from_queue))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API until Ctrl-C, then stops any active stream.
///
/// # Errors
/// - Video directory could not be created
/// - Listener could not bind or the server failed
pub async fn run_server(config: CastloopConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::from_config(&config)?;
    let supervisor = state.supervisor.clone();
    let app = build_router(state);

    let address = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Castloop control API running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        })
        .await?;

    supervisor.shutdown().await;
    Ok(())
}
