//! CLI command implementations

use std::path::PathBuf;

use anyhow::{Context, bail};
use castloop_core::config::CastloopConfig;
use castloop_core::{JsonQueueFile, LocalVideoLibrary, QueueStore, VideoLibrary};
use clap::Subcommand;
use tracing::{info, warn};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the stream control API
    Serve {
        /// Host to bind to
        #[arg(long, env = "CASTLOOP_HOST")]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory holding uploaded videos
        #[arg(long)]
        videos_dir: Option<PathBuf>,
    },
    /// Inspect or edit the play queue while the server is down
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

/// Offline queue edits
#[derive(Subcommand)]
pub enum QueueAction {
    /// Print the queue in playback order
    List,
    /// Append a stored video
    Add {
        /// Video identifier as listed by the server
        video_id: String,
    },
    /// Drop a video from the queue
    Remove {
        /// Video identifier
        video_id: String,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the failure of the command that ran
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    let config = CastloopConfig::from_env();

    match command {
        Commands::Serve {
            host,
            port,
            videos_dir,
        } => serve(config, host, port, videos_dir).await,
        Commands::Queue { action } => edit_queue(&config, action),
    }
}

/// Run the HTTP server until Ctrl-C
///
/// # Errors
/// - Video directory could not be created
/// - Listener could not bind
pub async fn serve(
    mut config: CastloopConfig,
    host: Option<String>,
    port: Option<u16>,
    videos_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(videos_dir) = videos_dir {
        config.paths.videos_dir = videos_dir;
    }

    info!(
        "Serving videos from {} with queue {}",
        config.paths.videos_dir.display(),
        config.paths.queue_file.display()
    );

    castloop_web::run_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("Server failed: {e}"))?;

    info!("Server stopped");
    Ok(())
}

/// Apply a queue edit directly to the queue file
///
/// # Errors
/// - The video to add is not in the library
pub fn edit_queue(config: &CastloopConfig, action: QueueAction) -> anyhow::Result<()> {
    let mut queue = QueueStore::load(Box::new(JsonQueueFile::new(&config.paths.queue_file)));

    match action {
        QueueAction::List => {
            if queue.is_empty() {
                println!("Queue is empty");
            }
            for (position, video_id) in queue.snapshot().iter().enumerate() {
                println!("{:>3}. {video_id}", position + 1);
            }
        }
        QueueAction::Add { video_id } => {
            let library = LocalVideoLibrary::open(&config.paths.videos_dir)
                .with_context(|| format!("opening {}", config.paths.videos_dir.display()))?;
            if !library.exists(&video_id) {
                warn!("Refusing to queue unknown video {}", video_id);
                bail!("Video not found: {video_id}");
            }

            if queue.enqueue(&video_id) {
                info!("Queued {} in {}", video_id, config.paths.queue_file.display());
                println!("Added {video_id} ({} queued)", queue.len());
            } else {
                println!("{video_id} is already queued");
            }
        }
        QueueAction::Remove { video_id } => {
            if queue.dequeue(&video_id) {
                info!("Dequeued {} from {}", video_id, config.paths.queue_file.display());
                println!("Removed {video_id} ({} queued)", queue.len());
            } else {
                println!("{video_id} was not queued");
            }
        }
    }

    Ok(())
}
