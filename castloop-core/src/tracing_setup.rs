//! Logging for the castloop binary.
//!
//! The console shows what the operator asked for. The run log keeps every
//! event of the current run so an unattended broadcast that went wrong can be
//! reconstructed afterwards; it is replaced on each start.

use std::fs::{File, create_dir_all};
use std::path::Path;

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File name of the run log inside the logs directory.
pub const RUN_LOG_FILE: &str = "castloop-last-run.log";

/// Installs the global subscriber: console at `console_level` (or `RUST_LOG`
/// when set) and a trace-level run log under `logs_dir` (default `logs`).
///
/// # Errors
/// - `std::io::Error` - The logs directory or run log could not be created
pub fn init_tracing(console_level: Level, logs_dir: Option<&Path>) -> std::io::Result<()> {
    let logs_dir = logs_dir.unwrap_or_else(|| Path::new("logs"));
    create_dir_all(logs_dir)?;
    let run_log = logs_dir.join(RUN_LOG_FILE);
    let writer = File::create(&run_log)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(console_filter))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new("trace")),
        )
        .init();

    tracing::info!("Logging to console at {} and to {}", console_level, run_log.display());
    Ok(())
}

/// Console verbosity accepted by `--log-level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliLogLevel {
    Error,
    Warn,
    Info,
    /// Adds queue edits and process spawns
    Debug,
    Trace,
}

impl CliLogLevel {
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Same spelling clap accepts on the command line
        let name = match self {
            CliLogLevel::Error => "error",
            CliLogLevel::Warn => "warn",
            CliLogLevel::Info => "info",
            CliLogLevel::Debug => "debug",
            CliLogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}
