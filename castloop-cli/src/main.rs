//! Castloop CLI - Command-line interface
//!
//! Runs the stream control server and edits the play queue offline.

mod commands;

use castloop_core::tracing_setup::{CliLogLevel, init_tracing};
use clap::Parser;

#[derive(Parser)]
#[command(name = "castloop")]
#[command(about = "Unattended queue-driven RTMP streaming")]
#[command(version)]
struct Cli {
    /// Console log level; the run log on disk always keeps everything
    #[arg(long, global = true, default_value_t = CliLogLevel::Info, env = "CASTLOOP_LOG_LEVEL")]
    log_level: CliLogLevel,

    #[command(subcommand)]
    command: commands::Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_tracing_level(), None)?;

    commands::handle_command(cli.command).await
}
