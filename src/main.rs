//! reload: live-reload harness
//!
//! # Architecture Overview
//!
//! ```text
//!   source tree ──▶ watch ──trigger──▶ lifecycle::Orchestrator
//!                                         │ kill → build → [run]
//!                                         ▼
//!                     build::ToolchainBuilder    process::ProcessSupervisor
//!                              │ last result              │ child process
//!                              ▼                          ▼
//!   Client ──────▶ net listener ──▶ http gateway ──▶ application (PORT)
//!                                   │ error page while the build is broken
//!                                   │ tunnel for WebSocket / event streams
//! ```

use std::process::ExitCode;

use clap::Parser;
use tracing::Instrument;

use reload::cli::{Cli, Command};
use reload::config::env::load_env_file;
use reload::observability::{logging, metrics};
use reload::Orchestrator;

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level.as_deref());

    let work_dir = std::env::current_dir()?;

    if cli.command() == Command::Env {
        for (key, value) in load_env_file(&work_dir)? {
            println!("{}: {}", key, value);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let settings = match cli.into_settings(&work_dir) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return Ok(ExitCode::FAILURE);
        }
    };

    if let Some(addr) = settings.metrics_address {
        metrics::init_metrics(addr);
    }

    let span = logging::root_span(&settings.log_prefix);
    tracing::info!(parent: &span, version = env!("CARGO_PKG_VERSION"), "reload starting");

    match Orchestrator::new(settings).run().instrument(span).await {
        // Only a handled termination signal ends the loop cleanly.
        Ok(()) => Ok(ExitCode::FAILURE),
        Err(e) => {
            tracing::error!(error = %e, "Fatal error");
            Ok(ExitCode::FAILURE)
        }
    }
}
