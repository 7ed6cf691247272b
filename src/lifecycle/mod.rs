//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Settings → gateway up → signal handler → initial build → watch loop
//!
//! Rebuild (startup.rs):
//!     Trigger → kill → build → [run if immediate] → pause
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → kill application → remove artifact → shutdown.rs
//! ```
//!
//! # Design Decisions
//! - No graceful drain on shutdown: the process exits right after cleanup
//! - Shutdown is broadcast so the watcher loop stops with the orchestrator

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{Orchestrator, StartupError};
