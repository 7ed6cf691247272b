//! Process supervision subsystem.
//!
//! # Data Flow
//! ```text
//! gateway request ──▶ supervisor.run()   (lazy start / restart on new mtime)
//! rebuild cycle   ──▶ supervisor.kill()  (before each build)
//!                          │
//!                          ▼
//!                 single child process ──stdout──▶ output.rs sink
//! ```
//!
//! # Design Decisions
//! - One mutex guards the handle; lazy starts and kills never interleave
//! - Restart policy compares artifact modification times only

pub mod output;
pub mod supervisor;

pub use output::OutputSink;
pub use supervisor::{ProcessError, ProcessHandle, ProcessSupervisor, Supervisor};
