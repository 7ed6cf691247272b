//! Build subsystem.
//!
//! # Data Flow
//! ```text
//! rebuild trigger
//!     → builder.rs (toolchain invocation, output capture)
//!     → status.rs (atomic swap of the latest BuildResult)
//!     → gateway reads diagnostics on every request
//! ```
//!
//! # Design Decisions
//! - One build at a time; the artifact path is shared with the running process
//! - A failed build leaves the previous artifact on disk untouched
//! - Empty diagnostics is the only success signal readers need

pub mod builder;
pub mod status;

pub use builder::{artifact_name, BuildError, Builder, ToolchainBuilder};
pub use status::{BuildResult, BuildState};
