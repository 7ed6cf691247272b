//! Filesystem watch subsystem.
//!
//! # Data Flow
//! ```text
//! OS notifications (notify, one registration per directory)
//!     → watcher.rs (WatchEvent: created / modified / removed)
//!     → filter.rs (exclusions, source extension)
//!     → throttle.rs (first event per window wins)
//!     → on_change(path) → orchestrator trigger channel
//! ```
//!
//! # Design Decisions
//! - Excluded, `vendor` and dot-prefixed directories prune their subtree
//! - Bursts are dropped, not queued: one rebuild per window
//! - Registration failures are logged and skipped

pub mod filter;
pub mod throttle;
pub mod watcher;

pub use filter::WatchFilter;
pub use throttle::{Throttle, DEFAULT_WINDOW};
pub use watcher::{Dispatcher, TreeWatcher, WatchError, WatchEvent, WatchEventKind, WatchRegistry};
