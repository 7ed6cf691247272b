//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Gateway startup
//!     → listener.rs (bind, fail fast)
//!     → tls.rs (optional PEM key pair)
//!     → Hand off to HTTP layer
//!
//! Per tunneled connection:
//!     → connection.rs (tunnel id, active count)
//! ```
//!
//! # Design Decisions
//! - Bind happens before the server task is spawned, so bind errors are fatal
//! - TLS is optional and handled transparently

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{TunnelGuard, TunnelId, TunnelTracker};
pub use listener::ListenerError;
pub use tls::TlsError;
