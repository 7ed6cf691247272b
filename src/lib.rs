//! Live-reload harness for locally built web applications.
//!
//! Watches a source tree, rebuilds on change, supervises one instance of
//! the built artifact and fronts it with a reverse proxy that serves the
//! build diagnostics whenever the last build failed.

pub mod build;
pub mod cli;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod process;
pub mod watch;

pub use config::schema::{ProxyConfig, Settings};
pub use http::ProxyGateway;
pub use lifecycle::{Orchestrator, Shutdown};
