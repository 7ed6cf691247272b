//! HTTP gateway subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, build-state check, lazy start)
//!     → error_page.rs            (last build failed)
//!     → tunnel.rs                (WebSocket upgrade / event stream)
//!     → request.rs → upstream → response.rs   (everything else)
//!     → Send to client
//! ```

pub mod error_page;
pub mod request;
pub mod response;
pub mod server;
pub mod tunnel;

pub use server::{Gateway, GatewayError, GatewayState, ProxyGateway};
