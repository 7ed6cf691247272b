//! Listener binding.
//!
//! # Responsibilities
//! - Bind the gateway address synchronously so failures surface at startup
//! - Hand a non-blocking std listener to the HTTP server

use std::net::{SocketAddr, TcpListener};

use thiserror::Error;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },
}

/// Bind `address` (`host:port`, host may be a name) for the gateway.
pub fn bind(address: &str) -> Result<TcpListener, ListenerError> {
    let map_err = |source| ListenerError::Bind {
        address: address.to_string(),
        source,
    };

    let listener = TcpListener::bind(address).map_err(map_err)?;
    listener.set_nonblocking(true).map_err(map_err)?;

    let local_addr: SocketAddr = listener.local_addr().map_err(map_err)?;
    tracing::debug!(address = %local_addr, "Listener bound");

    Ok(listener)
}
