//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - TLS certificate and key come as a pair or not at all
//! - Upstream URL is an absolute http URL with a host
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("TLS requires both certFile and keyFile; {missing} is missing")]
    PartialTls { missing: &'static str },

    #[error("invalid proxyTo '{value}': {reason}")]
    InvalidProxyTarget { value: String, reason: String },
}

/// Check a gateway configuration, collecting every problem found.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.tls() {
        errors.push(e);
    }
    if let Err(e) = config.target() {
        errors.push(e);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
