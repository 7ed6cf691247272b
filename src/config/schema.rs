//! Configuration schema definitions.
//!
//! `Settings` holds every run parameter of the live-reload loop and is
//! built once at startup. `ProxyConfig` is the gateway subset, which can
//! also be read from a JSON or TOML file.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::validation::ValidationError;
use crate::process::OutputSink;

/// Gateway (listener + upstream) configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProxyConfig {
    /// Listen address. Empty means all interfaces.
    pub laddr: String,

    /// Listen port. `0` asks the OS for an ephemeral port.
    pub port: u16,

    /// Upstream URL the gateway forwards to (e.g. "http://localhost:3001").
    pub proxy_to: String,

    /// Path to certificate file (PEM).
    pub cert_file: Option<String>,

    /// Path to private key file (PEM).
    pub key_file: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            laddr: String::new(),
            port: 3000,
            proxy_to: "http://localhost:3001".to_string(),
            cert_file: None,
            key_file: None,
        }
    }
}

impl ProxyConfig {
    /// `laddr:port`, defaulting the host to every interface.
    pub fn bind_address(&self) -> String {
        let host = if self.laddr.is_empty() {
            "0.0.0.0"
        } else {
            self.laddr.as_str()
        };
        format!("{}:{}", host, self.port)
    }

    /// The TLS pair, if one is configured.
    ///
    /// A partial pair is a configuration error.
    pub fn tls(&self) -> Result<Option<TlsConfig>, ValidationError> {
        let cert = self.cert_file.as_deref().filter(|s| !s.is_empty());
        let key = self.key_file.as_deref().filter(|s| !s.is_empty());
        match (cert, key) {
            (Some(cert), Some(key)) => Ok(Some(TlsConfig {
                cert_path: cert.to_string(),
                key_path: key.to_string(),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(ValidationError::PartialTls { missing: "keyFile" }),
            (None, Some(_)) => Err(ValidationError::PartialTls { missing: "certFile" }),
        }
    }

    /// Parse `proxy_to` into the upstream target.
    pub fn target(&self) -> Result<ProxyTarget, ValidationError> {
        ProxyTarget::parse(&self.proxy_to)
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Parsed upstream URL the gateway forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    url: Url,
    authority: String,
}

impl ProxyTarget {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let url = Url::parse(raw).map_err(|e| ValidationError::InvalidProxyTarget {
            value: raw.to_string(),
            reason: e.to_string(),
        })?;

        if url.scheme() != "http" {
            return Err(ValidationError::InvalidProxyTarget {
                value: raw.to_string(),
                reason: format!("unsupported scheme '{}', upstream must be http", url.scheme()),
            });
        }

        let host = url.host_str().ok_or_else(|| ValidationError::InvalidProxyTarget {
            value: raw.to_string(),
            reason: "missing host".to_string(),
        })?;
        let port = url.port_or_known_default().unwrap_or(80);
        let authority = format!("{}:{}", host, port);

        Ok(Self { url, authority })
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// `host:port`, with the scheme's default port filled in.
    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl std::fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}://{}", self.scheme(), self.authority)
    }
}

/// Complete run parameters, constructed once and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Gateway listener and upstream.
    pub proxy: ProxyConfig,

    /// Port the supervised application listens on.
    pub app_port: u16,

    /// Artifact name; empty falls back to `bin`.
    pub bin: String,

    /// Root of the watched tree.
    pub watch_path: PathBuf,

    /// Directory the toolchain runs in.
    pub build_path: PathBuf,

    /// Directory the artifact is written to.
    pub work_dir: PathBuf,

    /// Subtrees never registered with the watcher.
    pub exclude_dirs: Vec<PathBuf>,

    /// Extra arguments appended to the build invocation.
    pub build_args: Vec<String>,

    /// Arguments passed to the supervised process.
    pub app_args: Vec<String>,

    /// Where the supervised process's stdout goes.
    pub app_output: OutputSink,

    /// Start the artifact right after each successful build.
    pub immediate: bool,

    /// Rebuild on any modified file, not only source files.
    pub all_files: bool,

    /// Toolchain executable (invoked as `<toolchain> build -o ...`).
    pub toolchain: String,

    /// Source file extension that triggers rebuilds, without the dot.
    pub extension: String,

    /// Name attached to the root logging span.
    pub log_prefix: String,

    /// Push build notifications.
    pub notifications: bool,

    /// Prometheus endpoint, disabled when `None`.
    pub metrics_address: Option<SocketAddr>,

    /// Extra environment for the build and the supervised process.
    pub env: Vec<(String, String)>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            proxy: ProxyConfig::default(),
            app_port: 3001,
            bin: "reload-bin".to_string(),
            watch_path: PathBuf::from("."),
            build_path: PathBuf::from("."),
            work_dir: PathBuf::from("."),
            exclude_dirs: Vec::new(),
            build_args: Vec::new(),
            app_args: Vec::new(),
            app_output: OutputSink::Inherit,
            immediate: false,
            all_files: false,
            toolchain: "go".to_string(),
            extension: "go".to_string(),
            log_prefix: "reload".to_string(),
            notifications: false,
            metrics_address: None,
            env: Vec::new(),
        }
    }
}
