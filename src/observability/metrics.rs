//! Metrics collection and exposition.
//!
//! # Metrics
//! - `reload_builds_total` (counter): builds by result (success, failure)
//! - `reload_build_duration_seconds` (histogram): toolchain wall time
//! - `reload_process_starts_total` (counter): supervised process launches
//! - `reload_process_kills_total` (counter): supervised process terminations
//! - `reload_requests_total` (counter): gateway requests by mode
//! - `reload_active_tunnels` (gauge): open upgrade/stream relays
//!
//! Recording is a no-op until `init_metrics` installs the exporter.

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// How the gateway answered a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    ErrorPage,
    Proxy,
    Tunnel,
}

impl RequestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestMode::ErrorPage => "error_page",
            RequestMode::Proxy => "proxy",
            RequestMode::Tunnel => "tunnel",
        }
    }
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_build(success: bool, elapsed: Duration) {
    let result = if success { "success" } else { "failure" };
    counter!("reload_builds_total", "result" => result).increment(1);
    histogram!("reload_build_duration_seconds").record(elapsed.as_secs_f64());
}

pub fn record_process_start() {
    counter!("reload_process_starts_total").increment(1);
}

pub fn record_process_kill() {
    counter!("reload_process_kills_total").increment(1);
}

pub fn record_request(mode: RequestMode) {
    counter!("reload_requests_total", "mode" => mode.as_str()).increment(1);
}

pub fn record_tunnel_opened() {
    gauge!("reload_active_tunnels").increment(1.0);
}

pub fn record_tunnel_closed() {
    gauge!("reload_active_tunnels").decrement(1.0);
}
