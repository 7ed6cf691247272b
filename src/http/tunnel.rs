//! Raw tunnelling for WebSocket upgrades and server-sent event streams.
//!
//! A tunnelled request gets its own upstream TCP connection. The request
//! goes out with its original headers, `Connection` and `Upgrade`
//! included. When the upstream switches protocols, both connections are
//! taken over and spliced byte-for-byte until either side closes. Any
//! other upstream answer (an event stream, an error) is streamed back
//! as-is over the dedicated connection.

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Request, StatusCode, Uri, Version};
use axum::response::{IntoResponse, Response};
use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use crate::config::ProxyTarget;
use crate::net::{TunnelGuard, TunnelTracker};

/// Body of the response sent when the upstream cannot be dialled.
pub const BACKEND_UNREACHABLE: &str = "Error contacting backend server.";

/// Why a request bypasses the standard proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelKind {
    WebSocket,
    EventStream,
}

/// Classify a request by its `Upgrade` and `Accept` headers.
pub fn tunnel_kind(headers: &HeaderMap) -> Option<TunnelKind> {
    let header_has = |name: header::HeaderName, wanted: &str| {
        headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .any(|token| {
                let token = token.split(';').next().unwrap_or_default().trim();
                token.eq_ignore_ascii_case(wanted)
            })
    };

    if header_has(header::UPGRADE, "websocket") {
        Some(TunnelKind::WebSocket)
    } else if header_has(header::ACCEPT, "text/event-stream") {
        Some(TunnelKind::EventStream)
    } else {
        None
    }
}

/// Relay a request over a dedicated upstream connection.
pub async fn tunnel(
    mut request: Request<Body>,
    kind: TunnelKind,
    target: &ProxyTarget,
    tunnels: &TunnelTracker,
) -> Response {
    let client_upgrade = request.extensions_mut().remove::<OnUpgrade>();

    let stream = match TcpStream::connect(target.authority()).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(target = %target, error = %e, "Error dialing tunnel backend");
            return (StatusCode::INTERNAL_SERVER_ERROR, BACKEND_UNREACHABLE).into_response();
        }
    };

    let guard = Arc::new(tunnels.track());
    tracing::debug!(tunnel = %guard.id(), kind = ?kind, target = %target, "Tunnel opened");

    let (mut sender, connection) =
        match hyper::client::conn::http1::handshake(TokioIo::new(stream)).await {
            Ok(parts) => parts,
            Err(e) => {
                tracing::warn!(tunnel = %guard.id(), error = %e, "Tunnel handshake failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, BACKEND_UNREACHABLE).into_response();
            }
        };

    let connection_guard = Arc::clone(&guard);
    tokio::spawn(async move {
        if let Err(e) = connection.with_upgrades().await {
            tracing::debug!(tunnel = %connection_guard.id(), error = %e, "Tunnel connection ended");
        }
        drop(connection_guard);
    });

    let upstream_request = match into_origin_form(request, target) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(tunnel = %guard.id(), error = %e, "Cannot rewrite tunnel request");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    let mut upstream_response = match sender.send_request(upstream_request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(tunnel = %guard.id(), error = %e, "Error copying request to target");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    if upstream_response.status() != StatusCode::SWITCHING_PROTOCOLS {
        let (parts, body) = upstream_response.into_parts();
        return Response::from_parts(parts, Body::new(body));
    }

    let Some(client_upgrade) = client_upgrade else {
        tracing::warn!(tunnel = %guard.id(), "Client connection cannot be taken over");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Connection cannot be taken over",
        )
            .into_response();
    };
    let upstream_upgrade = hyper::upgrade::on(&mut upstream_response);

    tokio::spawn(splice(client_upgrade, upstream_upgrade, guard));

    let (parts, _) = upstream_response.into_parts();
    Response::from_parts(parts, Body::empty())
}

/// Rewrite an absolute or origin-form request into origin-form for the
/// dedicated upstream connection, keeping every header.
fn into_origin_form(
    request: Request<Body>,
    target: &ProxyTarget,
) -> Result<Request<Body>, axum::http::uri::InvalidUri> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    parts.uri = path_and_query.parse::<Uri>()?;
    parts.version = Version::HTTP_11;

    if !parts.headers.contains_key(header::HOST) {
        if let Ok(host) = HeaderValue::from_str(target.authority()) {
            parts.headers.insert(header::HOST, host);
        }
    }

    Ok(Request::from_parts(parts, body))
}

/// Copy bytes both ways until either direction finishes, then close both.
async fn splice(client: OnUpgrade, upstream: OnUpgrade, guard: Arc<TunnelGuard>) {
    let (client, upstream) = match tokio::try_join!(client, upstream) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(tunnel = %guard.id(), error = %e, "Tunnel upgrade failed");
            return;
        }
    };

    let (mut client_read, mut client_write) = tokio::io::split(TokioIo::new(client));
    let (mut upstream_read, mut upstream_write) = tokio::io::split(TokioIo::new(upstream));

    let outcome = tokio::select! {
        result = tokio::io::copy(&mut client_read, &mut upstream_write) => ("client", result),
        result = tokio::io::copy(&mut upstream_read, &mut client_write) => ("upstream", result),
    };

    match outcome {
        (side, Ok(bytes)) => {
            tracing::debug!(tunnel = %guard.id(), closed_by = side, bytes, "Tunnel splice finished");
        }
        (side, Err(e)) => {
            tracing::debug!(tunnel = %guard.id(), closed_by = side, error = %e, "Tunnel splice failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn detects_websocket_upgrade_case_insensitively() {
        assert_eq!(
            tunnel_kind(&headers(&[("upgrade", "WebSocket")])),
            Some(TunnelKind::WebSocket)
        );
    }

    #[test]
    fn detects_event_stream_accept() {
        assert_eq!(
            tunnel_kind(&headers(&[("accept", "Text/Event-Stream")])),
            Some(TunnelKind::EventStream)
        );
        assert_eq!(
            tunnel_kind(&headers(&[("accept", "text/html, text/event-stream;q=0.9")])),
            Some(TunnelKind::EventStream)
        );
    }

    #[test]
    fn plain_requests_are_not_tunnelled() {
        assert_eq!(tunnel_kind(&headers(&[("accept", "text/html")])), None);
        assert_eq!(tunnel_kind(&headers(&[("upgrade", "h2c")])), None);
        assert_eq!(tunnel_kind(&HeaderMap::new()), None);
    }

    #[test]
    fn origin_form_keeps_upgrade_headers() {
        let target = ProxyTarget::parse("http://127.0.0.1:3001").unwrap();
        let request = Request::builder()
            .uri("http://example.test/socket?room=1")
            .header(header::CONNECTION, "Upgrade")
            .header(header::UPGRADE, "websocket")
            .body(Body::empty())
            .unwrap();

        let rewritten = into_origin_form(request, &target).unwrap();

        assert_eq!(rewritten.uri(), "/socket?room=1");
        assert_eq!(rewritten.headers()[header::CONNECTION], "Upgrade");
        assert_eq!(rewritten.headers()[header::UPGRADE], "websocket");
        assert_eq!(rewritten.headers()[header::HOST], "127.0.0.1:3001");
    }
}
