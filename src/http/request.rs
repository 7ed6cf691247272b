//! Request preparation for the standard proxy path.
//!
//! # Responsibilities
//! - Rewrite the request URI onto the upstream target
//! - Strip hop-by-hop headers
//! - Add `X-Forwarded-For`, `X-Forwarded-Host` and `X-Forwarded-Proto`
//!
//! # Design Decisions
//! - The client's `Host` header is passed through unchanged
//! - Upstream requests always go out as HTTP/1.1

use std::net::IpAddr;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::{Request, Uri, Version};

use crate::config::ProxyTarget;
use crate::http::response::strip_hop_by_hop;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("cannot build upstream URI: {0}")]
    Uri(#[from] axum::http::uri::InvalidUri),
}

/// Scheme the client used to reach the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientScheme {
    Http,
    Https,
}

impl ClientScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientScheme::Http => "http",
            ClientScheme::Https => "https",
        }
    }
}

/// Turn a client request into the request sent upstream.
pub fn forward_request(
    request: Request<Body>,
    target: &ProxyTarget,
    client_ip: IpAddr,
    scheme: ClientScheme,
) -> Result<Request<Body>, ForwardError> {
    let (mut parts, body) = request.into_parts();

    parts.uri = upstream_uri(target, &parts.uri)?;
    parts.version = Version::HTTP_11;

    strip_hop_by_hop(&mut parts.headers);
    let original_host = parts
        .headers
        .get(header::HOST)
        .cloned()
        .or_else(|| {
            parts
                .uri
                .authority()
                .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
        });
    add_forwarded_headers(&mut parts.headers, client_ip, original_host, scheme);

    Ok(Request::from_parts(parts, body))
}

/// Absolute upstream URI: target scheme and authority, joined path, merged query.
pub fn upstream_uri(target: &ProxyTarget, original: &Uri) -> Result<Uri, ForwardError> {
    let path = join_path(target.url().path(), original.path());
    let query = match (target.url().query(), original.query()) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => Some(format!("{a}&{b}")),
        (Some(a), _) if !a.is_empty() => Some(a.to_string()),
        (_, Some(b)) if !b.is_empty() => Some(b.to_string()),
        _ => None,
    };

    let mut uri = format!("{}://{}{}", target.scheme(), target.authority(), path);
    if let Some(query) = query {
        uri.push('?');
        uri.push_str(&query);
    }
    Ok(uri.parse()?)
}

fn join_path(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

fn add_forwarded_headers(
    headers: &mut HeaderMap,
    client_ip: IpAddr,
    original_host: Option<HeaderValue>,
    scheme: ClientScheme,
) {
    let forwarded_for = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, client_ip),
        None => client_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }

    if let Some(host) = original_host {
        headers.insert(X_FORWARDED_HOST, host);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static(scheme.as_str()));
}
