//! The gateway: HTTP(S) listener in front of the supervised application.
//!
//! # Responsibilities
//! - Bind the configured address (plain or TLS)
//! - Serve the build-failure page while the last build is broken
//! - Lazily (re)start the application before forwarding
//! - Tunnel WebSocket and event-stream requests, proxy everything else
//! - Wire up middleware (tracing, request ID)

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::Handle;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use tokio::task::JoinHandle;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::build::Builder;
use crate::config::{ProxyConfig, ProxyTarget, ValidationError};
use crate::http::error_page::error_page_response;
use crate::http::request::{forward_request, ClientScheme};
use crate::http::response::into_client_response;
use crate::http::tunnel::{tunnel, tunnel_kind};
use crate::net::{self, ListenerError, TlsError, TunnelTracker};
use crate::observability::metrics::{self, RequestMode};
use crate::process::Supervisor;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ValidationError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("gateway is already running on {0}")]
    AlreadyRunning(SocketAddr),
}

/// A listener that can be started and stopped.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Bind and start serving in the background. Returns once bound.
    async fn run(&mut self, config: &ProxyConfig) -> Result<(), GatewayError>;

    /// Stop accepting connections and release the listener.
    async fn close(&mut self);
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub builder: Arc<dyn Builder>,
    pub supervisor: Arc<dyn Supervisor>,
    pub target: ProxyTarget,
    pub scheme: ClientScheme,
    pub client: Client<HttpConnector, Body>,
    pub tunnels: TunnelTracker,
}

struct Running {
    handle: Handle,
    task: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// Reverse proxy in front of the supervised application.
pub struct ProxyGateway {
    builder: Arc<dyn Builder>,
    supervisor: Arc<dyn Supervisor>,
    tunnels: TunnelTracker,
    running: Option<Running>,
}

impl ProxyGateway {
    pub fn new(builder: Arc<dyn Builder>, supervisor: Arc<dyn Supervisor>) -> Self {
        Self {
            builder,
            supervisor,
            tunnels: TunnelTracker::new(),
            running: None,
        }
    }

    /// Address actually bound, once running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|r| r.local_addr)
    }

    pub fn tunnels(&self) -> &TunnelTracker {
        &self.tunnels
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: GatewayState) -> Router {
        Router::new()
            .route("/{*path}", any(gateway_handler))
            .route("/", any(gateway_handler))
            .with_state(state)
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }
}

#[async_trait]
impl Gateway for ProxyGateway {
    async fn run(&mut self, config: &ProxyConfig) -> Result<(), GatewayError> {
        if let Some(running) = &self.running {
            return Err(GatewayError::AlreadyRunning(running.local_addr));
        }

        let target = config.target()?;
        let tls = config.tls()?;

        // TLS material is checked before the port is taken.
        let rustls = match &tls {
            Some(tls) => Some(
                net::tls::load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path))
                    .await?,
            ),
            None => None,
        };

        let address = config.bind_address();
        let listener = net::listener::bind(&address)?;
        let local_addr = listener.local_addr().map_err(|source| ListenerError::Bind {
            address: address.clone(),
            source,
        })?;

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        let state = GatewayState {
            builder: Arc::clone(&self.builder),
            supervisor: Arc::clone(&self.supervisor),
            target: target.clone(),
            scheme: if rustls.is_some() {
                ClientScheme::Https
            } else {
                ClientScheme::Http
            },
            client,
            tunnels: self.tunnels.clone(),
        };
        let app = Self::build_router(state).into_make_service_with_connect_info::<SocketAddr>();

        let handle = Handle::new();
        let task = match rustls {
            Some(rustls) => {
                let server = axum_server::from_tcp_rustls(listener, rustls).handle(handle.clone());
                tokio::spawn(async move {
                    if let Err(e) = server.serve(app).await {
                        tracing::error!(error = %e, "Gateway stopped with error");
                    }
                })
            }
            None => {
                let server = axum_server::from_tcp(listener).handle(handle.clone());
                tokio::spawn(async move {
                    if let Err(e) = server.serve(app).await {
                        tracing::error!(error = %e, "Gateway stopped with error");
                    }
                })
            }
        };

        tracing::info!(
            address = %local_addr,
            upstream = %target,
            tls = tls.is_some(),
            "Gateway listening"
        );

        self.running = Some(Running {
            handle,
            task,
            local_addr,
        });
        Ok(())
    }

    async fn close(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };

        running.handle.shutdown();
        if tokio::time::timeout(CLOSE_TIMEOUT, running.task).await.is_err() {
            tracing::warn!(address = %running.local_addr, "Gateway did not stop in time");
        }
        tracing::info!(address = %running.local_addr, "Gateway closed");
    }
}

/// Serve the error page, or start the application and relay to it.
async fn gateway_handler(
    State(state): State<GatewayState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let diagnostics = state.builder.errors();
    if !diagnostics.is_empty() {
        metrics::record_request(RequestMode::ErrorPage);
        return error_page_response(&diagnostics);
    }

    if let Err(e) = state.supervisor.run().await {
        tracing::warn!(error = %e, "Could not start application, forwarding anyway");
    }

    if let Some(kind) = tunnel_kind(request.headers()) {
        metrics::record_request(RequestMode::Tunnel);
        return tunnel(request, kind, &state.target, &state.tunnels).await;
    }

    metrics::record_request(RequestMode::Proxy);
    let request = match forward_request(request, &state.target, addr.ip(), state.scheme) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Cannot rewrite request");
            return (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response();
        }
    };

    match state.client.request(request).await {
        Ok(response) => into_client_response(response),
        Err(e) => {
            tracing::warn!(upstream = %state.target, error = %e, "Upstream error");
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}
