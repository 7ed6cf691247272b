//! Shared fakes and mock upstreams for integration tests.
#![allow(dead_code)]

use std::convert::Infallible;
use std::fs::Metadata;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;

use reload::build::{BuildError, Builder};
use reload::config::ProxyConfig;
use reload::http::{Gateway, GatewayError};
use reload::process::{ProcessError, ProcessHandle, Supervisor};

pub const HELLO: &str = "Hello world\n";

/// Ordered record of calls made on the fakes.
pub type CallLog = Arc<Mutex<Vec<&'static str>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// In-memory builder whose outcome is scripted by the test.
pub struct MockBuilder {
    errors: Mutex<String>,
    next_failure: Mutex<Option<String>>,
    delay: Mutex<Duration>,
    builds: AtomicUsize,
    log: CallLog,
}

impl MockBuilder {
    pub fn new(log: CallLog) -> Self {
        Self {
            errors: Mutex::new(String::new()),
            next_failure: Mutex::new(None),
            delay: Mutex::new(Duration::ZERO),
            builds: AtomicUsize::new(0),
            log,
        }
    }

    /// A builder whose last build already failed with `diagnostics`.
    pub fn failed(diagnostics: &str) -> Self {
        let builder = Self::new(call_log());
        *builder.errors.lock().unwrap() = diagnostics.to_string();
        builder
    }

    /// Make every following build fail with `diagnostics` (or succeed on `None`).
    pub fn fail_with(&self, diagnostics: Option<&str>) {
        *self.next_failure.lock().unwrap() = diagnostics.map(str::to_string);
    }

    /// Make every following build take `delay` before reporting.
    pub fn slow(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Builder for MockBuilder {
    async fn build(&self) -> Result<(), BuildError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push("build");

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failure = self.next_failure.lock().unwrap().clone();
        match failure {
            Some(diagnostics) => {
                *self.errors.lock().unwrap() = diagnostics.clone();
                Err(BuildError::Failed { diagnostics })
            }
            None => {
                self.errors.lock().unwrap().clear();
                Ok(())
            }
        }
    }

    fn binary(&self) -> &str {
        "mock-bin"
    }

    fn errors(&self) -> String {
        self.errors.lock().unwrap().clone()
    }
}

/// Supervisor that records calls instead of launching processes.
pub struct MockSupervisor {
    artifact: PathBuf,
    did_run: AtomicBool,
    runs: AtomicU32,
    kills: AtomicU32,
    log: CallLog,
}

impl MockSupervisor {
    pub fn new(log: CallLog) -> Self {
        Self::with_artifact(log, "mock-bin")
    }

    pub fn with_artifact(log: CallLog, artifact: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
            did_run: AtomicBool::new(false),
            runs: AtomicU32::new(0),
            kills: AtomicU32::new(0),
            log,
        }
    }

    pub fn did_run(&self) -> bool {
        self.did_run.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> u32 {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn kills(&self) -> u32 {
        self.kills.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Supervisor for MockSupervisor {
    async fn run(&self) -> Result<ProcessHandle, ProcessError> {
        self.did_run.store(true, Ordering::SeqCst);
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push("run");
        Ok(ProcessHandle {
            pid: 1,
            artifact_modified: SystemTime::UNIX_EPOCH,
        })
    }

    async fn kill(&self) -> Result<(), ProcessError> {
        self.kills.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push("kill");
        Ok(())
    }

    async fn info(&self) -> Result<Metadata, ProcessError> {
        tokio::fs::metadata(&self.artifact)
            .await
            .map_err(|source| ProcessError::Artifact {
                path: self.artifact.clone(),
                source,
            })
    }

    fn artifact_path(&self) -> &Path {
        &self.artifact
    }
}

/// Gateway that only records whether it was started and closed.
#[derive(Clone, Default)]
pub struct MockGateway {
    pub started: Arc<AtomicBool>,
    pub closed: Arc<AtomicBool>,
}

#[async_trait]
impl Gateway for MockGateway {
    async fn run(&mut self, _config: &ProxyConfig) -> Result<(), GatewayError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Serve `router` on an ephemeral localhost port.
pub async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Upstream answering every request with [`HELLO`], counting hits.
pub async fn start_hello_upstream() -> (SocketAddr, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let router = Router::new().fallback(move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            HELLO
        }
    });
    (serve(router).await, hits)
}

/// Upstream echoing WebSocket messages on `/ws`.
pub async fn start_echo_upstream() -> SocketAddr {
    async fn upgrade(ws: WebSocketUpgrade) -> impl IntoResponse {
        ws.on_upgrade(echo)
    }

    async fn echo(mut socket: WebSocket) {
        while let Some(Ok(message)) = socket.recv().await {
            match message {
                Message::Text(_) | Message::Binary(_) => {
                    if socket.send(message).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    }

    serve(Router::new().route("/ws", get(upgrade))).await
}

/// Upstream emitting three server-sent events on `/events`.
pub async fn start_event_upstream() -> SocketAddr {
    async fn events() -> impl IntoResponse {
        let stream = futures_util::stream::iter(
            ["one", "two", "three"]
                .into_iter()
                .map(|data| Ok::<_, Infallible>(Event::default().data(data))),
        );
        Sse::new(stream)
    }

    serve(Router::new().route("/events", get(events))).await
}

/// Gateway config bound to an ephemeral localhost port.
pub fn gateway_config(upstream: SocketAddr) -> ProxyConfig {
    ProxyConfig {
        laddr: "127.0.0.1".to_string(),
        port: 0,
        proxy_to: format!("http://{}", upstream),
        cert_file: None,
        key_file: None,
    }
}
