//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGINT (Ctrl+C) or, on unix, SIGTERM
//! - Broadcast shutdown once; the orchestrator tears down after its loop stops
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - No graceful drain: in-flight proxy connections are dropped

use std::future::Future;

use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::lifecycle::Shutdown;

/// Resolve with the name of the first termination signal received.
pub async fn wait_for_signal() -> &'static str {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => "SIGINT",
        _ = terminate => "SIGTERM",
    }
}

/// Trigger `shutdown` when a termination signal arrives.
///
/// Teardown belongs to whoever owns the shutdown receiver, after it has
/// stopped its own work.
pub fn install_shutdown_handler(shutdown: Shutdown) -> JoinHandle<()> {
    install_with(wait_for_signal(), shutdown)
}

/// Like [`install_shutdown_handler`], fired by an arbitrary future.
///
/// The task runs in the caller's span.
pub fn install_with<S>(signal: S, shutdown: Shutdown) -> JoinHandle<()>
where
    S: Future<Output = &'static str> + Send + 'static,
{
    tokio::spawn(
        async move {
            let signal = signal.await;
            tracing::info!(signal, "Received signal");
            shutdown.trigger();
        }
        .in_current_span(),
    )
}
