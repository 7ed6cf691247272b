//! Startup orchestration and the rebuild loop.
//!
//! # Responsibilities
//! - Construct builder, supervisor and gateway from `Settings`
//! - Start the gateway, then register the termination handler
//! - Kill the application and remove the artifact once the loop stops
//! - Build once, then rebuild on every watcher trigger
//!
//! # Design Decisions
//! - Fail fast: gateway and watcher start-up errors are fatal
//! - Kill, build and run happen strictly in sequence on one task
//! - Triggers arriving during a rebuild collapse into one pending rebuild

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::Instrument;

use crate::build::{BuildError, Builder, ToolchainBuilder};
use crate::config::Settings;
use crate::http::{Gateway, GatewayError, ProxyGateway};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::notifications::{failure_summary, LogNotifier, Notifier};
use crate::process::{ProcessSupervisor, Supervisor};
use crate::watch::{TreeWatcher, WatchError, WatchFilter, DEFAULT_WINDOW};

/// Pause after each build before handling the next trigger.
pub const BUILD_PAUSE: Duration = Duration::from_millis(100);

const GREEN: &str = "\x1b[97;32;1m";
const RED: &str = "\x1b[97;31;1m";
const RESET: &str = "\x1b[0m";

const NOTIFIER_APP_NAME: &str = "Reload Build";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("gateway failed to start: {0}")]
    Gateway(#[from] GatewayError),

    #[error("file watcher failed: {0}")]
    Watch(#[from] WatchError),

    #[error("file watcher task aborted: {0}")]
    WatcherTask(#[from] tokio::task::JoinError),
}

/// Wires builder, supervisor, gateway and watcher together.
pub struct Orchestrator {
    settings: Settings,
    builder: Arc<dyn Builder>,
    supervisor: Arc<dyn Supervisor>,
    gateway: Box<dyn Gateway>,
    notifier: Option<Arc<dyn Notifier>>,
    shutdown: Shutdown,
    watch_window: Duration,
}

impl Orchestrator {
    /// Production wiring: toolchain builder, child-process supervisor and
    /// the proxy gateway, all sharing one artifact path.
    pub fn new(settings: Settings) -> Self {
        let builder = Arc::new(ToolchainBuilder::from_settings(&settings));
        let supervisor: Arc<dyn Supervisor> = Arc::new(ProcessSupervisor::from_settings(
            builder.artifact_path(),
            &settings,
        ));
        let builder: Arc<dyn Builder> = builder;
        let gateway = ProxyGateway::new(Arc::clone(&builder), Arc::clone(&supervisor));
        let notifier = settings
            .notifications
            .then(|| Arc::new(LogNotifier::new(NOTIFIER_APP_NAME)) as Arc<dyn Notifier>);

        Self::from_parts(settings, builder, supervisor, Box::new(gateway)).with_notifier(notifier)
    }

    pub fn from_parts(
        settings: Settings,
        builder: Arc<dyn Builder>,
        supervisor: Arc<dyn Supervisor>,
        gateway: Box<dyn Gateway>,
    ) -> Self {
        Self {
            settings,
            builder,
            supervisor,
            gateway,
            notifier: None,
            shutdown: Shutdown::new(),
            watch_window: DEFAULT_WINDOW,
        }
    }

    pub fn with_notifier(mut self, notifier: Option<Arc<dyn Notifier>>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Override the watcher's throttle window.
    pub fn with_watch_window(mut self, window: Duration) -> Self {
        self.watch_window = window;
        self
    }

    /// Shutdown coordinator; triggering it ends [`Orchestrator::run`].
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Start the gateway, build once, then rebuild on every change until
    /// shutdown. Any cycle in flight is cancelled before the application is
    /// killed and the artifact removed.
    pub async fn run(mut self) -> Result<(), StartupError> {
        self.gateway.run(&self.settings.proxy).await?;
        if self.settings.proxy.laddr.is_empty() {
            tracing::info!(port = self.settings.proxy.port, "Listening on port {}", self.settings.proxy.port);
        } else {
            tracing::info!(
                laddr = %self.settings.proxy.laddr,
                port = self.settings.proxy.port,
                "Listening at {}",
                self.settings.proxy.bind_address()
            );
        }

        let mut shutdown_rx = self.shutdown.subscribe();
        signals::install_shutdown_handler(self.shutdown.clone());

        // Initial build happens before any trigger is consumed.
        let interrupted = tokio::select! {
            _ = self.build_and_run() => false,
            _ = shutdown_rx.recv() => true,
        };

        let result = if interrupted {
            Ok(())
        } else {
            self.watch_loop(&mut shutdown_rx).await
        };

        // No cycle runs past this point. The gateway closes first so no
        // request relaunches the application during cleanup.
        self.shutdown.trigger();
        self.gateway.close().await;
        cleanup(self.supervisor.as_ref()).await;
        result
    }

    async fn watch_loop(&self, shutdown_rx: &mut broadcast::Receiver<()>) -> Result<(), StartupError> {
        let (trigger_tx, mut triggers) = mpsc::channel::<PathBuf>(1);
        let filter = WatchFilter::new(
            self.settings.watch_path.clone(),
            self.settings.exclude_dirs.clone(),
            self.settings.extension.clone(),
            self.settings.all_files,
        );
        let watcher = TreeWatcher::new(filter).with_window(self.watch_window);
        let mut watch_task = tokio::spawn(
            watcher
                .run(
                    move |path: &Path| match trigger_tx.try_send(path.to_path_buf()) {
                        Ok(()) | Err(TrySendError::Closed(_)) => {}
                        Err(TrySendError::Full(_)) => {
                            tracing::debug!(path = %path.display(), "Rebuild already pending");
                        }
                    },
                    self.shutdown.subscribe(),
                )
                .in_current_span(),
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => return Ok(()),
                joined = &mut watch_task => {
                    return match joined {
                        Ok(outcome) => outcome.map_err(StartupError::from),
                        Err(e) => Err(StartupError::from(e)),
                    };
                }
                Some(path) = triggers.recv() => {
                    tracing::info!(path = %path.display(), "Change detected");
                    tokio::select! {
                        _ = self.rebuild() => {}
                        _ = shutdown_rx.recv() => return Ok(()),
                    }
                }
            }
        }
    }

    /// One rebuild cycle: stop the application, then build and optionally run.
    pub async fn rebuild(&self) -> Result<(), BuildError> {
        if let Err(e) = self.supervisor.kill().await {
            tracing::warn!(error = %e, "Failed to terminate application");
        }
        self.build_and_run().await
    }

    /// Build, report the outcome, and start the artifact if `immediate`.
    pub async fn build_and_run(&self) -> Result<(), BuildError> {
        tracing::info!("Building...");
        self.notify(
            "Build Started",
            &format!("Building {}...", self.builder.binary()),
        );

        let started = Instant::now();
        let result = self.builder.build().await;
        match &result {
            Ok(()) => {
                tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "{GREEN}Build complete{RESET}");
                if self.settings.immediate {
                    if let Err(e) = self.supervisor.run().await {
                        tracing::warn!(error = %e, "Could not start application");
                    }
                }
                self.notify("Build Succeeded", "Build Complete");
            }
            Err(_) => {
                tracing::error!("{RED}Build failed{RESET}");
                let diagnostics = self.builder.errors();
                println!("{}", diagnostics);
                self.notify("Build Failed", failure_summary(&diagnostics));
            }
        }

        tokio::time::sleep(BUILD_PAUSE).await;
        result
    }

    fn notify(&self, title: &str, body: &str) {
        if let Some(notifier) = &self.notifier {
            notifier.push(title, body);
        }
    }
}

/// Best-effort teardown: kill the application and remove the artifact.
pub async fn cleanup(supervisor: &dyn Supervisor) {
    if let Err(e) = supervisor.kill().await {
        tracing::warn!(error = %e, "Failed to terminate application");
    }

    let artifact = supervisor.artifact_path();
    if let Err(e) = tokio::fs::remove_file(artifact).await {
        tracing::warn!(path = %artifact.display(), error = %e, "Failed to clean up artifact");
    }
    tracing::info!("Exiting");
}
