//! Supervisor for the single running instance of the artifact.
//!
//! # Responsibilities
//! - Launch the artifact lazily, at most one instance at a time
//! - Restart transparently when the artifact on disk is newer than the
//!   running instance
//! - Terminate on demand, never wedging the state machine
//!
//! # State Machine
//! ```text
//! NoProcess ──run()──▶ Running ──kill()──▶ NoProcess
//!                       │  ▲
//!                       └──┘ run(): same mtime → same handle
//!                            changed mtime / exited → relaunch
//! ```

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use crate::config::Settings;
use crate::observability::metrics;
use crate::process::output::OutputSink;

/// Error type for process supervision.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("artifact {} unavailable: {source}", path.display())]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to terminate process {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Identity of a launched instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessHandle {
    /// OS process id.
    pub pid: u32,
    /// Artifact modification time observed at launch.
    pub artifact_modified: SystemTime,
}

/// Owns the running instance of the built artifact.
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Ensure an instance of the current artifact is running.
    async fn run(&self) -> Result<ProcessHandle, ProcessError>;

    /// Terminate the running instance, if any.
    async fn kill(&self) -> Result<(), ProcessError>;

    /// Metadata of the artifact on disk.
    async fn info(&self) -> Result<Metadata, ProcessError>;

    /// Path of the artifact this supervisor launches.
    fn artifact_path(&self) -> &Path;
}

struct Running {
    child: Child,
    handle: ProcessHandle,
}

/// `Supervisor` backed by a real child process.
pub struct ProcessSupervisor {
    artifact: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    sink: OutputSink,
    current: Mutex<Option<Running>>,
}

impl ProcessSupervisor {
    pub fn new(artifact: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            artifact: artifact.into(),
            args,
            env: Vec::new(),
            sink: OutputSink::default(),
            current: Mutex::new(None),
        }
    }

    pub fn from_settings(artifact: impl Into<PathBuf>, settings: &Settings) -> Self {
        Self::new(artifact, settings.app_args.clone())
            .with_env(settings.env.clone())
            .with_output(settings.app_output)
    }

    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    pub fn with_output(mut self, sink: OutputSink) -> Self {
        self.sink = sink;
        self
    }

    /// Handle of the running instance, if any.
    pub async fn current(&self) -> Option<ProcessHandle> {
        self.current.lock().await.as_ref().map(|r| r.handle)
    }

    async fn artifact_modified(&self) -> Result<SystemTime, ProcessError> {
        let map_err = |source| ProcessError::Artifact {
            path: self.artifact.clone(),
            source,
        };
        tokio::fs::metadata(&self.artifact)
            .await
            .and_then(|m| m.modified())
            .map_err(map_err)
    }

    fn launch(&self, artifact_modified: SystemTime) -> Result<Running, ProcessError> {
        let mut child = Command::new(&self.artifact)
            .args(&self.args)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdout(self.sink.stdio())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                path: self.artifact.clone(),
                source,
            })?;

        let pid = child.id().unwrap_or_default();
        self.sink.attach(pid, child.stdout.take());
        metrics::record_process_start();

        tracing::info!(pid, artifact = %self.artifact.display(), "Process started");

        Ok(Running {
            child,
            handle: ProcessHandle {
                pid,
                artifact_modified,
            },
        })
    }
}

/// Kill and reap. An instance that already exited counts as terminated.
async fn terminate(running: &mut Running) -> Result<(), ProcessError> {
    let pid = running.handle.pid;
    if let Ok(Some(status)) = running.child.try_wait() {
        tracing::debug!(pid, %status, "Process had already exited");
        return Ok(());
    }

    metrics::record_process_kill();
    running
        .child
        .kill()
        .await
        .map_err(|source| ProcessError::Kill { pid, source })?;
    tracing::info!(pid, "Process terminated");
    Ok(())
}

#[async_trait]
impl Supervisor for ProcessSupervisor {
    async fn run(&self) -> Result<ProcessHandle, ProcessError> {
        let mut current = self.current.lock().await;
        let modified = self.artifact_modified().await?;

        if let Some(running) = current.as_mut() {
            let exited = matches!(running.child.try_wait(), Ok(Some(_)));
            if !exited && running.handle.artifact_modified == modified {
                return Ok(running.handle);
            }

            if exited {
                tracing::info!(pid = running.handle.pid, "Process exited, relaunching");
            } else {
                tracing::info!(pid = running.handle.pid, "Artifact changed, restarting process");
            }
            if let Err(e) = terminate(running).await {
                tracing::warn!(error = %e, "Failed to terminate stale process");
            }
            *current = None;
        }

        let running = self.launch(modified)?;
        let handle = running.handle;
        *current = Some(running);
        Ok(handle)
    }

    async fn kill(&self) -> Result<(), ProcessError> {
        let mut current = self.current.lock().await;
        // NoProcess afterwards even if the signal fails.
        let Some(mut running) = current.take() else {
            return Ok(());
        };
        terminate(&mut running).await
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
