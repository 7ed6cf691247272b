//! Artifact builder.
//!
//! # Responsibilities
//! - Invoke `<toolchain> build -o <work_dir>/<artifact> <extra args...>`
//!   inside the build directory
//! - Capture combined stdout/stderr as the diagnostic text on failure
//! - Keep the last result available to concurrent readers

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::sync::Mutex;

use crate::build::status::{BuildResult, BuildState};
use crate::config::Settings;
use crate::observability::metrics;

/// Artifact name used when none is configured.
pub const DEFAULT_ARTIFACT: &str = "bin";

/// Error type for build operations.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The toolchain ran and exited non-zero.
    #[error("{diagnostics}")]
    Failed { diagnostics: String },

    /// The toolchain could not be started at all.
    #[error("failed to run {toolchain}: {source}")]
    Spawn {
        toolchain: String,
        #[source]
        source: std::io::Error,
    },
}

/// Produces the artifact and reports on the last attempt.
#[async_trait]
pub trait Builder: Send + Sync {
    /// Build the artifact, replacing any previous one in place.
    async fn build(&self) -> Result<(), BuildError>;

    /// Artifact file name.
    fn binary(&self) -> &str;

    /// Diagnostics of the last build; empty when it succeeded.
    fn errors(&self) -> String;
}

/// Resolve the artifact name for the current platform.
pub fn artifact_name(bin: &str) -> String {
    artifact_name_with_suffix(bin, std::env::consts::EXE_SUFFIX)
}

/// Default an empty name and append `suffix` exactly once.
pub fn artifact_name_with_suffix(bin: &str, suffix: &str) -> String {
    let name = if bin.is_empty() { DEFAULT_ARTIFACT } else { bin };
    if suffix.is_empty() || name.ends_with(suffix) {
        name.to_string()
    } else {
        format!("{}{}", name, suffix)
    }
}

/// Builder backed by an external toolchain process.
pub struct ToolchainBuilder {
    toolchain: String,
    build_dir: PathBuf,
    binary: String,
    artifact_path: PathBuf,
    build_args: Vec<String>,
    env: Vec<(String, String)>,
    state: BuildState,
    /// Serializes builds that share the artifact path.
    running: Mutex<()>,
}

impl ToolchainBuilder {
    pub fn new(
        toolchain: impl Into<String>,
        build_dir: impl Into<PathBuf>,
        bin: &str,
        work_dir: &Path,
        build_args: Vec<String>,
    ) -> Self {
        let binary = artifact_name(bin);
        let artifact_path = work_dir.join(&binary);
        let state = BuildState::new(&artifact_path, &binary);

        Self {
            toolchain: toolchain.into(),
            build_dir: build_dir.into(),
            binary,
            artifact_path,
            build_args,
            env: Vec::new(),
            state,
            running: Mutex::new(()),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.toolchain.clone(),
            settings.build_path.clone(),
            &settings.bin,
            &settings.work_dir,
            settings.build_args.clone(),
        )
        .with_env(settings.env.clone())
    }

    /// Extra environment variables for the toolchain.
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    /// Full path the artifact is written to.
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }

    /// Snapshot of the last result.
    pub fn result(&self) -> std::sync::Arc<BuildResult> {
        self.state.load()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.toolchain);
        cmd.arg("build")
            .arg("-o")
            .arg(&self.artifact_path)
            .args(&self.build_args)
            .current_dir(&self.build_dir)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Builder for ToolchainBuilder {
    async fn build(&self) -> Result<(), BuildError> {
        let _guard = self.running.lock().await;
        let started = Instant::now();

        tracing::debug!(
            toolchain = %self.toolchain,
            dir = %self.build_dir.display(),
            output = %self.artifact_path.display(),
            args = ?self.build_args,
            "Invoking toolchain"
        );

        let output = match self.command().output().await {
            Ok(output) => output,
            Err(source) => {
                let err = BuildError::Spawn {
                    toolchain: self.toolchain.clone(),
                    source,
                };
                self.state.record_failure(err.to_string());
                metrics::record_build(false, started.elapsed());
                return Err(err);
            }
        };

        // stdout then stderr; the toolchain reports diagnostics on stderr.
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        let elapsed = started.elapsed();
        if output.status.success() {
            self.state.record_success();
            metrics::record_build(true, elapsed);
            tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "Toolchain succeeded");
            Ok(())
        } else {
            self.state.record_failure(combined);
            metrics::record_build(false, elapsed);
            tracing::debug!(
                status = %output.status,
                elapsed_ms = elapsed.as_millis() as u64,
                "Toolchain failed"
            );
            Err(BuildError::Failed {
                diagnostics: self.state.load().diagnostics.clone(),
            })
        }
    }

    fn binary(&self) -> &str {
        &self.binary
    }

    fn errors(&self) -> String {
        self.state.load().diagnostics.clone()
    }
}
