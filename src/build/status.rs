//! Most recent build result, shared between the rebuild loop and the gateway.
//!
//! Written only by the builder, read on every gateway request. The snapshot
//! is swapped atomically so readers never block a build.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;

/// Outcome of the last build. Empty diagnostics means it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    pub artifact_path: PathBuf,
    pub artifact_name: String,
    pub diagnostics: String,
}

impl BuildResult {
    pub fn is_success(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Lock-free holder for the latest `BuildResult`.
#[derive(Debug)]
pub struct BuildState {
    current: ArcSwap<BuildResult>,
}

impl BuildState {
    pub fn new(artifact_path: &Path, artifact_name: &str) -> Self {
        Self {
            current: ArcSwap::from_pointee(BuildResult {
                artifact_path: artifact_path.to_path_buf(),
                artifact_name: artifact_name.to_string(),
                diagnostics: String::new(),
            }),
        }
    }

    pub fn load(&self) -> Arc<BuildResult> {
        self.current.load_full()
    }

    pub fn record_success(&self) {
        self.replace_diagnostics(String::new());
    }

    /// Record a failure. Empty output is replaced with a placeholder so the
    /// result still reads as failed.
    pub fn record_failure(&self, diagnostics: String) {
        let diagnostics = if diagnostics.trim().is_empty() {
            "build failed without output".to_string()
        } else {
            diagnostics
        };
        self.replace_diagnostics(diagnostics);
    }

    fn replace_diagnostics(&self, diagnostics: String) {
        let previous = self.current.load();
        self.current.store(Arc::new(BuildResult {
            artifact_path: previous.artifact_path.clone(),
            artifact_name: previous.artifact_name.clone(),
            diagnostics,
        }));
    }
}
