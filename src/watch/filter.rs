//! Which directories get registered and which changes trigger a rebuild.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

/// Directory name that is never watched.
pub const VENDOR_DIR: &str = "vendor";

/// Exclusion and extension rules for the tree watcher.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    exclude_dirs: Vec<PathBuf>,
    extension: String,
    all_files: bool,
}

impl WatchFilter {
    /// `extension` is given without the leading dot (e.g. "go").
    pub fn new(
        root: impl Into<PathBuf>,
        exclude_dirs: Vec<PathBuf>,
        extension: impl Into<String>,
        all_files: bool,
    ) -> Self {
        let extension: String = extension.into();
        Self {
            root: root.into(),
            exclude_dirs: exclude_dirs.into_iter().map(|p| normalize(&p)).collect(),
            extension: extension.trim_start_matches('.').to_string(),
            all_files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Exact match against an exclude entry, either as given or relative
    /// to the watch root.
    pub fn is_excluded(&self, path: &Path) -> bool {
        let path = normalize(path);
        let relative = path.strip_prefix(normalize(&self.root)).ok().map(normalize);
        self.exclude_dirs
            .iter()
            .any(|x| *x == path || relative.as_ref() == Some(x))
    }

    /// A directory that must not be registered, nor anything below it.
    pub fn should_skip_dir(&self, path: &Path) -> bool {
        if self.is_excluded(path) {
            return true;
        }
        match path.file_name().and_then(OsStr::to_str) {
            Some(VENDOR_DIR) => true,
            Some(name) => name.starts_with('.'),
            None => false,
        }
    }

    /// Whether a modification of `path` should trigger a rebuild.
    pub fn is_trigger(&self, path: &Path) -> bool {
        self.all_files || path.extension().is_some_and(|ext| ext == self.extension.as_str())
    }
}

/// Drop `.` components so "./api" and "api" compare equal.
fn normalize(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}
