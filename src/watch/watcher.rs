//! Recursive tree watcher feeding throttled rebuild triggers.
//!
//! Directories are registered one by one (non-recursively) so exclusion
//! rules prune whole subtrees, and directories created later are picked up
//! as they appear.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::event::ModifyKind;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use walkdir::WalkDir;

use crate::watch::filter::WatchFilter;
use crate::watch::throttle::{Throttle, DEFAULT_WINDOW};

/// Error type for watch operations. None of these stop the watch loop
/// except `Init`.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to initialise file watcher: {0}")]
    Init(#[source] notify::Error),

    #[error("failed to watch {}: {source}", path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to unwatch {}: {source}", path.display())]
    Unregister {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    #[error("failed to walk directory tree: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Kind of filesystem change the dispatcher reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

/// A single filesystem change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub path: PathBuf,
    pub kind: WatchEventKind,
}

impl WatchEvent {
    pub fn new(path: impl Into<PathBuf>, kind: WatchEventKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// Split a notify event into per-path changes. Metadata-only changes,
    /// renames and accesses are dropped.
    pub fn from_notify(event: Event) -> Vec<WatchEvent> {
        let kind = match event.kind {
            EventKind::Create(_) => WatchEventKind::Created,
            EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Other) => WatchEventKind::Modified,
            EventKind::Remove(_) => WatchEventKind::Removed,
            _ => return Vec::new(),
        };
        event
            .paths
            .into_iter()
            .map(|path| WatchEvent { path, kind })
            .collect()
    }
}

/// Per-directory registration with the OS notification source.
pub trait WatchRegistry {
    fn add(&mut self, dir: &Path) -> Result<(), WatchError>;
    fn remove(&mut self, path: &Path) -> Result<(), WatchError>;
}

impl WatchRegistry for RecommendedWatcher {
    fn add(&mut self, dir: &Path) -> Result<(), WatchError> {
        self.watch(dir, RecursiveMode::NonRecursive)
            .map_err(|source| WatchError::Register {
                path: dir.to_path_buf(),
                source,
            })
    }

    fn remove(&mut self, path: &Path) -> Result<(), WatchError> {
        self.unwatch(path).map_err(|source| WatchError::Unregister {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Register `root` and every directory below it that the filter allows,
/// depth first. A skipped directory's subtree is never visited. Returns
/// the number of directories registered.
pub fn register_tree<R: WatchRegistry>(registry: &mut R, root: &Path, filter: &WatchFilter) -> usize {
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if !entry.file_type().is_dir() {
            return true;
        }
        if entry.depth() == 0 {
            return !filter.is_excluded(entry.path());
        }
        !filter.should_skip_dir(entry.path())
    });

    let mut registered = 0;
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %WatchError::from(e), "Skipping unreadable path");
                continue;
            }
        };
        if !entry.file_type().is_dir() {
            continue;
        }
        match registry.add(entry.path()) {
            Ok(()) => registered += 1,
            Err(e) => tracing::warn!(error = %e, "Directory not watched"),
        }
    }
    registered
}

/// Turns filesystem events into rebuild triggers.
pub struct Dispatcher<R> {
    registry: R,
    filter: WatchFilter,
    throttle: Throttle,
}

impl<R: WatchRegistry> Dispatcher<R> {
    pub fn new(registry: R, filter: WatchFilter, window: Duration) -> Self {
        Self {
            registry,
            filter,
            throttle: Throttle::new(window),
        }
    }

    /// Register the filter's root tree.
    pub fn register_root(&mut self) -> usize {
        let root = self.filter.root().to_path_buf();
        register_tree(&mut self.registry, &root, &self.filter)
    }

    /// Handle one change. Returns the path to report when it should
    /// trigger a rebuild.
    pub fn handle(&mut self, event: WatchEvent, now: Instant) -> Option<PathBuf> {
        match event.kind {
            WatchEventKind::Created => {
                if event.path.is_dir() && !self.filter.should_skip_dir(&event.path) {
                    let count = register_tree(&mut self.registry, &event.path, &self.filter);
                    tracing::debug!(path = %event.path.display(), directories = count, "Watching new directory");
                }
                None
            }
            WatchEventKind::Modified => {
                if !self.filter.is_trigger(&event.path) {
                    return None;
                }
                if self.throttle.try_acquire(now) {
                    Some(event.path)
                } else {
                    tracing::trace!(path = %event.path.display(), "Change throttled");
                    None
                }
            }
            WatchEventKind::Removed => {
                // Plain files were never registered
                if let Err(e) = self.registry.remove(&event.path) {
                    tracing::trace!(error = %e, "Nothing to unwatch");
                }
                None
            }
        }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }
}

/// Watches a source tree until shut down.
pub struct TreeWatcher {
    filter: WatchFilter,
    window: Duration,
}

impl TreeWatcher {
    pub fn new(filter: WatchFilter) -> Self {
        Self {
            filter,
            window: DEFAULT_WINDOW,
        }
    }

    /// Override the throttle window.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Run the event loop, calling `on_change` for each qualifying change,
    /// until `shutdown` fires or the notification source goes away.
    pub async fn run<F>(self, mut on_change: F, mut shutdown: broadcast::Receiver<()>) -> Result<(), WatchError>
    where
        F: FnMut(&Path),
    {
        // Channel from the blocking notify callback into the async world.
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let _ = event_tx.send(event);
                }
                Err(e) => tracing::warn!(error = %e, "File watch error"),
            },
            Config::default(),
        )
        .map_err(WatchError::Init)?;

        let mut dispatcher = Dispatcher::new(watcher, self.filter, self.window);
        let count = dispatcher.register_root();
        tracing::info!(
            root = %dispatcher.filter.root().display(),
            directories = count,
            "Watching for changes"
        );

        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    let Some(event) = event else { break };
                    for change in WatchEvent::from_notify(event) {
                        if let Some(path) = dispatcher.handle(change, Instant::now()) {
                            tracing::debug!(path = %path.display(), "Change detected");
                            on_change(&path);
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Watcher received shutdown signal");
                    break;
                }
            }
        }

        Ok(())
    }
}
