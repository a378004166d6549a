//! File change notifications for a single configuration file.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher, recommended_watcher};
use tracing::{debug, trace};

use crate::{ConfigError, Result, store::debounce::Debouncer};

/// Quiet period after the last event before `on_change` runs.
pub const COALESCE_WINDOW: Duration = Duration::from_millis(100);

/// Watches one file and calls back after a burst of changes settles.
///
/// The parent directory is watched rather than the file itself so that
/// editors which save by renaming a new file over the old one are seen.
pub struct FileWatcher {
    watcher: RecommendedWatcher,
    directory: PathBuf,
    target: PathBuf,
    _debouncer: Arc<Debouncer>,
}

impl FileWatcher {
    /// Starts watching `target`. `on_change` runs on a background thread once
    /// creations or modifications of the file have been quiet for
    /// [`COALESCE_WINDOW`].
    ///
    /// # Errors
    /// Returns `ConfigError::Watch` if the watcher cannot be created or the
    /// parent directory cannot be watched.
    pub fn register<F>(target: &Path, on_change: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let watch_error = |details: String| ConfigError::Watch {
            path: target.to_path_buf(),
            details,
        };

        let file_name: OsString = target
            .file_name()
            .ok_or_else(|| watch_error("path has no file name".to_string()))?
            .to_owned();
        let directory = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let debouncer = Arc::new(
            Debouncer::spawn("conftree-watch", COALESCE_WINDOW, on_change)
                .map_err(|e| watch_error(format!("failed to start debounce thread: {e}")))?,
        );

        let events = Arc::clone(&debouncer);
        let mut watcher = recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };

            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }

            if event
                .paths
                .iter()
                .any(|path| path.file_name() == Some(file_name.as_os_str()))
            {
                trace!(kind = ?event.kind, "Configuration file event");
                events.trigger();
            }
        })
        .map_err(|e| watch_error(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| watch_error(format!("failed to watch {}: {e}", directory.display())))?;

        debug!(directory = %directory.display(), "Watching configuration directory");
        Ok(Self {
            watcher,
            directory,
            target: target.to_path_buf(),
            _debouncer: debouncer,
        })
    }

    /// File being watched.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Stops watching. Pending notifications are dropped.
    ///
    /// # Errors
    /// Returns `ConfigError::Watch` if the directory cannot be unwatched.
    pub fn unregister(mut self) -> Result<()> {
        self.watcher
            .unwatch(&self.directory)
            .map_err(|e| ConfigError::Watch {
                path: self.target.clone(),
                details: format!("failed to unwatch {}: {e}", self.directory.display()),
            })
    }
}
