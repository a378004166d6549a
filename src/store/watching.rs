use std::{fs, sync::Arc};

use tracing::{debug, info, instrument, warn};

use super::{ConfigStore, Shared};
use crate::{ConfigError, Result, watch::FileWatcher};

impl ConfigStore {
    /// Starts reloading the tree whenever the backing file changes on disk.
    ///
    /// Changes that reproduce the bytes this store last wrote or read are
    /// ignored. Calling this while already watching is a no-op.
    ///
    /// # Errors
    /// Returns `ConfigError::Watch` if the watcher cannot be started.
    #[instrument(skip(self), fields(path = %self.path().display()))]
    pub fn enable_watch(&self) -> Result<()> {
        let mut slot = self
            .shared
            .watcher
            .lock()
            .map_err(|_| ConfigError::LockPoisoned)?;
        if slot.is_some() {
            return Ok(());
        }

        let store = Arc::downgrade(&self.shared);
        let watcher = FileWatcher::register(self.path(), move || {
            if let Some(shared) = store.upgrade() {
                shared.reload_if_changed();
            }
        })?;

        *slot = Some(watcher);
        info!("Started watching configuration file");
        Ok(())
    }

    /// Stops watching the backing file. No-op when not watching.
    ///
    /// # Errors
    /// Returns `ConfigError::Watch` if the watcher cannot be stopped.
    #[instrument(skip(self), fields(path = %self.path().display()))]
    pub fn disable_watch(&self) -> Result<()> {
        let watcher = self
            .shared
            .watcher
            .lock()
            .map_err(|_| ConfigError::LockPoisoned)?
            .take();

        if let Some(watcher) = watcher {
            watcher.unregister()?;
            info!("Stopped watching configuration file");
        }
        Ok(())
    }

    /// Whether the backing file is being watched.
    pub fn is_watching(&self) -> bool {
        self.shared
            .watcher
            .lock()
            .is_ok_and(|watcher| watcher.is_some())
    }
}

impl Shared {
    /// Watch callback: reloads unless the file holds what was last synced.
    fn reload_if_changed(&self) {
        let path = &self.settings.path;

        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping reload");
                return;
            }
        };

        match fs::read(path) {
            Ok(bytes) if state.last_synced.as_deref() == Some(bytes.as_slice()) => {
                debug!(path = %path.display(), "File matches last sync; reload skipped");
                return;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Changed file is not readable yet");
                return;
            }
        }

        self.cancel_timer();
        match self.load_into(&mut state) {
            Ok(()) => info!(path = %path.display(), "Reloaded configuration after external change"),
            Err(e) => warn!(path = %path.display(), error = %e, "Reload after external change failed"),
        }
    }
}
