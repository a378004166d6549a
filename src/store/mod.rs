//! The configuration store: owns the tree and keeps it in sync with its file.
//!
//! Every read and mutation runs under one mutex. A mutation that changes the
//! tree moves the store from `Clean` to `Dirty`; the save policy then writes
//! synchronously, arms the debounce timer, or does nothing when auto-save is
//! off or a batch is open.

pub(crate) mod debounce;
mod node;
mod options;
mod persistence;
pub mod reserved;
mod watching;

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, error, info, instrument};

pub use node::{ConfigNode, Item};
pub use options::{DEFAULT_FILE_NAME, StoreOptions};

use crate::{
    ConfigError, Result, Snapshot,
    format::Format,
    lock::{self, FileLock},
    tree::{Entry, NodeId, Tree, path},
    watch::FileWatcher,
};
use debounce::Debouncer;
use persistence::Settings;

/// Persistence state of the in-memory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistState {
    /// Memory matches the file.
    Clean,
    /// Memory has changes the file does not.
    Dirty,
    /// A write is in progress.
    Saving,
}

/// Counters of completed file operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Successful writes of the backing file.
    pub saves: u64,
    /// Successful reads of the backing file.
    pub loads: u64,
}

pub(crate) struct StoreState {
    pub(crate) tree: Tree,
    persist: PersistState,
    auto_save: bool,
    batch_depth: usize,
    last_synced: Option<Vec<u8>>,
    stats: StoreStats,
}

pub(crate) struct Shared {
    settings: Settings,
    state: Mutex<StoreState>,
    debouncer: Option<Debouncer>,
    watcher: Mutex<Option<FileWatcher>>,
}

/// Nested key-value configuration synchronized with a file.
///
/// Cloning is cheap and every clone refers to the same tree. The last clone
/// to drop flushes pending changes on a best-effort basis; call
/// [`close`](Self::close) to flush with error reporting.
#[derive(Clone)]
pub struct ConfigStore {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("path", &self.shared.settings.path)
            .field("format", &self.shared.settings.format)
            .field("encrypted", &self.shared.settings.password.is_some())
            .finish_non_exhaustive()
    }
}

impl ConfigStore {
    /// Opens or creates the configuration file described by `options`.
    ///
    /// An existing file is loaded unless `replace` is set; otherwise the tree
    /// is seeded from the initial data and written immediately.
    ///
    /// # Errors
    /// * `ConfigError::ReservedKeyword` / `ConfigError::InvalidPath` - If the
    ///   initial data has unusable keys
    /// * `ConfigError::MissingPassword` / `ConfigError::IntegrityFailure` - If
    ///   an encrypted file cannot be opened
    /// * `ConfigError::Codec` / `ConfigError::Io` - If loading or the first
    ///   save fails
    #[instrument(skip(options), fields(path = %options.file_path.display()))]
    pub fn open(options: StoreOptions) -> Result<Self> {
        options.validate()?;
        let (path, format) = options.resolve_target();
        persistence::ensure_parent_dir(&path)?;

        let settings = Settings {
            path,
            format,
            password: options.password,
            process_safe: options.process_safe,
        };
        let state = StoreState {
            tree: Tree::new(),
            persist: PersistState::Clean,
            auto_save: options.auto_save,
            batch_depth: 0,
            last_synced: None,
            stats: StoreStats::default(),
        };

        let delay = Duration::from_millis(options.debounce_milliseconds);
        let store = Self {
            shared: Shared::new(settings, state, delay)?,
        };

        let exists = store.shared.settings.path.exists();
        {
            let mut state = store.shared.lock()?;
            let initialized = if exists && !options.replace {
                store.shared.load_into(&mut state)
            } else {
                state.tree.reset(options.initial_data.unwrap_or_default());
                state.tree.mark_dirty();
                state.persist = PersistState::Dirty;
                store.shared.save_locked(&mut state)
            };

            if let Err(e) = initialized {
                // Nothing to flush for a store that never opened.
                state.persist = PersistState::Clean;
                return Err(e);
            }
        }

        if exists && !options.replace {
            info!(format = %format, "Loaded configuration");
        } else {
            info!(format = %format, replaced = exists, "Created configuration file");
        }
        Ok(store)
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.shared.settings.path
    }

    /// Backing file format.
    pub fn format(&self) -> Format {
        self.shared.settings.format
    }

    /// Whether the file is written encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.shared.settings.password.is_some()
    }

    /// Automatic save delay; zero means synchronous saves.
    pub fn debounce(&self) -> Duration {
        self.shared
            .debouncer
            .as_ref()
            .map_or(Duration::ZERO, Debouncer::delay)
    }

    /// Value at `path`, or `default` when absent. Mappings are returned as
    /// plain objects.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If the path is malformed
    pub fn read(&self, path: &str, default: impl Into<Value>) -> Result<Value> {
        let state = self.shared.lock()?;
        match state.tree.lookup(path)? {
            Some(entry) => state.tree.entry_value(&entry),
            None => Ok(default.into()),
        }
    }

    /// Entry at `path`: a value, or a live handle for mappings.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If the path is malformed
    pub fn get(&self, path: &str) -> Result<Option<Item>> {
        let state = self.shared.lock()?;
        Ok(state
            .tree
            .lookup(path)?
            .map(|entry| self.item(entry)))
    }

    /// Deserializes the value at `path` into `T`.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If the path does not exist
    /// * `ConfigError::TypeMismatch` - If the value does not deserialize as `T`
    pub fn read_as<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = {
            let state = self.shared.lock()?;
            let entry = state.tree.resolve(path)?;
            state.tree.entry_value(&entry)?
        };

        serde_json::from_value(value).map_err(|e| {
            debug!(path, error = %e, "Typed read failed");
            ConfigError::TypeMismatch {
                path: path.to_string(),
                expected_type: std::any::type_name::<T>(),
            }
        })
    }

    /// Whether anything is stored at `path`.
    ///
    /// # Errors
    /// * `ConfigError::InvalidPath` - If the path is malformed
    pub fn contains(&self, path: &str) -> Result<bool> {
        Ok(self.shared.lock()?.tree.lookup(path)?.is_some())
    }

    /// Handle to the root mapping.
    pub fn root(&self) -> ConfigNode {
        ConfigNode::new(Arc::downgrade(&self.shared), NodeId::ROOT)
    }

    /// Handle to the mapping at `path`.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If the path does not exist
    /// * `ConfigError::TypeMismatch` - If the path holds a value
    pub fn node(&self, path: &str) -> Result<ConfigNode> {
        match self.shared.lock()?.tree.resolve(path)? {
            Entry::Node(id) => Ok(ConfigNode::new(Arc::downgrade(&self.shared), id)),
            Entry::Leaf(_) => Err(ConfigError::TypeMismatch {
                path: path.to_string(),
                expected_type: "mapping",
            }),
        }
    }

    /// Writes `value` at `path`, creating intermediate mappings.
    ///
    /// Without `overwrite`, replacing a value with a mapping (or the reverse)
    /// is refused.
    ///
    /// # Errors
    /// * `ConfigError::ReservedKeyword` - If the first segment is reserved
    /// * `ConfigError::InvalidPath` - If the path is malformed
    /// * `ConfigError::PathConflict` - On a class mismatch without `overwrite`
    /// * Any save error when auto-save writes synchronously
    #[instrument(skip(self, value), fields(file = %self.path().display()))]
    pub fn write(&self, path: &str, value: impl Into<Value>, overwrite: bool) -> Result<()> {
        reserved::check_path(path)?;
        let value = value.into();
        self.shared
            .mutate(|tree| tree.write_path(path, value, overwrite).map(|_| ()))
    }

    /// Deep-merges `partial` into the tree. Dotted keys are paths.
    ///
    /// # Errors
    /// * `ConfigError::ReservedKeyword` - If a top-level key is reserved
    /// * `ConfigError::InvalidPath` - If a key is malformed
    /// * Any save error when auto-save writes synchronously
    #[instrument(skip_all, fields(file = %self.path().display(), keys = partial.len()))]
    pub fn update(&self, partial: Snapshot) -> Result<()> {
        reserved::check_top_level(partial.keys())?;
        self.shared.mutate(|tree| {
            let root = tree.root();
            tree.merge(root, partial).map(|_| ())
        })
    }

    /// Replaces the whole tree with `data`.
    ///
    /// # Errors
    /// * `ConfigError::ReservedKeyword` - If a top-level key is reserved
    /// * `ConfigError::InvalidPath` - If any key is malformed
    /// * Any save error when auto-save writes synchronously
    #[instrument(skip_all, fields(file = %self.path().display(), keys = data.len()))]
    pub fn set_data(&self, data: Snapshot) -> Result<()> {
        reserved::check_top_level(data.keys())?;
        path::validate_snapshot(&data)?;
        self.shared.mutate(|tree| {
            if tree.flatten(tree.root())? != data {
                tree.reset(data);
            }
            Ok(())
        })
    }

    /// Deletes the entry at `path` and prunes ancestors left empty.
    ///
    /// # Errors
    /// * `ConfigError::NotFound` - If the path does not exist
    /// * `ConfigError::InvalidPath` - If the path is malformed
    /// * Any save error when auto-save writes synchronously
    #[instrument(skip(self), fields(file = %self.path().display()))]
    pub fn delete(&self, path: &str) -> Result<()> {
        self.shared.mutate(|tree| tree.delete_path(path))
    }

    /// Removes the backing file and its lock file and empties the tree.
    ///
    /// Returns whether a file was removed.
    ///
    /// # Errors
    /// * `ConfigError::Io` - If the file exists but cannot be removed
    #[instrument(skip(self), fields(path = %self.path().display()))]
    pub fn delete_all(&self) -> Result<bool> {
        self.shared.cancel_timer();
        let mut state = self.shared.lock()?;
        let settings = &self.shared.settings;

        let guard = if settings.process_safe {
            Some(FileLock::acquire_exclusive(&settings.path)?)
        } else {
            None
        };

        let removed = match fs::remove_file(&settings.path) {
            Ok(()) => true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => false,
            Err(e) => return Err(ConfigError::io(&settings.path, e)),
        };
        drop(guard);
        lock::remove_lock_file(&lock::lock_path(&settings.path));

        state.tree.reset(Snapshot::new());
        state.tree.clear_dirty();
        state.persist = PersistState::Clean;
        state.last_synced = None;

        info!(removed, "Deleted configuration");
        Ok(removed)
    }

    /// Writes pending changes now, cancelling any debounce timer.
    ///
    /// Does nothing when the tree is clean.
    ///
    /// # Errors
    /// * `ConfigError::MissingPassword` / `ConfigError::IntegrityFailure` - If
    ///   the existing encrypted file fails verification
    /// * `ConfigError::Codec` / `ConfigError::Io` - If encoding or writing fails
    #[instrument(skip(self), fields(path = %self.path().display()))]
    pub fn save(&self) -> Result<()> {
        self.shared.cancel_timer();
        let mut state = self.shared.lock()?;
        self.shared.save_locked(&mut state)
    }

    /// Discards the in-memory tree and reads the file again.
    ///
    /// # Errors
    /// * `ConfigError::Io` - If the file cannot be read
    /// * `ConfigError::MissingPassword` / `ConfigError::IntegrityFailure` /
    ///   `ConfigError::Codec` - If the file cannot be decoded
    #[instrument(skip(self), fields(path = %self.path().display()))]
    pub fn reload(&self) -> Result<()> {
        self.shared.cancel_timer();
        let mut state = self.shared.lock()?;
        self.shared.load_into(&mut state)?;
        info!("Reloaded configuration");
        Ok(())
    }

    /// Writes the current tree to `target`, in `format` or the format implied
    /// by its extension (falling back to this store's format).
    ///
    /// The file is encrypted when this store has a password. The backing
    /// file and the dirty state are not touched. Returns the path written.
    ///
    /// # Errors
    /// * `ConfigError::Codec` / `ConfigError::Io` - If encoding or writing fails
    #[instrument(skip(self, target), fields(path = %self.path().display(), target = %target.as_ref().display()))]
    pub fn export_to(&self, target: impl AsRef<Path>, format: Option<Format>) -> Result<PathBuf> {
        let (target, format) =
            options::resolve_target(target.as_ref(), format, self.shared.settings.format);

        let snapshot = {
            let state = self.shared.lock()?;
            state.tree.flatten(state.tree.root())?
        };
        self.shared.settings.export(&snapshot, &target, format)?;

        info!(format = %format, "Exported configuration");
        Ok(target)
    }

    /// Plain snapshot of the whole tree.
    ///
    /// # Errors
    /// * `ConfigError::LockPoisoned` - If the store mutex is poisoned
    pub fn to_dict(&self) -> Result<Snapshot> {
        let state = self.shared.lock()?;
        state.tree.flatten(state.tree.root())
    }

    /// The whole tree as pretty-printed JSON.
    ///
    /// # Errors
    /// * `ConfigError::Codec` - If serialization fails
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_dict()?)
            .map_err(|e| ConfigError::codec(Format::Json, e))
    }

    /// Runs `f` with auto-save suspended, then saves once if anything changed.
    ///
    /// The save happens even when `f` fails; the closure's error wins.
    ///
    /// # Errors
    /// Returns the closure's error, or the save error.
    pub fn batch<R>(&self, f: impl FnOnce(&ConfigStore) -> Result<R>) -> Result<R> {
        self.shared.lock()?.batch_depth += 1;
        let result = f(self);

        let saved = {
            let mut state = self.shared.lock()?;
            state.batch_depth -= 1;
            if state.batch_depth == 0 && state.persist == PersistState::Dirty {
                self.shared.cancel_timer();
                self.shared.save_locked(&mut state)
            } else {
                Ok(())
            }
        };

        let value = result?;
        saved?;
        Ok(value)
    }

    /// Stops watching, cancels the timer and writes pending changes.
    ///
    /// # Errors
    /// Returns the final save error.
    #[instrument(skip(self), fields(path = %self.path().display()))]
    pub fn close(self) -> Result<()> {
        self.disable_watch()?;
        self.shared.cancel_timer();

        let mut state = self.shared.lock()?;
        self.shared.save_locked(&mut state)
    }

    /// Whether the tree has unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.persist_state() != PersistState::Clean
    }

    /// Current persistence state.
    pub fn persist_state(&self) -> PersistState {
        self.shared
            .lock()
            .map_or(PersistState::Dirty, |state| state.persist)
    }

    /// Whether mutations are saved automatically.
    pub fn is_auto_save(&self) -> bool {
        self.shared.lock().is_ok_and(|state| state.auto_save)
    }

    /// Enables or disables automatic saving. Enabling it schedules a save of
    /// any pending changes.
    ///
    /// # Errors
    /// Any save error when the pending changes are written synchronously.
    pub fn set_auto_save(&self, auto_save: bool) -> Result<()> {
        let mut state = self.shared.lock()?;
        state.auto_save = auto_save;
        if auto_save && state.persist == PersistState::Dirty {
            self.shared.schedule(&mut state)?;
        }
        Ok(())
    }

    /// Completed save and load counts.
    ///
    /// # Errors
    /// * `ConfigError::LockPoisoned` - If the store mutex is poisoned
    pub fn stats(&self) -> Result<StoreStats> {
        Ok(self.shared.lock()?.stats)
    }

    fn item(&self, entry: Entry) -> Item {
        match entry {
            Entry::Leaf(value) => Item::Value(value),
            Entry::Node(id) => Item::Node(ConfigNode::new(Arc::downgrade(&self.shared), id)),
        }
    }
}

impl Shared {
    fn new(settings: Settings, state: StoreState, delay: Duration) -> Result<Arc<Self>> {
        let mut spawn_error = None;

        let shared = Arc::new_cyclic(|weak: &Weak<Shared>| {
            let debouncer = if delay.is_zero() {
                None
            } else {
                let weak = weak.clone();
                match Debouncer::spawn("conftree-save", delay, move || {
                    if let Some(shared) = weak.upgrade() {
                        shared.flush_pending();
                    }
                }) {
                    Ok(debouncer) => Some(debouncer),
                    Err(e) => {
                        spawn_error = Some(e);
                        None
                    }
                }
            };

            Shared {
                settings,
                state: Mutex::new(state),
                debouncer,
                watcher: Mutex::new(None),
            }
        });

        match spawn_error {
            Some(e) => Err(ConfigError::io(&shared.settings.path, e)),
            None => Ok(shared),
        }
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|_| ConfigError::LockPoisoned)
    }

    /// Applies a tree mutation and, if the tree changed, the save policy.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut Tree) -> Result<R>) -> Result<R> {
        let mut state = self.lock()?;
        let root = state.tree.root();
        let before = state.tree.revision(root)?;

        let result = f(&mut state.tree);

        // A failed mutation may still have changed part of the tree.
        if state.tree.revision(root)? != before {
            state.persist = PersistState::Dirty;
            let scheduled = self.schedule(&mut state);
            return result.and_then(|value| scheduled.map(|()| value));
        }
        result
    }

    fn schedule(&self, state: &mut StoreState) -> Result<()> {
        if state.batch_depth > 0 || !state.auto_save {
            return Ok(());
        }

        match &self.debouncer {
            Some(debouncer) => {
                debouncer.trigger();
                Ok(())
            }
            None => self.save_locked(state),
        }
    }

    fn cancel_timer(&self) {
        if let Some(debouncer) = &self.debouncer {
            debouncer.cancel();
        }
    }

    /// Writes the tree if it is dirty. The caller holds the state lock.
    fn save_locked(&self, state: &mut StoreState) -> Result<()> {
        if state.persist == PersistState::Clean {
            return Ok(());
        }

        state.persist = PersistState::Saving;
        let written = state
            .tree
            .flatten(state.tree.root())
            .and_then(|snapshot| self.settings.store(&snapshot));

        match written {
            Ok(bytes) => {
                state.persist = PersistState::Clean;
                state.tree.clear_dirty();
                state.last_synced = Some(bytes);
                state.stats.saves += 1;
                debug!(path = %self.settings.path.display(), "Saved configuration");
                Ok(())
            }
            Err(e) => {
                state.persist = PersistState::Dirty;
                Err(e)
            }
        }
    }

    /// Replaces the tree with the file contents. The caller holds the state lock.
    fn load_into(&self, state: &mut StoreState) -> Result<()> {
        let loaded = self.settings.load()?;
        self.apply_loaded(state, loaded);
        Ok(())
    }

    fn apply_loaded(&self, state: &mut StoreState, loaded: persistence::Loaded) {
        state.tree.reset(loaded.snapshot);
        state.tree.clear_dirty();
        state.persist = PersistState::Clean;
        state.last_synced = Some(loaded.bytes);
        state.stats.loads += 1;
    }

    /// Timer callback: saves if still dirty and no batch is open.
    fn flush_pending(&self) {
        let mut state = match self.lock() {
            Ok(state) => state,
            Err(e) => {
                error!(path = %self.settings.path.display(), error = %e, "Debounced save skipped");
                return;
            }
        };

        if state.batch_depth > 0 {
            return;
        }
        if let Err(e) = self.save_locked(&mut state) {
            error!(path = %self.settings.path.display(), error = %e, "Debounced save failed");
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let watcher = self
            .watcher
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(watcher);
        self.cancel_timer();

        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        if !state.auto_save {
            return;
        }
        if let Err(e) = self.save_locked(&mut state) {
            error!(
                path = %self.settings.path.display(),
                error = %e,
                "Failed to flush configuration on drop"
            );
        }
    }
}

#[cfg(test)]
mod tests;
