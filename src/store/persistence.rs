//! Reading and writing the backing file: encryption detection, codecs,
//! cross-process locking and atomic replacement.

use std::{
    fs::{self, File},
    io::{self, Write},
    path::{Path, PathBuf},
};

use serde_json::Value;
use tracing::{debug, warn};

use crate::{
    ConfigError, Password, Result, Snapshot,
    codec::codec_for,
    crypto::{self, CryptoError},
    format::Format,
    lock::{FileLock, with_suffix},
};

/// Immutable per-store file settings.
#[derive(Debug)]
pub(crate) struct Settings {
    pub(crate) path: PathBuf,
    pub(crate) format: Format,
    pub(crate) password: Option<Password>,
    pub(crate) process_safe: bool,
}

/// Result of reading the backing file.
pub(crate) struct Loaded {
    pub(crate) snapshot: Snapshot,
    pub(crate) bytes: Vec<u8>,
}

impl Settings {
    /// Reads and decodes the backing file under a shared lock.
    ///
    /// # Errors
    /// * `ConfigError::Io` - If the file cannot be read or locked
    /// * `ConfigError::MissingPassword` - If the file is encrypted and no password is set
    /// * `ConfigError::IntegrityFailure` - If decryption fails
    /// * `ConfigError::Codec` - If the plaintext cannot be parsed
    pub(crate) fn load(&self) -> Result<Loaded> {
        let _lock = self.lock_shared()?;

        let bytes = fs::read(&self.path).map_err(|e| ConfigError::io(&self.path, e))?;
        let snapshot = self.decode(&bytes)?;

        debug!(
            path = %self.path.display(),
            bytes = bytes.len(),
            keys = snapshot.len(),
            "Read configuration file"
        );
        Ok(Loaded { snapshot, bytes })
    }

    /// Encodes `snapshot` and atomically replaces the backing file with it.
    ///
    /// An existing encrypted file must decrypt with the current password
    /// before it is overwritten. Returns the bytes written.
    ///
    /// # Errors
    /// * `ConfigError::MissingPassword` / `ConfigError::IntegrityFailure` - If
    ///   the existing encrypted file fails verification
    /// * `ConfigError::Codec` - If the snapshot cannot be encoded
    /// * `ConfigError::Io` - If locking or any file operation fails
    pub(crate) fn store(&self, snapshot: &Snapshot) -> Result<Vec<u8>> {
        let lock = self.lock_exclusive()?;

        self.verify_existing()?;
        let bytes = self.encode(snapshot, self.format)?;
        atomic_replace(&self.path, &bytes)?;

        if let Some(lock) = lock {
            lock.release_and_remove();
        }

        Ok(bytes)
    }

    /// Writes `snapshot` to another file, leaving the backing file alone.
    ///
    /// # Errors
    /// * `ConfigError::Codec` - If the snapshot cannot be encoded
    /// * `ConfigError::Io` - If any file operation fails
    pub(crate) fn export(&self, snapshot: &Snapshot, target: &Path, format: Format) -> Result<()> {
        let bytes = self.encode(snapshot, format)?;
        atomic_replace(target, &bytes)
    }

    /// Decodes file bytes, decrypting them first when they carry the magic header.
    pub(crate) fn decode(&self, bytes: &[u8]) -> Result<Snapshot> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Snapshot::new());
        }

        if !crypto::is_encrypted(bytes) {
            return codec_for(self.format).decode(bytes);
        }

        let plaintext = self.decrypt(bytes)?;
        match serde_json::from_slice(&plaintext) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(ConfigError::codec(
                Format::Json,
                "decrypted payload is not an object",
            )),
            Err(e) => Err(ConfigError::codec(Format::Json, e)),
        }
    }

    /// Serializes `snapshot`: sealed compact JSON when a password is set,
    /// otherwise the codec for `format`.
    pub(crate) fn encode(&self, snapshot: &Snapshot, format: Format) -> Result<Vec<u8>> {
        let Some(password) = &self.password else {
            return codec_for(format).encode(snapshot);
        };

        let plaintext = zeroize::Zeroizing::new(
            serde_json::to_vec(snapshot).map_err(|e| ConfigError::codec(Format::Json, e))?,
        );
        crypto::seal(password, &plaintext).map_err(|e| self.crypto_error(e))
    }

    fn decrypt(&self, bytes: &[u8]) -> Result<zeroize::Zeroizing<Vec<u8>>> {
        let password = self
            .password
            .as_ref()
            .ok_or_else(|| ConfigError::MissingPassword {
                path: self.path.clone(),
            })?;

        crypto::open(password, bytes).map_err(|e| self.crypto_error(e))
    }

    fn verify_existing(&self) -> Result<()> {
        let existing = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(ConfigError::io(&self.path, e)),
        };

        if crypto::is_encrypted(&existing) {
            self.decrypt(&existing)?;
            debug!(path = %self.path.display(), "Verified existing encrypted file");
        }
        Ok(())
    }

    fn crypto_error(&self, error: CryptoError) -> ConfigError {
        match error {
            CryptoError::Integrity | CryptoError::Truncated | CryptoError::NotEncrypted => {
                ConfigError::IntegrityFailure {
                    path: self.path.clone(),
                }
            }
            CryptoError::Kdf(_) | CryptoError::Cipher(_) => ConfigError::Crypto(error.to_string()),
        }
    }

    fn lock_shared(&self) -> Result<Option<FileLock>> {
        self.process_safe
            .then(|| FileLock::acquire_shared(&self.path))
            .transpose()
    }

    fn lock_exclusive(&self) -> Result<Option<FileLock>> {
        self.process_safe
            .then(|| FileLock::acquire_exclusive(&self.path))
            .transpose()
    }
}

/// Temporary sibling used while replacing `path`.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, ".tmp")
}

/// Creates the parent directory of `path` if it does not exist.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))
        }
        _ => Ok(()),
    }
}

/// Publishes `bytes` at `path` via a synced temporary file and a rename.
///
/// The temporary file is removed on every error path.
pub(crate) fn atomic_replace(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;
    let temp = temp_path(path);

    let written = write_synced(&temp, bytes)
        .and_then(|()| fs::rename(&temp, path))
        .map_err(|e| ConfigError::io(path, e));

    if written.is_err() {
        if let Err(e) = fs::remove_file(&temp) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(path = %temp.display(), error = %e, "Could not remove temporary file");
            }
        }
    }

    written
}

fn write_synced(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.flush()?;
    file.sync_all()
}
