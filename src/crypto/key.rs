//! Password to key derivation using Argon2id, with a process-wide cache.

use std::sync::{LazyLock, Mutex, PoisonError};

use argon2::{Algorithm, Argon2, Params, Version};
use indexmap::IndexMap;
use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use super::{CryptoError, Password, SALT_LEN};

/// AES-256 key size in bytes.
pub const KEY_LEN: usize = 32;

/// Upper bound on cached (password, salt) pairs.
pub const CACHE_CAPACITY: usize = 128;

const MEMORY_COST_KIB: u32 = 19 * 1024;
const TIME_COST: u32 = 2;
const PARALLELISM: u32 = 1;

static CACHE: LazyLock<Mutex<IndexMap<CacheKey, Zeroizing<[u8; KEY_LEN]>>>> =
    LazyLock::new(|| Mutex::new(IndexMap::new()));

#[derive(PartialEq, Eq, Hash)]
struct CacheKey {
    password: String,
    salt: [u8; SALT_LEN],
}

impl Drop for CacheKey {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// Derives the 32-byte key for `password` and `salt`.
///
/// Derivations are cached; the oldest entry is evicted once the cache holds
/// [`CACHE_CAPACITY`] keys.
pub fn derive_key(
    password: &Password,
    salt: &[u8; SALT_LEN],
) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    let lookup = CacheKey {
        password: password.expose().to_string(),
        salt: *salt,
    };

    if let Some(key) = cache().get(&lookup) {
        return Ok(Zeroizing::new(**key));
    }

    let key = argon2id(password.expose().as_bytes(), salt)?;

    let mut cache = cache();
    if cache.len() >= CACHE_CAPACITY {
        cache.shift_remove_index(0);
    }
    cache.insert(lookup, Zeroizing::new(*key));
    debug!(cached = cache.len(), "Derived encryption key");

    Ok(key)
}

fn cache() -> std::sync::MutexGuard<'static, IndexMap<CacheKey, Zeroizing<[u8; KEY_LEN]>>> {
    CACHE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn argon2id(input: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>, CryptoError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(KEY_LEN))
        .map_err(|e| CryptoError::Kdf(format!("invalid Argon2 params: {e}")))?;

    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(input, salt, &mut key[..])
        .map_err(|e| CryptoError::Kdf(format!("Argon2 failed: {e}")))?;

    Ok(key)
}

#[cfg(test)]
pub(super) fn is_cached(password: &Password, salt: &[u8; SALT_LEN]) -> bool {
    cache().contains_key(&CacheKey {
        password: password.expose().to_string(),
        salt: *salt,
    })
}
