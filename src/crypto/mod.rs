//! Authenticated encryption of configuration files.
//!
//! An encrypted file is `MAGIC ‖ SALT ‖ NONCE ‖ CIPHERTEXT ‖ TAG`. The key is
//! derived from the password and the per-file salt with Argon2id, and the
//! magic header plus salt are bound to the ciphertext as associated data.

mod key;

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::{RngCore, rngs::OsRng};
use thiserror::Error;
use zeroize::Zeroizing;

pub use key::{CACHE_CAPACITY, KEY_LEN, derive_key};

/// Header that marks an encrypted file.
pub const MAGIC: &[u8; 16] = b"CONFTREE-ENC-V01";

/// Per-file salt length in bytes.
pub const SALT_LEN: usize = 8;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

const HEADER_LEN: usize = MAGIC.len() + SALT_LEN;

/// Encryption failures, before they are attributed to a file.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Input does not start with [`MAGIC`].
    #[error("data is not encrypted")]
    NotEncrypted,

    /// Input is shorter than the smallest possible envelope.
    #[error("encrypted data is truncated")]
    Truncated,

    /// Tag verification failed: wrong password or modified data.
    #[error("authentication failed")]
    Integrity,

    /// Key derivation could not run.
    #[error("key derivation failed: {0}")]
    Kdf(String),

    /// The cipher rejected its input.
    #[error("cipher failure: {0}")]
    Cipher(String),
}

/// Password used to derive file keys. Zeroized on drop and never printed.
#[derive(Clone)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Wraps a password.
    pub fn new(password: impl Into<String>) -> Self {
        Self(Zeroizing::new(password.into()))
    }

    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

impl From<&str> for Password {
    fn from(password: &str) -> Self {
        Self::new(password)
    }
}

impl From<String> for Password {
    fn from(password: String) -> Self {
        Self::new(password)
    }
}

/// Whether `bytes` carry the encrypted-file header.
pub fn is_encrypted(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// Encrypts `plaintext` under a fresh salt and nonce.
pub fn seal(password: &Password, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| CryptoError::Cipher(format!("invalid key: {e}")))?;

    let mut header = Vec::with_capacity(HEADER_LEN + NONCE_LEN + plaintext.len() + TAG_LEN);
    header.extend_from_slice(MAGIC);
    header.extend_from_slice(&salt);

    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &header,
            },
        )
        .map_err(|e| CryptoError::Cipher(e.to_string()))?;

    let mut out = header;
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Verifies and decrypts a sealed envelope.
pub fn open(password: &Password, bytes: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if !is_encrypted(bytes) {
        return Err(CryptoError::NotEncrypted);
    }
    if bytes.len() < HEADER_LEN + NONCE_LEN + TAG_LEN {
        return Err(CryptoError::Truncated);
    }

    let (header, envelope) = bytes.split_at(HEADER_LEN);
    let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&header[MAGIC.len()..]);

    let key = derive_key(password, &salt)?;
    let cipher = Aes256Gcm::new_from_slice(key.as_slice())
        .map_err(|e| CryptoError::Cipher(format!("invalid key: {e}")))?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: header,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Integrity)
}
