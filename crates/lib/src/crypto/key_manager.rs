//! Session key management
//!
//! Holds the one symmetric key used to seal records during a session.
//! The key is generated on first use and lives only in memory.

use std::fmt;
use std::sync::OnceLock;

use rand::{RngCore, rngs::OsRng};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::errors::CryptoError;
use crate::Result;

/// Key length for AES-256 (32 bytes)
pub const KEY_LENGTH: usize = 32;

/// A 256-bit session key.
///
/// # Security
///
/// The bytes are zeroized when the key is dropped and never appear in
/// `Debug` output.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey {
    bytes: [u8; KEY_LENGTH],
}

impl SessionKey {
    /// Generate a key from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Build a key from known bytes.
    ///
    /// Only exposed for tests that need two handles on the same session.
    #[cfg(any(test, feature = "testing"))]
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { bytes }
    }

    /// Raw key bytes, for [`CipherProvider`](super::CipherProvider) implementations.
    ///
    /// **WARNING**: anything holding these bytes can open every record sealed
    /// in this session. Do not copy them out of the cipher call.
    pub fn expose_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// Owner of the session key.
///
/// The key is created lazily on the first [`current_key`](Self::current_key)
/// call and is never replaced afterwards. Dropping the manager ends the
/// session: records sealed with its key become unreadable to any later
/// manager.
///
/// The manager is passed explicitly (usually behind an `Arc`) to the storage
/// engine, so tests can substitute a manager with a fixed or missing key.
pub struct KeyManager {
    key: OnceLock<SessionKey>,
    disabled: bool,
}

impl KeyManager {
    /// Create a manager that generates its key on first use.
    pub fn new() -> Self {
        Self {
            key: OnceLock::new(),
            disabled: false,
        }
    }

    /// Create a manager that can never produce a key.
    ///
    /// Models a host environment without a usable random source or cipher.
    pub fn disabled() -> Self {
        Self {
            key: OnceLock::new(),
            disabled: true,
        }
    }

    /// Create a manager already holding `key`.
    #[cfg(any(test, feature = "testing"))]
    pub fn with_key(key: SessionKey) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(key);
        Self {
            key: cell,
            disabled: false,
        }
    }

    /// Get the session key, generating it if this is the first use.
    pub fn current_key(&self) -> Result<&SessionKey> {
        if self.disabled {
            return Err(CryptoError::KeyUnavailable.into());
        }

        Ok(self.key.get_or_init(|| {
            tracing::debug!("Generated session key");
            SessionKey::generate()
        }))
    }

    /// Whether [`current_key`](Self::current_key) can succeed.
    pub fn is_available(&self) -> bool {
        !self.disabled
    }

    /// Whether the key has been generated yet.
    pub fn is_initialized(&self) -> bool {
        self.key.get().is_some()
    }
}

impl Default for KeyManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyManager")
            .field("initialized", &self.is_initialized())
            .field("disabled", &self.disabled)
            .finish()
    }
}
