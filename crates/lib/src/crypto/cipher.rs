//! Authenticated encryption of record payloads.
//!
//! Payloads are sealed with AES-256-GCM. Every call to
//! [`CipherProvider::seal`] draws a fresh random nonce; callers can not
//! supply one. Callers bind the record's physical key and deadline as
//! associated data (see [`associated_data`](crate::storage::record::associated_data)),
//! so a ciphertext moved to another key or given a new deadline no longer
//! authenticates.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, KeyInit, Nonce, Tag,
    aead::{AeadCore, AeadInPlace, OsRng},
};

use super::{errors::CryptoError, key_manager::SessionKey};
use crate::Result;

/// Nonce length for AES-GCM (12 bytes standard)
pub const NONCE_LENGTH: usize = 12;

/// Authentication tag length for AES-GCM (16 bytes)
pub const TAG_LENGTH: usize = 16;

/// Output of a seal operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sealed {
    /// Random nonce used for this seal.
    pub nonce: Vec<u8>,
    /// Ciphertext, same length as the plaintext.
    pub ciphertext: Vec<u8>,
    /// Detached authentication tag.
    pub tag: Vec<u8>,
}

/// An AEAD cipher used to protect records at rest.
///
/// Implementations must generate their own nonce on every [`seal`](Self::seal)
/// and must fail closed in [`open`](Self::open) when the tag does not verify.
pub trait CipherProvider: Send + Sync + fmt::Debug {
    /// Algorithm identifier, e.g. `"aes-256-gcm"`.
    fn algorithm(&self) -> &'static str;

    /// Encrypt `plaintext` under `key`, authenticating `aad` alongside it.
    fn seal(&self, key: &SessionKey, aad: &[u8], plaintext: &[u8]) -> Result<Sealed>;

    /// Verify and decrypt a sealed payload.
    ///
    /// # Errors
    /// - [`CryptoError::Authentication`] if the tag does not verify (tampering,
    ///   wrong key, or wrong associated data)
    /// - [`CryptoError::Decryption`] for malformed nonce or tag lengths
    fn open(&self, key: &SessionKey, aad: &[u8], sealed: &Sealed) -> Result<Vec<u8>>;
}

/// AES-256-GCM cipher provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes256GcmProvider;

impl Aes256GcmProvider {
    fn cipher(key: &SessionKey) -> std::result::Result<Aes256Gcm, String> {
        Aes256Gcm::new_from_slice(key.expose_bytes())
            .map_err(|e| format!("Failed to create cipher: {e}"))
    }
}

impl CipherProvider for Aes256GcmProvider {
    fn algorithm(&self) -> &'static str {
        "aes-256-gcm"
    }

    fn seal(&self, key: &SessionKey, aad: &[u8], plaintext: &[u8]) -> Result<Sealed> {
        let cipher = Self::cipher(key).map_err(|reason| CryptoError::Encryption { reason })?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(&nonce, aad, &mut buffer)
            .map_err(|e| CryptoError::Encryption {
                reason: format!("Encryption failed: {e}"),
            })?;

        Ok(Sealed {
            nonce: nonce.to_vec(),
            ciphertext: buffer,
            tag: tag.to_vec(),
        })
    }

    fn open(&self, key: &SessionKey, aad: &[u8], sealed: &Sealed) -> Result<Vec<u8>> {
        if sealed.nonce.len() != NONCE_LENGTH {
            return Err(CryptoError::Decryption {
                reason: format!(
                    "Invalid nonce length: expected {}, got {}",
                    NONCE_LENGTH,
                    sealed.nonce.len()
                ),
            }
            .into());
        }

        if sealed.tag.len() != TAG_LENGTH {
            return Err(CryptoError::Decryption {
                reason: format!(
                    "Invalid tag length: expected {}, got {}",
                    TAG_LENGTH,
                    sealed.tag.len()
                ),
            }
            .into());
        }

        let cipher = Self::cipher(key).map_err(|reason| CryptoError::Decryption { reason })?;

        let mut buffer = sealed.ciphertext.clone();
        cipher
            .decrypt_in_place_detached(
                Nonce::from_slice(&sealed.nonce),
                aad,
                &mut buffer,
                Tag::from_slice(&sealed.tag),
            )
            .map_err(|_| CryptoError::Authentication)?;

        Ok(buffer)
    }
}
