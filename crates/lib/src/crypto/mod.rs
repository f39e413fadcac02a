//! Cryptography for records at rest.
//!
//! - [`KeyManager`] owns the session's AES-256 key.
//! - [`CipherProvider`] seals and opens payloads; [`Aes256GcmProvider`] is the
//!   AES-256-GCM implementation used by default.

pub mod cipher;
pub mod errors;
pub mod key_manager;

pub use cipher::{Aes256GcmProvider, CipherProvider, NONCE_LENGTH, Sealed, TAG_LENGTH};
pub use errors::CryptoError;
pub use key_manager::{KEY_LENGTH, KeyManager, SessionKey};
