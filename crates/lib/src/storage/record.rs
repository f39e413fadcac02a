//! Persisted record envelope.
//!
//! Every value lives in the record store as a JSON envelope:
//!
//! ```text
//! {"kind":"plain","value":"<codec text>","expiresAt":null,"createdAt":1704067200000}
//! {"kind":"cipher","nonce":"<b64>","ciphertext":"<b64>","tag":"<b64>","expiresAt":...,"createdAt":...}
//! ```
//!
//! The envelope is self-describing, so a reader can always tell a plaintext
//! record from an encrypted one without any external metadata.

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    codec::CodecError,
    crypto::Sealed,
};

/// Separator between namespace and key in a physical key.
pub const NAMESPACE_SEPARATOR: char = ':';

/// Build the physical record-store key for a logical key.
///
/// The global namespace (empty string) maps a key to itself. Global keys
/// may contain the separator, so a global caller can address any raw host
/// key, including records written under a named namespace.
pub fn physical_key(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{namespace}{NAMESPACE_SEPARATOR}{key}")
    }
}

/// Prefix shared by every physical key of a namespace.
pub fn namespace_prefix(namespace: &str) -> String {
    if namespace.is_empty() {
        String::new()
    } else {
        format!("{namespace}{NAMESPACE_SEPARATOR}")
    }
}

/// Logical key of `physical_key` when it belongs to `namespace`.
///
/// A physical key containing the separator belongs to the namespace before
/// it, so the global namespace only owns keys without one.
pub fn logical_key<'a>(namespace: &str, physical_key: &'a str) -> Option<&'a str> {
    if namespace.is_empty() {
        (!physical_key.contains(NAMESPACE_SEPARATOR)).then_some(physical_key)
    } else {
        physical_key
            .strip_prefix(namespace)?
            .strip_prefix(NAMESPACE_SEPARATOR)
    }
}

/// Associated data a sealed record is bound to.
///
/// Covers the physical key and the expiration deadline, so a sealed record
/// neither opens under another key nor survives a rewritten deadline. The
/// key is length-prefixed to keep the encoding unambiguous.
pub fn associated_data(physical_key: &str, expires_at: Option<u64>) -> Vec<u8> {
    let mut aad = Vec::with_capacity(8 + physical_key.len() + 9);
    aad.extend_from_slice(&(physical_key.len() as u64).to_be_bytes());
    aad.extend_from_slice(physical_key.as_bytes());
    match expires_at {
        Some(deadline) => {
            aad.push(1);
            aad.extend_from_slice(&deadline.to_be_bytes());
        }
        None => aad.push(0),
    }
    aad
}

/// Stored payload, tagged by `kind`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Payload {
    /// Codec text stored as-is.
    Plain { value: String },
    /// AEAD-sealed codec text.
    Cipher {
        #[serde(with = "base64_bytes")]
        nonce: Vec<u8>,
        #[serde(with = "base64_bytes")]
        ciphertext: Vec<u8>,
        #[serde(with = "base64_bytes")]
        tag: Vec<u8>,
    },
}

impl Payload {
    /// Whether this payload is encrypted.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Payload::Cipher { .. })
    }

    /// Short name of the payload kind, as written in the envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Plain { .. } => "plain",
            Payload::Cipher { .. } => "cipher",
        }
    }
}

impl From<Sealed> for Payload {
    fn from(sealed: Sealed) -> Self {
        Payload::Cipher {
            nonce: sealed.nonce,
            ciphertext: sealed.ciphertext,
            tag: sealed.tag,
        }
    }
}

/// Envelope as written to the record store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(flatten)]
    pub payload: Payload,
    #[serde(default)]
    pub expires_at: Option<u64>,
    pub created_at: u64,
}

/// A record addressed by namespace and logical key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageRecord {
    /// Logical partition; empty means global.
    pub namespace: String,
    /// Caller-supplied logical name.
    pub key: String,
    /// Plaintext or sealed payload.
    pub payload: Payload,
    /// Absolute expiration deadline in epoch milliseconds.
    pub expires_at: Option<u64>,
    /// Write time in epoch milliseconds, for diagnostics.
    pub created_at: u64,
}

impl StorageRecord {
    /// Address of this record in the record store.
    pub fn physical_key(&self) -> String {
        physical_key(&self.namespace, &self.key)
    }

    /// Whether the record's deadline has passed at `now_millis`.
    pub fn is_expired(&self, now_millis: u64) -> bool {
        self.expires_at.is_some_and(|deadline| now_millis > deadline)
    }

    /// Whether the payload is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.payload.is_encrypted()
    }

    /// Serialize the envelope to its stored string.
    pub fn to_raw(&self) -> Result<String> {
        let envelope = Envelope {
            payload: self.payload.clone(),
            expires_at: self.expires_at,
            created_at: self.created_at,
        };
        serde_json::to_string(&envelope).map_err(|e| {
            CodecError::Unencodable {
                reason: format!("Failed to serialize envelope: {e}"),
            }
            .into()
        })
    }

    /// Parse a stored string.
    ///
    /// # Errors
    /// [`CodecError::Malformed`] if `raw` is not a valid envelope.
    pub fn from_raw(namespace: &str, key: &str, raw: &str) -> Result<Self> {
        let envelope = parse_envelope(raw)?;
        Ok(Self {
            namespace: namespace.to_string(),
            key: key.to_string(),
            payload: envelope.payload,
            expires_at: envelope.expires_at,
            created_at: envelope.created_at,
        })
    }
}

/// Parse a stored string into an envelope without attaching an address.
pub fn parse_envelope(raw: &str) -> Result<Envelope> {
    serde_json::from_str(raw).map_err(|e| {
        CodecError::Malformed {
            reason: format!("Invalid envelope: {e}"),
        }
        .into()
    })
}

mod base64_bytes {
    use base64ct::{Base64, Encoding};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&Base64::encode_string(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        Base64::decode_vec(&text).map_err(serde::de::Error::custom)
    }
}
