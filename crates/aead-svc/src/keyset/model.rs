//! Keyset domain model: entries, statuses, algorithm families, and the
//! lifecycle transforms that produce new keyset values.

use std::fmt;
use std::str::FromStr;

use aes_gcm::aead::{rand_core::RngCore, OsRng};
use thiserror::Error;

use super::proto::{self, ProtoError};

/// Type URL of the deterministic (AES-SIV) key family.
pub const DETERMINISTIC_TYPE_URL: &str = "type.googleapis.com/google.crypto.tink.AesSivKey";

/// Type URL of the probabilistic (AES-GCM) key family.
pub const PROBABILISTIC_TYPE_URL: &str = "type.googleapis.com/google.crypto.tink.AesGcmKey";

/// The only key material type this service stores.
pub const SYMMETRIC: &str = "SYMMETRIC";

/// Errors produced while decoding, validating, or transforming a keyset.
#[derive(Debug, Error)]
pub enum KeysetError {
    /// The keyset JSON or a field inside it could not be decoded.
    #[error("malformed keyset: {0}")]
    Decode(String),

    /// Key material does not decode to a key of the right length.
    #[error("invalid key material for key {key_id}: {reason}")]
    Material { key_id: u32, reason: String },

    /// The keyset has no entries.
    #[error("keyset has no keys")]
    Empty,

    /// Entries from different algorithm families share one container.
    #[error("keyset mixes deterministic and probabilistic keys")]
    MixedAlgorithms,

    /// `primaryKeyId` does not name an entry.
    #[error("primary key id {0} does not reference a key in the keyset")]
    DanglingPrimary(u32),

    /// Two entries share a key ID.
    #[error("duplicate key id {0}")]
    DuplicateKeyId(u32),

    /// A transform named a key ID that is not present.
    #[error("unknown key id {0}")]
    UnknownKeyId(u32),

    /// A renumbering collides with an existing key ID.
    #[error("key id {0} already exists")]
    Conflict(u32),

    /// The entry cannot become primary because it is not enabled.
    #[error("key {0} is not enabled")]
    DisabledKey(u32),

    /// Serialising the keyset failed.
    #[error("failed to encode keyset: {0}")]
    Encode(String),
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Algorithm family of a keyset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// AES-256-SIV deterministic AEAD.
    Deterministic,
    /// AES-GCM probabilistic AEAD.
    Probabilistic,
}

impl Algorithm {
    /// The wire `typeUrl` of this family.
    pub fn type_url(&self) -> &'static str {
        match self {
            Algorithm::Deterministic => DETERMINISTIC_TYPE_URL,
            Algorithm::Probabilistic => PROBABILISTIC_TYPE_URL,
        }
    }

    /// Classify a wire `typeUrl`.
    pub fn from_type_url(url: &str) -> Option<Self> {
        match url {
            DETERMINISTIC_TYPE_URL => Some(Algorithm::Deterministic),
            PROBABILISTIC_TYPE_URL => Some(Algorithm::Probabilistic),
            _ => None,
        }
    }

    /// Label reported by `read-keytypes`.
    pub fn label(&self) -> &'static str {
        match self {
            Algorithm::Deterministic => "DETERMINISTIC",
            Algorithm::Probabilistic => "NON DETERMINISTIC",
        }
    }

    /// Proto field number of `key_value` in this family's key message.
    pub(crate) fn key_field(&self) -> u32 {
        match self {
            Algorithm::Deterministic => 2,
            Algorithm::Probabilistic => 3,
        }
    }

    fn accepts_key_len(&self, len: usize) -> bool {
        match self {
            Algorithm::Deterministic => len == 64,
            Algorithm::Probabilistic => len == 16 || len == 32,
        }
    }

    fn generated_key_len(&self) -> usize {
        match self {
            Algorithm::Deterministic => 64,
            Algorithm::Probabilistic => 32,
        }
    }
}

/// Lifecycle status of a key entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStatus {
    Enabled,
    Disabled,
    Destroyed,
}

impl KeyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyStatus::Enabled => "ENABLED",
            KeyStatus::Disabled => "DISABLED",
            KeyStatus::Destroyed => "DESTROYED",
        }
    }
}

impl FromStr for KeyStatus {
    type Err = KeysetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ENABLED" => Ok(KeyStatus::Enabled),
            "DISABLED" => Ok(KeyStatus::Disabled),
            "DESTROYED" => Ok(KeyStatus::Destroyed),
            other => Err(KeysetError::Decode(format!("unknown key status {other:?}"))),
        }
    }
}

/// How a key marks the ciphertext it produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputPrefix {
    /// `0x01 || key_id` (big-endian).
    Tink,
    /// `0x00 || key_id` (big-endian).
    Legacy,
    /// Same bytes as [`OutputPrefix::Legacy`].
    Crunchy,
    /// No prefix.
    Raw,
}

/// Length of the non-empty output prefixes.
pub const PREFIX_LEN: usize = 5;

impl OutputPrefix {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputPrefix::Tink => "TINK",
            OutputPrefix::Legacy => "LEGACY",
            OutputPrefix::Crunchy => "CRUNCHY",
            OutputPrefix::Raw => "RAW",
        }
    }

    /// The bytes prepended to ciphertext produced by key `key_id`.
    pub fn bytes(&self, key_id: u32) -> Vec<u8> {
        let start = match self {
            OutputPrefix::Tink => 0x01,
            OutputPrefix::Legacy | OutputPrefix::Crunchy => 0x00,
            OutputPrefix::Raw => return Vec::new(),
        };
        let mut out = Vec::with_capacity(PREFIX_LEN);
        out.push(start);
        out.extend_from_slice(&key_id.to_be_bytes());
        out
    }
}

impl FromStr for OutputPrefix {
    type Err = KeysetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TINK" => Ok(OutputPrefix::Tink),
            "LEGACY" => Ok(OutputPrefix::Legacy),
            "CRUNCHY" => Ok(OutputPrefix::Crunchy),
            "RAW" => Ok(OutputPrefix::Raw),
            other => Err(KeysetError::Decode(format!("unknown output prefix type {other:?}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Key material
// ---------------------------------------------------------------------------

/// Serialized key message plus the raw AES key extracted from it.
///
/// Both buffers are zeroed on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    encoded: Vec<u8>,
    key: Vec<u8>,
}

impl KeyMaterial {
    /// Parse a serialized key message for `algorithm`.
    ///
    /// The encoded bytes are kept verbatim so the container re-serializes
    /// exactly as it was imported.
    pub fn from_encoded(algorithm: Algorithm, encoded: Vec<u8>) -> Result<Self, ProtoError> {
        let key = proto::decode_key(algorithm.key_field(), &encoded)?.to_vec();
        Ok(Self { encoded, key })
    }

    /// Generate fresh random key material for `algorithm`.
    pub fn generate(algorithm: Algorithm) -> Self {
        let mut key = vec![0u8; algorithm.generated_key_len()];
        OsRng.fill_bytes(&mut key);
        let encoded = proto::encode_key(algorithm.key_field(), &key);
        Self { encoded, key }
    }

    /// The serialized key message, as carried in `keyData.value`.
    pub fn encoded(&self) -> &[u8] {
        &self.encoded
    }

    /// The raw AES key bytes.
    pub fn key(&self) -> &[u8] {
        &self.key
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.encoded.iter_mut().for_each(|b| *b = 0);
        self.key.iter_mut().for_each(|b| *b = 0);
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial([REDACTED])")
    }
}

// ---------------------------------------------------------------------------
// Entries and keysets
// ---------------------------------------------------------------------------

/// One key within a keyset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    pub key_id: u32,
    pub algorithm: Algorithm,
    pub status: KeyStatus,
    pub material: KeyMaterial,
    pub output_prefix: OutputPrefix,
}

impl KeyEntry {
    /// A fresh enabled entry with `TINK` output prefix.
    fn generate(key_id: u32, algorithm: Algorithm) -> Self {
        Self {
            key_id,
            algorithm,
            status: KeyStatus::Enabled,
            material: KeyMaterial::generate(algorithm),
            output_prefix: OutputPrefix::Tink,
        }
    }
}

/// A validated, single-family container of keys with one primary.
///
/// Values are immutable; every lifecycle transform returns a new keyset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyset {
    primary_key_id: u32,
    keys: Vec<KeyEntry>,
}

impl Keyset {
    /// Build a keyset, enforcing the structural invariants.
    ///
    /// # Errors
    ///
    /// Returns [`KeysetError::Empty`], [`KeysetError::DuplicateKeyId`],
    /// [`KeysetError::MixedAlgorithms`] or [`KeysetError::DanglingPrimary`].
    pub fn new(primary_key_id: u32, keys: Vec<KeyEntry>) -> Result<Self, KeysetError> {
        let first = keys.first().ok_or(KeysetError::Empty)?;
        let algorithm = first.algorithm;
        for (i, entry) in keys.iter().enumerate() {
            if entry.algorithm != algorithm {
                return Err(KeysetError::MixedAlgorithms);
            }
            if keys[..i].iter().any(|e| e.key_id == entry.key_id) {
                return Err(KeysetError::DuplicateKeyId(entry.key_id));
            }
            if !algorithm.accepts_key_len(entry.material.key().len()) {
                return Err(KeysetError::Material {
                    key_id: entry.key_id,
                    reason: format!("unexpected key length {}", entry.material.key().len()),
                });
            }
        }
        if !keys.iter().any(|e| e.key_id == primary_key_id) {
            return Err(KeysetError::DanglingPrimary(primary_key_id));
        }
        Ok(Self {
            primary_key_id,
            keys,
        })
    }

    /// Generate a single-key keyset of `algorithm` with a random key ID.
    pub fn generate(algorithm: Algorithm) -> Self {
        let key_id = random_key_id(&[]);
        Self {
            primary_key_id: key_id,
            keys: vec![KeyEntry::generate(key_id, algorithm)],
        }
    }

    pub fn primary_key_id(&self) -> u32 {
        self.primary_key_id
    }

    pub fn keys(&self) -> &[KeyEntry] {
        &self.keys
    }

    /// The algorithm family shared by every entry.
    pub fn algorithm(&self) -> Algorithm {
        self.keys[0].algorithm
    }

    /// The entry new data is encrypted under.
    pub fn primary(&self) -> &KeyEntry {
        // `new` guarantees the primary resolves; the fallback is unreachable.
        self.entry(self.primary_key_id).unwrap_or(&self.keys[0])
    }

    pub fn entry(&self, key_id: u32) -> Option<&KeyEntry> {
        self.keys.iter().find(|e| e.key_id == key_id)
    }

    fn position(&self, key_id: u32) -> Result<usize, KeysetError> {
        self.keys
            .iter()
            .position(|e| e.key_id == key_id)
            .ok_or(KeysetError::UnknownKeyId(key_id))
    }

    // -----------------------------------------------------------------------
    // Lifecycle transforms
    // -----------------------------------------------------------------------

    /// Append a fresh key of the same family and make it primary.
    ///
    /// Returns the new keyset and the new primary key ID.
    pub fn rotated(&self) -> (Self, u32) {
        let existing: Vec<u32> = self.keys.iter().map(|e| e.key_id).collect();
        let key_id = random_key_id(&existing);
        let mut next = self.clone();
        next.keys.push(KeyEntry::generate(key_id, self.algorithm()));
        next.primary_key_id = key_id;
        (next, key_id)
    }

    /// Set the status of entry `key_id`.
    pub fn with_status(&self, key_id: u32, status: KeyStatus) -> Result<Self, KeysetError> {
        let idx = self.position(key_id)?;
        let mut next = self.clone();
        next.keys[idx].status = status;
        Ok(next)
    }

    /// Replace the key material of entry `key_id`, keeping its ID, status and family.
    pub fn with_material(&self, key_id: u32, material: KeyMaterial) -> Result<Self, KeysetError> {
        let idx = self.position(key_id)?;
        if !self.algorithm().accepts_key_len(material.key().len()) {
            return Err(KeysetError::Material {
                key_id,
                reason: format!("unexpected key length {}", material.key().len()),
            });
        }
        let mut next = self.clone();
        next.keys[idx].material = material;
        Ok(next)
    }

    /// Renumber entry `old` to `new`, following the primary if it moves.
    pub fn with_key_id(&self, old: u32, new: u32) -> Result<Self, KeysetError> {
        let idx = self.position(old)?;
        if old == new {
            return Ok(self.clone());
        }
        if self.entry(new).is_some() {
            return Err(KeysetError::Conflict(new));
        }
        let mut next = self.clone();
        next.keys[idx].key_id = new;
        if next.primary_key_id == old {
            next.primary_key_id = new;
        }
        Ok(next)
    }

    /// Make the enabled entry `key_id` primary.
    pub fn with_primary(&self, key_id: u32) -> Result<Self, KeysetError> {
        let idx = self.position(key_id)?;
        if self.keys[idx].status != KeyStatus::Enabled {
            return Err(KeysetError::DisabledKey(key_id));
        }
        let mut next = self.clone();
        next.primary_key_id = key_id;
        Ok(next)
    }
}

/// Draw a random non-zero key ID not present in `taken`.
fn random_key_id(taken: &[u32]) -> u32 {
    loop {
        let id = OsRng.next_u32();
        if id != 0 && !taken.contains(&id) {
            return id;
        }
    }
}
