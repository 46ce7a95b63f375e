//! Keyset-level encryption: output prefixes, primary selection and
//! candidate search on decrypt.

use thiserror::Error;

use super::cipher::{self, CipherError};
use crate::keyset::{Algorithm, KeyEntry, KeyStatus, Keyset, OutputPrefix};
use crate::keyset::model::PREFIX_LEN;

/// Errors produced when encrypting or decrypting under a whole keyset.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// The primary entry is not enabled, so nothing may be encrypted.
    #[error("primary key {0} is not enabled")]
    DisabledPrimary(u32),

    /// No eligible entry authenticated the ciphertext.
    #[error("ciphertext did not authenticate under any key")]
    AuthenticationFailure,

    /// The primitive rejected the operation.
    #[error(transparent)]
    Cipher(#[from] CipherError),
}

/// Encrypt `plaintext` under the primary of `ks`, returning `prefix || body`.
pub fn encrypt(ks: &Keyset, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let primary = ks.primary();
    if primary.status != KeyStatus::Enabled {
        return Err(CryptoError::DisabledPrimary(primary.key_id));
    }
    let body = seal(primary, plaintext, aad)?;
    let mut out = primary.output_prefix.bytes(primary.key_id);
    out.extend_from_slice(&body);
    Ok(out)
}

/// Decrypt `ciphertext` against every non-destroyed entry of `ks`.
///
/// Entries whose output prefix matches the leading bytes are tried first,
/// then `RAW` entries against the whole input.
pub fn decrypt(ks: &Keyset, ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() > PREFIX_LEN {
        let (prefix, body) = ciphertext.split_at(PREFIX_LEN);
        let prefixed = ks.keys().iter().filter(|e| {
            e.status != KeyStatus::Destroyed
                && e.output_prefix != OutputPrefix::Raw
                && e.output_prefix.bytes(e.key_id) == prefix
        });
        for entry in prefixed {
            if let Ok(pt) = open(entry, body, aad) {
                return Ok(pt);
            }
        }
    }
    let raw = ks
        .keys()
        .iter()
        .filter(|e| e.status != KeyStatus::Destroyed && e.output_prefix == OutputPrefix::Raw);
    for entry in raw {
        if let Ok(pt) = open(entry, ciphertext, aad) {
            return Ok(pt);
        }
    }
    Err(CryptoError::AuthenticationFailure)
}

fn seal(entry: &KeyEntry, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    match entry.algorithm {
        Algorithm::Deterministic => cipher::siv_encrypt(entry.material.key(), plaintext, aad),
        Algorithm::Probabilistic => cipher::gcm_encrypt(entry.material.key(), plaintext, aad),
    }
}

fn open(entry: &KeyEntry, body: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    match entry.algorithm {
        Algorithm::Deterministic => cipher::siv_decrypt(entry.material.key(), body, aad),
        Algorithm::Probabilistic => cipher::gcm_decrypt(entry.material.key(), body, aad),
    }
}
