//! Single-key AEAD primitives.
//!
//! **Deterministic:** AES-SIV (RFC 5297) with one associated-data component.
//! Output is `siv_tag(16) || ciphertext`. Identical key, AAD and plaintext
//! always produce identical bytes, which keeps encrypted columns joinable.
//!
//! **Probabilistic:** AES-GCM with a fresh random 96-bit IV per call.
//! Output is `iv(12) || ciphertext || tag(16)`.
//!
//! **Do NOT derive the GCM IV from the plaintext or AAD.** GCM nonce reuse
//! breaks both confidentiality and authentication; use AES-SIV when equality
//! of ciphertext is required.

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, Nonce, OsRng, Payload},
    Aes128Gcm, Aes256Gcm,
};
use aes_siv::siv::Aes256Siv;
use thiserror::Error;

/// Byte length of an AES-256-SIV key (two AES-256 keys).
pub const SIV_KEY_LEN: usize = 64;

/// Byte length of the AES-GCM IV.
pub const IV_LEN: usize = 12;

/// Byte length of the AES-GCM and AES-SIV authentication tags.
pub const TAG_LEN: usize = 16;

/// Errors produced by the cipher layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The key has a length the algorithm does not accept.
    #[error("invalid key length {0}")]
    InvalidKeyLength(usize),

    /// Sealing failed, or the ciphertext did not authenticate.
    #[error("aead operation failed")]
    AeadFailure,

    /// The input is shorter than the fixed overhead of the format.
    #[error("ciphertext too short")]
    CiphertextTooShort,
}

/// Deterministically encrypt `plaintext` under a 64-byte AES-SIV key.
pub fn siv_encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    build_siv(key)?
        .encrypt([aad], plaintext)
        .map_err(|_| CipherError::AeadFailure)
}

/// Reverse [`siv_encrypt`].
pub fn siv_decrypt(key: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    if ciphertext.len() < TAG_LEN {
        return Err(CipherError::CiphertextTooShort);
    }
    build_siv(key)?
        .decrypt([aad], ciphertext)
        .map_err(|_| CipherError::AeadFailure)
}

/// Encrypt `plaintext` under a 16- or 32-byte AES-GCM key with a random IV.
pub fn gcm_encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);
    let sealed = match key.len() {
        16 => gcm_seal::<Aes128Gcm>(key, &iv, plaintext, aad)?,
        32 => gcm_seal::<Aes256Gcm>(key, &iv, plaintext, aad)?,
        n => return Err(CipherError::InvalidKeyLength(n)),
    };
    let mut out = Vec::with_capacity(IV_LEN + sealed.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&sealed);
    Ok(out)
}

/// Reverse [`gcm_encrypt`].
pub fn gcm_decrypt(key: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    if ciphertext.len() < IV_LEN + TAG_LEN {
        return Err(CipherError::CiphertextTooShort);
    }
    let (iv, sealed) = ciphertext.split_at(IV_LEN);
    match key.len() {
        16 => gcm_open::<Aes128Gcm>(key, iv, sealed, aad),
        32 => gcm_open::<Aes256Gcm>(key, iv, sealed, aad),
        n => Err(CipherError::InvalidKeyLength(n)),
    }
}

fn build_siv(key: &[u8]) -> Result<Aes256Siv, CipherError> {
    if key.len() != SIV_KEY_LEN {
        return Err(CipherError::InvalidKeyLength(key.len()));
    }
    Aes256Siv::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))
}

fn gcm_seal<C: Aead + KeyInit>(key: &[u8], iv: &[u8], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = C::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
    cipher
        .encrypt(Nonce::<C>::from_slice(iv), Payload { msg, aad })
        .map_err(|_| CipherError::AeadFailure)
}

fn gcm_open<C: Aead + KeyInit>(key: &[u8], iv: &[u8], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    let cipher = C::new_from_slice(key).map_err(|_| CipherError::InvalidKeyLength(key.len()))?;
    cipher
        .decrypt(Nonce::<C>::from_slice(iv), Payload { msg, aad })
        .map_err(|_| CipherError::AeadFailure)
}
