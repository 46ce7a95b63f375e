//! AEAD primitives and keyset-level encrypt/decrypt.
//!
//! This module is free of storage and HTTP dependencies.
//!
//! # Ciphertext format
//!
//! ```text
//! deterministic:  prefix || siv_tag(16) || ct
//! probabilistic:  prefix || iv(12) || ct || tag(16)
//! prefix:         0x01 || key_id (TINK) | 0x00 || key_id (LEGACY) | empty (RAW)
//! ```

pub mod cipher;
pub mod keyset_cipher;

pub use keyset_cipher::{decrypt, encrypt, CryptoError};
