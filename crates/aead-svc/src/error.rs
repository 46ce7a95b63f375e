//! Service-wide error type.
//!
//! Every failure the core can report is an [`AeadError`] value; each maps onto
//! a transport-facing [`ErrorCode`].

use common::{ErrorCode, ErrorResponse};
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::keyset::KeysetError;
use crate::store::StoreError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AeadError {
    /// Malformed keyset JSON or key material.
    #[error("decode error: {0}")]
    Decode(String),

    /// Keyset violates a structural invariant.
    #[error("invalid keyset: {0}")]
    InvalidKeyset(String),

    /// No keyset exists under the physical key name.
    #[error("no keyset for {0}")]
    KeyNotFound(String),

    #[error("unknown key id {0}")]
    UnknownKeyId(u32),

    #[error("key id {0} already exists")]
    Conflict(u32),

    /// The key is not enabled for the requested use.
    #[error("key {0} is not enabled")]
    DisabledKey(u32),

    /// Ciphertext failed verification. Deliberately carries no detail.
    #[error("authentication failure")]
    AuthenticationFailure,

    /// Collaborator I/O failed or exceeded its deadline. Retryable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Malformed operation payload.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AeadError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AeadError::Decode(_) => ErrorCode::DecodeError,
            AeadError::InvalidKeyset(_) => ErrorCode::InvalidKeyset,
            AeadError::KeyNotFound(_) => ErrorCode::KeyNotFound,
            AeadError::UnknownKeyId(_) => ErrorCode::UnknownKeyId,
            AeadError::Conflict(_) => ErrorCode::Conflict,
            AeadError::DisabledKey(_) => ErrorCode::DisabledKey,
            AeadError::AuthenticationFailure => ErrorCode::AuthenticationFailure,
            AeadError::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            AeadError::BadRequest(_) => ErrorCode::BadRequest,
            AeadError::Forbidden(_) => ErrorCode::Forbidden,
            AeadError::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::new(self.code(), self.to_string())
    }
}

impl From<KeysetError> for AeadError {
    fn from(e: KeysetError) -> Self {
        match e {
            KeysetError::Decode(_) | KeysetError::Material { .. } => AeadError::Decode(e.to_string()),
            KeysetError::Empty
            | KeysetError::MixedAlgorithms
            | KeysetError::DanglingPrimary(_)
            | KeysetError::DuplicateKeyId(_) => AeadError::InvalidKeyset(e.to_string()),
            KeysetError::UnknownKeyId(id) => AeadError::UnknownKeyId(id),
            KeysetError::Conflict(id) => AeadError::Conflict(id),
            KeysetError::DisabledKey(id) => AeadError::DisabledKey(id),
            KeysetError::Encode(msg) => AeadError::Internal(msg),
        }
    }
}

impl From<StoreError> for AeadError {
    fn from(e: StoreError) -> Self {
        AeadError::StoreUnavailable(e.to_string())
    }
}

impl From<CryptoError> for AeadError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::DisabledPrimary(id) => AeadError::DisabledKey(id),
            // Primitive failures on decrypt are indistinguishable from a wrong key.
            CryptoError::AuthenticationFailure | CryptoError::Cipher(_) => AeadError::AuthenticationFailure,
        }
    }
}
