//! Transport-facing error classification shared across crates.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable error code carried in every [`ErrorResponse`](crate::protocol::ErrorResponse).
///
/// Variants map to HTTP status codes returned to callers:
/// - [`ErrorCode::DecodeError`], [`ErrorCode::InvalidKeyset`], [`ErrorCode::BadRequest`],
///   [`ErrorCode::AuthenticationFailure`] → 400
/// - [`ErrorCode::Forbidden`] → 403
/// - [`ErrorCode::KeyNotFound`], [`ErrorCode::UnknownKeyId`], [`ErrorCode::NotFound`] → 404
/// - [`ErrorCode::Conflict`], [`ErrorCode::DisabledKey`] → 409
/// - [`ErrorCode::StoreUnavailable`] → 503
/// - [`ErrorCode::Internal`] → 500
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Keyset JSON (or key material inside it) could not be decoded.
    DecodeError,
    /// Keyset decoded but violates a container invariant.
    InvalidKeyset,
    /// No keyset exists for the resolved physical key name.
    KeyNotFound,
    /// A patch operation referenced a key ID that is not in the keyset.
    UnknownKeyId,
    /// A patch operation would create a duplicate key ID.
    Conflict,
    /// The key that would be used (or made primary) is not enabled.
    DisabledKey,
    /// Ciphertext failed verification under every candidate key.
    AuthenticationFailure,
    /// The config store could not be reached in time. Retryable.
    StoreUnavailable,
    /// The operation payload was malformed.
    BadRequest,
    /// The caller lacks the capability required for the operation.
    Forbidden,
    /// The requested route does not exist.
    NotFound,
    /// An unexpected internal error occurred.
    #[serde(rename = "internal_error")]
    Internal,
}

impl ErrorCode {
    /// Returns the HTTP status code that should be sent for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::DecodeError
            | ErrorCode::InvalidKeyset
            | ErrorCode::BadRequest
            | ErrorCode::AuthenticationFailure => 400,
            ErrorCode::Forbidden => 403,
            ErrorCode::KeyNotFound | ErrorCode::UnknownKeyId | ErrorCode::NotFound => 404,
            ErrorCode::Conflict | ErrorCode::DisabledKey => 409,
            ErrorCode::StoreUnavailable => 503,
            ErrorCode::Internal => 500,
        }
    }

    /// Whether the caller may retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::StoreUnavailable)
    }

    /// The snake_case code string used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DecodeError => "decode_error",
            ErrorCode::InvalidKeyset => "invalid_keyset",
            ErrorCode::KeyNotFound => "key_not_found",
            ErrorCode::UnknownKeyId => "unknown_key_id",
            ErrorCode::Conflict => "conflict",
            ErrorCode::DisabledKey => "disabled_key",
            ErrorCode::AuthenticationFailure => "authentication_failure",
            ErrorCode::StoreUnavailable => "store_unavailable",
            ErrorCode::BadRequest => "bad_request",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::NotFound => "not_found",
            ErrorCode::Internal => "internal_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
