//! Operation catalogue and the request/response bodies exchanged with callers.
//!
//! Every request body is a JSON object mapping a field name to an
//! operation-specific payload; every batch response mirrors that shape.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ErrorCode;

/// A JSON object keyed by field name.
pub type FieldMap = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Operation catalogue
// ---------------------------------------------------------------------------

/// The abstract verbs a transport must expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ReadInfo,
    ReadConfig,
    WriteConfig,
    WriteConfigOverwrite,
    DeleteConfig,
    ReadKeyTypes,
    CreateAeadKey,
    CreateAeadKeyOverwrite,
    CreateDaeadKey,
    CreateDaeadKeyOverwrite,
    ImportKey,
    Rotate,
    UpdateKeyStatus,
    UpdateKeyMaterial,
    UpdateKeyId,
    UpdatePrimaryKeyId,
    Encrypt,
    Decrypt,
    EncryptCol,
    DecryptCol,
    RevealKey,
    Health,
}

impl Operation {
    /// The verb name, e.g. `"update-key-status"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ReadInfo => "read-info",
            Operation::ReadConfig => "read-config",
            Operation::WriteConfig => "write-config",
            Operation::WriteConfigOverwrite => "write-config-overwrite",
            Operation::DeleteConfig => "delete-config",
            Operation::ReadKeyTypes => "read-keytypes",
            Operation::CreateAeadKey => "create-aead-key",
            Operation::CreateAeadKeyOverwrite => "create-aead-key-overwrite",
            Operation::CreateDaeadKey => "create-daead-key",
            Operation::CreateDaeadKeyOverwrite => "create-daead-key-overwrite",
            Operation::ImportKey => "import-key",
            Operation::Rotate => "rotate",
            Operation::UpdateKeyStatus => "update-key-status",
            Operation::UpdateKeyMaterial => "update-key-material",
            Operation::UpdateKeyId => "update-key-id",
            Operation::UpdatePrimaryKeyId => "update-primary-key-id",
            Operation::Encrypt => "encrypt",
            Operation::Decrypt => "decrypt",
            Operation::EncryptCol => "encrypt-col",
            Operation::DecryptCol => "decrypt-col",
            Operation::RevealKey => "reveal-key",
            Operation::Health => "health",
        }
    }

    /// The HTTP route serving this verb.
    ///
    /// Reads of the config map share the `/v1/config` route with writes; the
    /// method distinguishes them.
    pub fn path(&self) -> &'static str {
        match self {
            Operation::ReadInfo => "/v1/info",
            Operation::ReadConfig | Operation::WriteConfig => "/v1/config",
            Operation::WriteConfigOverwrite => "/v1/config-overwrite",
            Operation::DeleteConfig => "/v1/config-delete",
            Operation::ReadKeyTypes => "/v1/keytypes",
            Operation::CreateAeadKey => "/v1/create-aead-key",
            Operation::CreateAeadKeyOverwrite => "/v1/create-aead-key-overwrite",
            Operation::CreateDaeadKey => "/v1/create-daead-key",
            Operation::CreateDaeadKeyOverwrite => "/v1/create-daead-key-overwrite",
            Operation::ImportKey => "/v1/import-key",
            Operation::Rotate => "/v1/rotate",
            Operation::UpdateKeyStatus => "/v1/update-key-status",
            Operation::UpdateKeyMaterial => "/v1/update-key-material",
            Operation::UpdateKeyId => "/v1/update-key-id",
            Operation::UpdatePrimaryKeyId => "/v1/update-primary-key-id",
            Operation::Encrypt => "/v1/encrypt",
            Operation::Decrypt => "/v1/decrypt",
            Operation::EncryptCol => "/v1/encrypt-col",
            Operation::DecryptCol => "/v1/decrypt-col",
            Operation::RevealKey => "/v1/reveal-key",
            Operation::Health => "/health",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Batch responses
// ---------------------------------------------------------------------------

/// Response body for every field-keyed operation.
///
/// `data` mirrors the request shape with each successful field replaced by its
/// result. `errors` maps a field (or dotted leaf path) to the failure for that
/// field and is omitted when empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResponse {
    /// Per-field results.
    pub data: FieldMap,
    /// Per-field failures keyed by field name or dotted path.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub errors: BTreeMap<String, ErrorResponse>,
}

impl BatchResponse {
    /// Returns `true` if no field failed.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Response body for `read-info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    /// Service name.
    pub name: String,
    /// Service version string.
    pub version: String,
}

// ---------------------------------------------------------------------------
// Error response
// ---------------------------------------------------------------------------

/// Standard error body, returned on any non-2xx status and inside
/// [`BatchResponse::errors`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short machine-readable error code.
    pub code: ErrorCode,
    /// Human-readable description safe to expose to callers.
    pub message: String,
    /// Field or dotted leaf path the error belongs to, when request-fatal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    /// Construct an [`ErrorResponse`] from a code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field: None,
        }
    }

    /// Attach the field or leaf path that failed.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Health check
// ---------------------------------------------------------------------------

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall service status: `"ok"` or `"degraded"`.
    pub status: String,
    /// Whether the config store answered within its deadline.
    pub store_reachable: bool,
}
