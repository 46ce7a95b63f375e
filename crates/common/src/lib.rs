//! Common types, protocol definitions, and error codes shared across `aead-svc` crates.

pub mod error;
pub mod protocol;

pub use error::ErrorCode;
pub use protocol::{BatchResponse, ErrorResponse, FieldMap, Operation};
