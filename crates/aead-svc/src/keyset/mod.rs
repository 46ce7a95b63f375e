//! Keyset model, canonical JSON codec, and masking.

pub mod codec;
pub mod model;
pub mod proto;

pub use codec::{decode, encode, encode_masked, mask_text, KeysetJson, REDACTION_TOKEN};
pub use model::{Algorithm, KeyEntry, KeyMaterial, KeyStatus, Keyset, KeysetError, OutputPrefix};
