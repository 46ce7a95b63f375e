//! Field Resolver: logical field name -> (physical key name, AAD).
//!
//! Physical key lookup, first match wins:
//! 1. an opaque `KEY_FAMILY_<field>` entry names the physical key;
//! 2. an opaque `<field>` entry whose value names an existing keyset entry
//!    (the older aliasing form);
//! 3. the field name itself.
//!
//! The AAD is the opaque `ADDITIONAL_DATA_<field>` entry if present, else the
//! logical field name. It is never derived from the physical name, so fields
//! sharing a keyset do not produce interchangeable ciphertext.

use tracing::debug;

use crate::error::AeadError;
use crate::keyset;
use crate::store::{ConfigStore, ConfigValue};

pub const KEY_FAMILY_PREFIX: &str = "KEY_FAMILY_";
pub const ADDITIONAL_DATA_PREFIX: &str = "ADDITIONAL_DATA_";

/// Resolved key and AAD for one logical field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub field: String,
    pub physical: String,
    pub aad: String,
}

pub async fn resolve(field: &str, store: &ConfigStore) -> Result<FieldBinding, AeadError> {
    let physical = match opaque(store, &format!("{KEY_FAMILY_PREFIX}{field}")).await? {
        Some(name) => name,
        None => legacy_alias(store, field).await?.unwrap_or_else(|| field.to_owned()),
    };
    let aad = opaque(store, &format!("{ADDITIONAL_DATA_PREFIX}{field}"))
        .await?
        .unwrap_or_else(|| field.to_owned());
    debug!(field, physical = %physical, "resolved field binding");
    Ok(FieldBinding {
        field: field.to_owned(),
        physical,
        aad,
    })
}

/// The value of `name` if it is a non-empty string that is not keyset-shaped.
async fn opaque(store: &ConfigStore, name: &str) -> Result<Option<String>, AeadError> {
    Ok(store
        .get_raw(name)
        .await?
        .filter(|raw| !raw.is_empty() && keyset::mask_text(raw).is_none()))
}

async fn legacy_alias(store: &ConfigStore, field: &str) -> Result<Option<String>, AeadError> {
    let Some(target) = opaque(store, field).await? else {
        return Ok(None);
    };
    if target == field {
        return Ok(None);
    }
    match store.get(&target).await {
        Ok(Some(ConfigValue::Keyset(_))) => Ok(Some(target)),
        Ok(_) | Err(AeadError::Decode(_)) | Err(AeadError::InvalidKeyset(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
