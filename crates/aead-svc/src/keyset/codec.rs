//! Canonical JSON form of a keyset and the masking transform.
//!
//! ```text
//! {"primaryKeyId":<u32>,"key":[{"keyData":{"typeUrl":..,"value":<base64>,
//!   "keyMaterialType":"SYMMETRIC"},"status":..,"keyId":<u32>,"outputPrefixType":..}]}
//! ```
//!
//! Field order is fixed by the struct declarations below; the output is
//! consumed verbatim by downstream tooling.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use super::model::{Algorithm, KeyEntry, KeyMaterial, Keyset, KeysetError, SYMMETRIC};

/// Token that replaces every `keyData.value` in externally visible reads.
pub const REDACTION_TOKEN: &str = "***";

/// Wire shape of a keyset.
///
/// String-typed enums keep the shape permissive: anything with these field
/// names is keyset-shaped (and therefore masked on read) even when its values
/// are invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysetJson {
    pub primary_key_id: u32,
    pub key: Vec<KeyJson>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyJson {
    pub key_data: KeyDataJson,
    pub status: String,
    pub key_id: u32,
    pub output_prefix_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyDataJson {
    pub type_url: String,
    pub value: String,
    #[serde(default)]
    pub key_material_type: String,
}

impl KeysetJson {
    /// Parse `text` into the keyset shape without validating it.
    pub fn parse(text: &str) -> Result<Self, KeysetError> {
        serde_json::from_str(text).map_err(|e| KeysetError::Decode(e.to_string()))
    }

    /// A copy with every key's material replaced by [`REDACTION_TOKEN`].
    pub fn masked(&self) -> Self {
        let mut out = self.clone();
        for key in &mut out.key {
            key.key_data.value = REDACTION_TOKEN.to_owned();
        }
        out
    }

    /// Compact JSON text.
    pub fn to_text(&self) -> Result<String, KeysetError> {
        serde_json::to_string(self).map_err(|e| KeysetError::Encode(e.to_string()))
    }
}

impl From<&Keyset> for KeysetJson {
    fn from(ks: &Keyset) -> Self {
        Self {
            primary_key_id: ks.primary_key_id(),
            key: ks
                .keys()
                .iter()
                .map(|e| KeyJson {
                    key_data: KeyDataJson {
                        type_url: e.algorithm.type_url().to_owned(),
                        value: STANDARD.encode(e.material.encoded()),
                        key_material_type: SYMMETRIC.to_owned(),
                    },
                    status: e.status.as_str().to_owned(),
                    key_id: e.key_id,
                    output_prefix_type: e.output_prefix.as_str().to_owned(),
                })
                .collect(),
        }
    }
}

impl TryFrom<KeysetJson> for Keyset {
    type Error = KeysetError;

    fn try_from(json: KeysetJson) -> Result<Self, Self::Error> {
        let keys = json
            .key
            .into_iter()
            .map(decode_entry)
            .collect::<Result<Vec<_>, _>>()?;
        Keyset::new(json.primary_key_id, keys)
    }
}

fn decode_entry(k: KeyJson) -> Result<KeyEntry, KeysetError> {
    let key_id = k.key_id;
    let algorithm = Algorithm::from_type_url(&k.key_data.type_url)
        .ok_or_else(|| KeysetError::Decode(format!("unsupported typeUrl {:?}", k.key_data.type_url)))?;
    if k.key_data.key_material_type != SYMMETRIC {
        return Err(KeysetError::Decode(format!(
            "unsupported keyMaterialType {:?}",
            k.key_data.key_material_type
        )));
    }
    let material = decode_material(algorithm, key_id, &k.key_data.value)?;
    Ok(KeyEntry {
        key_id,
        algorithm,
        status: k.status.parse()?,
        material,
        output_prefix: k.output_prefix_type.parse()?,
    })
}

/// Decode a base64 `keyData.value` into key material for `algorithm`.
pub fn decode_material(algorithm: Algorithm, key_id: u32, value: &str) -> Result<KeyMaterial, KeysetError> {
    let encoded = STANDARD.decode(value).map_err(|e| KeysetError::Material {
        key_id,
        reason: format!("value is not base64: {e}"),
    })?;
    KeyMaterial::from_encoded(algorithm, encoded).map_err(|e| KeysetError::Material {
        key_id,
        reason: e.to_string(),
    })
}

/// Decode and validate keyset JSON text.
///
/// # Errors
///
/// Returns [`KeysetError::Decode`] / [`KeysetError::Material`] for malformed
/// input and the structural variants for invariant violations.
pub fn decode(text: &str) -> Result<Keyset, KeysetError> {
    Keyset::try_from(KeysetJson::parse(text)?)
}

/// Encode a keyset to its canonical JSON text.
pub fn encode(ks: &Keyset) -> Result<String, KeysetError> {
    KeysetJson::from(ks).to_text()
}

/// Canonical JSON text of `ks` with all material redacted.
pub fn encode_masked(ks: &Keyset) -> Result<String, KeysetError> {
    KeysetJson::from(ks).masked().to_text()
}

/// Mask `text` if it is keyset-shaped; `None` for any other string.
pub fn mask_text(text: &str) -> Option<Result<String, KeysetError>> {
    KeysetJson::parse(text).ok().map(|json| json.masked().to_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyset::model::KeyStatus;
    use crate::test_vectors::{DETERMINISTIC_KEYSET, NON_DETERMINISTIC_SINGLE_KEY};

    #[test]
    fn decode_classifies_family_from_type_url() {
        assert_eq!(decode(DETERMINISTIC_KEYSET).unwrap().algorithm(), Algorithm::Deterministic);
        assert_eq!(decode(NON_DETERMINISTIC_SINGLE_KEY).unwrap().algorithm(), Algorithm::Probabilistic);
    }

    #[test]
    fn imported_keysets_reencode_byte_identically() {
        for text in [DETERMINISTIC_KEYSET, NON_DETERMINISTIC_SINGLE_KEY] {
            let ks = decode(text).unwrap();
            assert_eq!(encode(&ks).unwrap(), text);
        }
    }

    #[test]
    fn mask_replaces_every_value_and_hides_material() {
        let ks = decode(DETERMINISTIC_KEYSET).unwrap();
        let masked = encode_masked(&ks).unwrap();
        assert_eq!(masked.matches(REDACTION_TOKEN).count(), ks.keys().len());
        let original = KeysetJson::parse(DETERMINISTIC_KEYSET).unwrap();
        for key in &original.key {
            assert!(!masked.contains(&key.key_data.value));
        }
    }

    #[test]
    fn masked_keyset_cannot_be_decoded_as_material() {
        let masked = mask_text(NON_DETERMINISTIC_SINGLE_KEY).unwrap().unwrap();
        assert!(matches!(decode(&masked), Err(KeysetError::Material { .. })));
    }

    #[test]
    fn plain_strings_are_not_masked() {
        assert!(mask_text("mundo").is_none());
        assert!(mask_text(r#"{"hello":"world"}"#).is_none());
    }

    #[test]
    fn mixed_keyset_json_rejected() {
        let det = KeysetJson::parse(DETERMINISTIC_KEYSET).unwrap();
        let mut prob = KeysetJson::parse(NON_DETERMINISTIC_SINGLE_KEY).unwrap();
        prob.key.push(det.key[0].clone());
        let text = prob.to_text().unwrap();
        assert!(matches!(decode(&text), Err(KeysetError::MixedAlgorithms)));
    }

    #[test]
    fn unknown_type_url_is_a_decode_error() {
        let text = NON_DETERMINISTIC_SINGLE_KEY.replace("AesGcmKey", "HmacKey");
        assert!(matches!(decode(&text), Err(KeysetError::Decode(_))));
    }

    #[test]
    fn dangling_primary_in_json_rejected() {
        let text = NON_DETERMINISTIC_SINGLE_KEY.replace("\"primaryKeyId\":1416257722", "\"primaryKeyId\":7");
        assert!(matches!(decode(&text), Err(KeysetError::DanglingPrimary(7))));
    }

    #[test]
    fn malformed_json_is_a_decode_error() {
        assert!(matches!(decode("{not json"), Err(KeysetError::Decode(_))));
    }

    #[test]
    fn generated_keyset_round_trips() {
        let ks = Keyset::generate(Algorithm::Probabilistic);
        let text = encode(&ks).unwrap();
        let back = decode(&text).unwrap();
        assert_eq!(back, ks);
        assert!(text.contains("\"outputPrefixType\":\"TINK\""));
        assert!(text.contains(&format!("\"keyId\":{}", ks.primary_key_id())));
    }

    #[test]
    fn disabled_status_survives_encoding() {
        let ks = decode(NON_DETERMINISTIC_SINGLE_KEY).unwrap();
        let next = ks.with_status(1416257722, KeyStatus::Disabled).unwrap();
        let text = encode_masked(&next).unwrap();
        assert!(text.contains("\"status\":\"DISABLED\",\"keyId\":1416257722"));
    }
}
