//! Key Lifecycle Manager: create, import, rotate, and the targeted patches.
//!
//! Every mutation resolves the physical key name, takes the per-name lock,
//! reads the current keyset, applies a pure transform from
//! [`crate::keyset::Keyset`], writes the result, and returns it masked.

use std::collections::BTreeMap;

use common::{BatchResponse, FieldMap, Operation};
use serde_json::Value;
use tracing::{info, warn};

use crate::error::AeadError;
use crate::keyset::{self, codec, Algorithm, KeyStatus, Keyset};
use crate::resolver::resolve;
use crate::store::ConfigStore;

/// One field's lifecycle request, parsed from its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOp {
    Create { algorithm: Algorithm, overwrite: bool },
    Import(String),
    Rotate,
    UpdateStatus(Vec<(u32, KeyStatus)>),
    UpdateMaterial(Vec<(u32, String)>),
    UpdateKeyId(Vec<(u32, u32)>),
    UpdatePrimary(u32),
}

impl KeyOp {
    /// Parse the payload of `field` for `op`.
    ///
    /// Returns `None` when `op` is not a lifecycle verb.
    pub fn parse(op: Operation, payload: &Value) -> Option<Result<Self, AeadError>> {
        let parsed = match op {
            Operation::CreateAeadKey => Ok(KeyOp::Create {
                algorithm: Algorithm::Probabilistic,
                overwrite: false,
            }),
            Operation::CreateAeadKeyOverwrite => Ok(KeyOp::Create {
                algorithm: Algorithm::Probabilistic,
                overwrite: true,
            }),
            Operation::CreateDaeadKey => Ok(KeyOp::Create {
                algorithm: Algorithm::Deterministic,
                overwrite: false,
            }),
            Operation::CreateDaeadKeyOverwrite => Ok(KeyOp::Create {
                algorithm: Algorithm::Deterministic,
                overwrite: true,
            }),
            Operation::ImportKey => match payload {
                Value::String(s) => Ok(KeyOp::Import(s.clone())),
                Value::Object(_) => Ok(KeyOp::Import(payload.to_string())),
                _ => Err(AeadError::BadRequest("keyset must be a JSON string or object".into())),
            },
            Operation::Rotate => Ok(KeyOp::Rotate),
            Operation::UpdateKeyStatus => id_map(payload, |v| {
                let s = v
                    .as_str()
                    .ok_or_else(|| AeadError::BadRequest("status must be a string".into()))?;
                s.parse::<KeyStatus>()
                    .map_err(|_| AeadError::BadRequest(format!("unknown status {s:?}")))
            })
            .map(KeyOp::UpdateStatus),
            Operation::UpdateKeyMaterial => id_map(payload, |v| {
                v.as_str()
                    .map(str::to_owned)
                    .ok_or_else(|| AeadError::BadRequest("key material must be a base64 string".into()))
            })
            .map(KeyOp::UpdateMaterial),
            Operation::UpdateKeyId => id_map(payload, parse_key_id).map(KeyOp::UpdateKeyId),
            Operation::UpdatePrimaryKeyId => parse_key_id(payload).map(KeyOp::UpdatePrimary),
            _ => return None,
        };
        Some(parsed)
    }
}

/// Accept a key ID as a JSON number or a decimal string.
pub fn parse_key_id(v: &Value) -> Result<u32, AeadError> {
    let parsed = match v {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| AeadError::BadRequest(format!("invalid key id {v}")))
}

fn id_map<T>(
    payload: &Value,
    mut value: impl FnMut(&Value) -> Result<T, AeadError>,
) -> Result<Vec<(u32, T)>, AeadError> {
    let map = payload
        .as_object()
        .ok_or_else(|| AeadError::BadRequest("expected an object keyed by key id".into()))?;
    map.iter()
        .map(|(id, v)| {
            let id = id
                .parse::<u32>()
                .map_err(|_| AeadError::BadRequest(format!("invalid key id {id:?}")))?;
            Ok((id, value(v)?))
        })
        .collect()
}

/// Applies lifecycle operations through the config store.
#[derive(Clone)]
pub struct KeyManager {
    store: ConfigStore,
}

impl KeyManager {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    /// Generate a single-key keyset for `field`.
    ///
    /// Without `overwrite`, an existing entry is left untouched and the
    /// `"<field> key exists"` message is returned instead.
    pub async fn create(&self, field: &str, algorithm: Algorithm, overwrite: bool) -> Result<String, AeadError> {
        let binding = resolve(field, &self.store).await?;
        let lock = self.store.lock(&binding.physical).await?;
        if !overwrite && self.store.get_raw(&binding.physical).await?.is_some() {
            return Ok(format!("{field} key exists"));
        }
        let ks = Keyset::generate(algorithm);
        self.store.put_keyset(&lock, &ks).await?;
        let op = if overwrite { "create-overwrite" } else { "create" };
        info!(
            op,
            field,
            physical = %binding.physical,
            algorithm = algorithm.label(),
            key_ids = ?[ks.primary_key_id()],
            "keyset created"
        );
        Ok(keyset::encode_masked(&ks)?)
    }

    /// Store a caller-supplied keyset, replacing whatever was there.
    ///
    /// `raw` is persisted exactly as given once it validates.
    pub async fn import(&self, field: &str, raw: &str) -> Result<String, AeadError> {
        let ks = keyset::decode(raw)?;
        let binding = resolve(field, &self.store).await?;
        let lock = self.store.lock(&binding.physical).await?;
        self.store.put_raw(&lock, raw.to_owned()).await?;
        let ids: Vec<u32> = ks.keys().iter().map(|e| e.key_id).collect();
        info!(op = "import", field, physical = %binding.physical, key_ids = ?ids, "keyset imported");
        Ok(keyset::encode_masked(&ks)?)
    }

    pub async fn rotate(&self, field: &str) -> Result<String, AeadError> {
        self.mutate(field, "rotate", |ks| {
            let (next, id) = ks.rotated();
            Ok((next, vec![id]))
        })
        .await
    }

    pub async fn update_status(&self, field: &str, changes: &[(u32, KeyStatus)]) -> Result<String, AeadError> {
        self.mutate(field, "update-key-status", |ks| {
            let mut next = ks.clone();
            for &(id, status) in changes {
                next = next.with_status(id, status)?;
                if status != KeyStatus::Enabled && id == next.primary_key_id() {
                    warn!(field, key_id = id, "primary key disabled; encryption blocked until a new primary is set");
                }
            }
            Ok((next, changes.iter().map(|c| c.0).collect()))
        })
        .await
    }

    pub async fn update_material(&self, field: &str, changes: &[(u32, String)]) -> Result<String, AeadError> {
        self.mutate(field, "update-key-material", |ks| {
            let mut next = ks.clone();
            for (id, value) in changes {
                let material = codec::decode_material(ks.algorithm(), *id, value)?;
                next = next.with_material(*id, material)?;
            }
            Ok((next, changes.iter().map(|c| c.0).collect()))
        })
        .await
    }

    /// Renumber entries in order. Any failure leaves the stored keyset unchanged.
    pub async fn update_key_id(&self, field: &str, changes: &[(u32, u32)]) -> Result<String, AeadError> {
        self.mutate(field, "update-key-id", |ks| {
            let mut next = ks.clone();
            for &(old, new) in changes {
                next = next.with_key_id(old, new)?;
            }
            Ok((next, changes.iter().flat_map(|&(o, n)| [o, n]).collect()))
        })
        .await
    }

    pub async fn update_primary(&self, field: &str, key_id: u32) -> Result<String, AeadError> {
        self.mutate(field, "update-primary-key-id", |ks| Ok((ks.with_primary(key_id)?, vec![key_id])))
            .await
    }

    async fn mutate<F>(&self, field: &str, op: &'static str, transform: F) -> Result<String, AeadError>
    where
        F: FnOnce(&Keyset) -> Result<(Keyset, Vec<u32>), AeadError>,
    {
        let binding = resolve(field, &self.store).await?;
        let lock = self.store.lock(&binding.physical).await?;
        let current = self
            .store
            .load_keyset(&binding.physical)
            .await?
            .ok_or_else(|| AeadError::KeyNotFound(binding.physical.clone()))?;
        let (next, ids) = transform(&current)?;
        self.store.put_keyset(&lock, &next).await?;
        info!(
            op,
            field,
            physical = %binding.physical,
            key_ids = ?ids,
            primary = next.primary_key_id(),
            "keyset updated"
        );
        Ok(keyset::encode_masked(&next)?)
    }

    pub async fn apply(&self, field: &str, op: KeyOp) -> Result<String, AeadError> {
        match op {
            KeyOp::Create { algorithm, overwrite } => self.create(field, algorithm, overwrite).await,
            KeyOp::Import(raw) => self.import(field, &raw).await,
            KeyOp::Rotate => self.rotate(field).await,
            KeyOp::UpdateStatus(c) => self.update_status(field, &c).await,
            KeyOp::UpdateMaterial(c) => self.update_material(field, &c).await,
            KeyOp::UpdateKeyId(c) => self.update_key_id(field, &c).await,
            KeyOp::UpdatePrimary(id) => self.update_primary(field, id).await,
        }
    }

    /// Apply `op` to every field of `batch`, collecting per-field results.
    ///
    /// Fields are processed in key order; a failed field never aborts the rest.
    pub async fn apply_batch(&self, op: Operation, batch: &FieldMap) -> Result<BatchResponse, AeadError> {
        let mut data = FieldMap::new();
        let mut errors = BTreeMap::new();
        for (field, payload) in batch {
            let parsed = KeyOp::parse(op, payload)
                .ok_or_else(|| AeadError::Internal(format!("{op} is not a lifecycle operation")))?;
            match parsed {
                Ok(key_op) => match self.apply(field, key_op).await {
                    Ok(text) => {
                        data.insert(field.clone(), Value::String(text));
                    }
                    Err(e) => {
                        warn!(op = %op, field = %field, error = %e, "lifecycle operation failed");
                        errors.insert(field.clone(), e.to_response().with_field(field.as_str()));
                    }
                },
                Err(e) => {
                    errors.insert(field.clone(), e.to_response().with_field(field.as_str()));
                }
            }
        }
        Ok(BatchResponse { data, errors })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::json;

    use crate::crypto::{self, cipher};
    use crate::engine::{CryptoEngine, FailurePolicy, KeyScope};
    use crate::keyset::{OutputPrefix, REDACTION_TOKEN};
    use crate::store::{MemoryStore, WriteMode};
    use crate::test_vectors::*;

    fn manager() -> (KeyManager, ConfigStore) {
        let store = ConfigStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(1));
        (KeyManager::new(store.clone()), store)
    }

    async fn encrypt_with_stored(store: &ConfigStore, name: &str, pt: &[u8], aad: &[u8]) -> Vec<u8> {
        let ks = store.load_keyset(name).await.unwrap().unwrap();
        crypto::encrypt(&ks, pt, aad).unwrap()
    }

    #[tokio::test]
    async fn create_if_absent_is_idempotent() {
        let (km, store) = manager();
        let first = km.create("addr2", Algorithm::Deterministic, false).await.unwrap();
        assert_eq!(first.matches(REDACTION_TOKEN).count(), 1);
        let before = encrypt_with_stored(&store, "addr2", b"my address", b"addr2").await;
        let second = km.create("addr2", Algorithm::Deterministic, false).await.unwrap();
        assert_eq!(second, "addr2 key exists");
        let after = encrypt_with_stored(&store, "addr2", b"my address", b"addr2").await;
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn create_overwrite_replaces_material() {
        let (km, store) = manager();
        km.create("f", Algorithm::Deterministic, false).await.unwrap();
        let before = encrypt_with_stored(&store, "f", b"x", b"f").await;
        km.create("f", Algorithm::Deterministic, true).await.unwrap();
        let after = encrypt_with_stored(&store, "f", b"x", b"f").await;
        assert_ne!(before, after);
    }

    #[tokio::test]
    async fn concurrent_creates_produce_one_keyset() {
        let (km, _store) = manager();
        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let km = km.clone();
            tasks.spawn(async move { km.create("race", Algorithm::Probabilistic, false).await.unwrap() });
        }
        let mut created = 0;
        while let Some(res) = tasks.join_next().await {
            if res.unwrap() != "race key exists" {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn import_rejects_masked_and_mixed_input() {
        let (km, _store) = manager();
        let masked = keyset::mask_text(DETERMINISTIC_KEYSET).unwrap().unwrap();
        assert!(matches!(km.import("f", &masked).await, Err(AeadError::Decode(_))));

        let mut mixed: serde_json::Value = serde_json::from_str(NON_DETERMINISTIC_SINGLE_KEY).unwrap();
        let det: serde_json::Value = serde_json::from_str(DETERMINISTIC_SINGLE_KEY).unwrap();
        mixed["key"].as_array_mut().unwrap().push(det["key"][0].clone());
        assert!(matches!(
            km.import("f", &mixed.to_string()).await,
            Err(AeadError::InvalidKeyset(_))
        ));
    }

    #[tokio::test]
    async fn import_overwrites_and_reencodes_exactly() {
        let (km, store) = manager();
        km.create("f", Algorithm::Probabilistic, false).await.unwrap();
        km.import("f", DETERMINISTIC_KEYSET).await.unwrap();
        assert_eq!(store.get_raw("f").await.unwrap().as_deref(), Some(DETERMINISTIC_KEYSET));
    }

    #[tokio::test]
    async fn import_keeps_caller_formatting() {
        let (km, store) = manager();
        let parsed: serde_json::Value = serde_json::from_str(NON_DETERMINISTIC_SINGLE_KEY).unwrap();
        let pretty = serde_json::to_string_pretty(&parsed).unwrap();
        assert_ne!(pretty, NON_DETERMINISTIC_SINGLE_KEY);
        km.import("f", &pretty).await.unwrap();
        assert_eq!(store.get_raw("f").await.unwrap().as_deref(), Some(pretty.as_str()));
        assert!(store.load_keyset("f").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn rotate_requires_existing_keyset() {
        let (km, _store) = manager();
        assert!(matches!(km.rotate("nothing").await, Err(AeadError::KeyNotFound(_))));
    }

    #[tokio::test]
    async fn rotate_changes_primary_and_keeps_old_ciphertext_readable() {
        let (km, store) = manager();
        km.import("f", NON_DETERMINISTIC_KEYSET).await.unwrap();
        let old = encrypt_with_stored(&store, "f", b"v", b"f").await;
        let masked = km.rotate("f").await.unwrap();
        assert!(!masked.contains("\"primaryKeyId\":3192631270"));
        assert_eq!(masked.matches(REDACTION_TOKEN).count(), 5);
        let ks = store.load_keyset("f").await.unwrap().unwrap();
        assert_eq!(crypto::decrypt(&ks, &old, b"f").unwrap(), b"v");
    }

    #[tokio::test]
    async fn update_status_disables_key() {
        let (km, _store) = manager();
        km.import("k", DETERMINISTIC_SINGLE_KEY).await.unwrap();
        let out = km.update_status("k", &[(1481824018, KeyStatus::Disabled)]).await.unwrap();
        assert!(out.contains("\"status\":\"DISABLED\",\"keyId\":1481824018"));
        assert!(matches!(
            km.update_status("k", &[(7, KeyStatus::Enabled)]).await,
            Err(AeadError::UnknownKeyId(7))
        ));
    }

    #[tokio::test]
    async fn update_material_swaps_key_bytes() {
        let (km, store) = manager();
        let engine = CryptoEngine::new(store.clone());
        km.import("k", DETERMINISTIC_KEYSET).await.unwrap();
        let before = encrypt_with_stored(&store, "k", b"the data", b"k").await;
        let other = "EkCXhcXHvfUMj8DWgWjfnxyWFz3GcOw8G1xB2PTcfPdbl93idxHTcmANzYLYW3KmsU0putTRfi3vxySALhSHaHl0";
        let out = km.update_material("k", &[(97978150, other.into())]).await.unwrap();
        assert_eq!(out.matches(REDACTION_TOKEN).count(), 6);

        // New encryptions are SIV under the replaced material, behind the primary's prefix.
        let material = codec::decode_material(Algorithm::Deterministic, 97978150, other).unwrap();
        let mut expected = OutputPrefix::Tink.bytes(97978150);
        expected.extend(cipher::siv_encrypt(material.key(), b"the data", b"k").unwrap());
        assert_ne!(before, expected);

        let input: FieldMap = json!({"k": "the data"}).as_object().cloned().unwrap();
        let ct = engine
            .encrypt(&input, KeyScope::Inner, FailurePolicy::FailFast)
            .await
            .unwrap();
        assert_eq!(ct.data["k"], STANDARD.encode(&expected));
        let pt = engine
            .decrypt(&ct.data, KeyScope::Inner, FailurePolicy::FailFast)
            .await
            .unwrap();
        assert_eq!(pt.data, input);

        // Material from the other family has the wrong length.
        let gcm = "GiBa0wZ4ACjtW137qTVSY2ofQBCffdzkzhNkktlMtDFazA==";
        assert!(matches!(
            km.update_material("k", &[(97978150, gcm.into())]).await,
            Err(AeadError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn update_key_id_follows_primary() {
        let (km, _store) = manager();
        km.import("k", NON_DETERMINISTIC_KEYSET).await.unwrap();
        let out = km.update_key_id("k", &[(3192631270, 3192631271)]).await.unwrap();
        assert!(out.contains("\"primaryKeyId\":3192631271"));
        assert!(!out.contains("3192631270"));
    }

    #[tokio::test]
    async fn failed_renumber_leaves_keyset_untouched() {
        let (km, store) = manager();
        km.import("k", NON_DETERMINISTIC_KEYSET).await.unwrap();
        let res = km
            .update_key_id("k", &[(3192631270, 1), (2832419897, 2233686170)])
            .await;
        assert!(matches!(res, Err(AeadError::Conflict(2233686170))));
        assert_eq!(store.get_raw("k").await.unwrap().as_deref(), Some(NON_DETERMINISTIC_KEYSET));
    }

    #[tokio::test]
    async fn update_primary_requires_enabled_entry() {
        let (km, _store) = manager();
        km.import("k", DETERMINISTIC_KEYSET).await.unwrap();
        let out = km.update_primary("k", 2568362933).await.unwrap();
        assert!(out.contains("\"primaryKeyId\":2568362933"));
        km.update_status("k", &[(3167099089, KeyStatus::Disabled)]).await.unwrap();
        assert!(matches!(km.update_primary("k", 3167099089).await, Err(AeadError::DisabledKey(3167099089))));
        assert!(matches!(km.update_primary("k", 5).await, Err(AeadError::UnknownKeyId(5))));
    }

    #[tokio::test]
    async fn family_alias_targets_shared_keyset() {
        let (km, store) = manager();
        store
            .write("KEY_FAMILY_phone", "ADDRESS_FAMILY".into(), WriteMode::Overwrite)
            .await
            .unwrap();
        km.import("ADDRESS_FAMILY", DETERMINISTIC_KEYSET).await.unwrap();
        let out = km.create("phone", Algorithm::Deterministic, false).await.unwrap();
        assert_eq!(out, "phone key exists");
        km.rotate("phone").await.unwrap();
        let ks = store.load_keyset("ADDRESS_FAMILY").await.unwrap().unwrap();
        assert_eq!(ks.keys().len(), 7);
        assert!(store.get_raw("phone").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn batch_reports_errors_per_field() {
        let (km, _store) = manager();
        km.import("good", DETERMINISTIC_SINGLE_KEY).await.unwrap();
        let batch = json!({
            "good": {"1481824018": "DISABLED"},
            "missing": {"1": "DISABLED"},
            "bad": {"1": 17},
        });
        let resp = km
            .apply_batch(Operation::UpdateKeyStatus, batch.as_object().unwrap())
            .await
            .unwrap();
        assert!(resp.data["good"].as_str().unwrap().contains("DISABLED"));
        assert_eq!(resp.errors["missing"].code, common::ErrorCode::KeyNotFound);
        assert_eq!(resp.errors["bad"].code, common::ErrorCode::BadRequest);
        assert_eq!(resp.errors["bad"].field.as_deref(), Some("bad"));
    }

    #[test]
    fn key_ids_parse_from_numbers_and_strings() {
        assert_eq!(parse_key_id(&json!(42)).unwrap(), 42);
        assert_eq!(parse_key_id(&json!("2568362933")).unwrap(), 2568362933);
        assert!(parse_key_id(&json!(-1)).is_err());
        assert!(parse_key_id(&json!(5_000_000_000u64)).is_err());
        assert!(parse_key_id(&json!(true)).is_err());
    }

    #[test]
    fn payloads_parse_per_operation() {
        assert_eq!(
            KeyOp::parse(Operation::UpdateKeyId, &json!({"3192631270": "3192631271"})).unwrap().unwrap(),
            KeyOp::UpdateKeyId(vec![(3192631270, 3192631271)])
        );
        assert_eq!(
            KeyOp::parse(Operation::CreateDaeadKeyOverwrite, &json!("")).unwrap().unwrap(),
            KeyOp::Create {
                algorithm: Algorithm::Deterministic,
                overwrite: true
            }
        );
        assert!(KeyOp::parse(Operation::Encrypt, &json!("x")).is_none());
        assert!(KeyOp::parse(Operation::UpdateKeyStatus, &json!({"1": "enabled"})).unwrap().is_err());
    }
}
