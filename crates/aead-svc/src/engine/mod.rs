//! Crypto Engine: field-keyed encrypt/decrypt over flat, row and column
//! batches.
//!
//! Each request resolves its distinct fields concurrently, once, then
//! transforms every leaf against that per-request cache. Keysets are never
//! created here; a field with no keyset fails with `KeyNotFound`.

pub mod batch;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{BatchResponse, FieldMap};
use serde_json::Value;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::crypto;
use crate::error::AeadError;
use crate::keyset::Keyset;
use crate::resolver::{resolve, FieldBinding};
use crate::store::ConfigStore;

pub use batch::{BatchMode, FailurePolicy, KeyScope};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::Encrypt => "encrypt",
            Direction::Decrypt => "decrypt",
        }
    }
}

/// A leaf failure that aborted a fail-fast batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafError {
    /// Dotted path of the failing leaf.
    pub path: String,
    pub error: AeadError,
}

struct Bound {
    binding: FieldBinding,
    keyset: Keyset,
}

type BindCache = HashMap<String, Result<Arc<Bound>, AeadError>>;

#[derive(Clone)]
pub struct CryptoEngine {
    store: ConfigStore,
}

impl CryptoEngine {
    pub fn new(store: ConfigStore) -> Self {
        Self { store }
    }

    pub async fn encrypt(
        &self,
        batch: &FieldMap,
        scope: KeyScope,
        policy: FailurePolicy,
    ) -> Result<BatchResponse, LeafError> {
        self.run(Direction::Encrypt, batch, scope, policy).await
    }

    pub async fn decrypt(
        &self,
        batch: &FieldMap,
        scope: KeyScope,
        policy: FailurePolicy,
    ) -> Result<BatchResponse, LeafError> {
        self.run(Direction::Decrypt, batch, scope, policy).await
    }

    async fn run(
        &self,
        direction: Direction,
        batch: &FieldMap,
        scope: KeyScope,
        policy: FailurePolicy,
    ) -> Result<BatchResponse, LeafError> {
        let leaves = batch::collect(batch, scope);
        let fields: BTreeSet<String> = leaves.iter().map(|l| l.field.clone()).collect();
        let cache = self.bind_all(fields).await;

        let mut results = HashMap::with_capacity(leaves.len());
        let mut response = BatchResponse::default();
        for leaf in &leaves {
            let outcome = match &leaf.value {
                Value::String(text) => match cache.get(&leaf.field) {
                    Some(Ok(bound)) => transform(direction, bound, text),
                    Some(Err(e)) => Err(e.clone()),
                    None => Err(AeadError::Internal(format!("no binding for {}", leaf.field))),
                },
                _ => Err(AeadError::BadRequest("only string values can be processed".into())),
            };
            match outcome {
                Ok(v) => {
                    results.insert(leaf.path.clone(), Value::String(v));
                }
                Err(error) => {
                    let path = leaf.dotted();
                    warn!(op = direction.as_str(), path = %path, code = %error.code(), "leaf failed");
                    if policy == FailurePolicy::FailFast {
                        return Err(LeafError { path, error });
                    }
                    response
                        .errors
                        .insert(path.clone(), error.to_response().with_field(path));
                }
            }
        }
        response.data = batch::rebuild(batch, &mut results);
        debug!(
            op = direction.as_str(),
            leaves = leaves.len(),
            failed = response.errors.len(),
            "batch processed"
        );
        Ok(response)
    }

    async fn bind_all(&self, fields: BTreeSet<String>) -> BindCache {
        let mut tasks = JoinSet::new();
        for field in fields {
            let store = self.store.clone();
            tasks.spawn(async move {
                let bound = bind(&store, &field).await.map(Arc::new);
                (field, bound)
            });
        }
        let mut cache = BindCache::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((field, bound)) => {
                    cache.insert(field, bound);
                }
                Err(e) => warn!(error = %e, "field binding task failed"),
            }
        }
        cache
    }
}

async fn bind(store: &ConfigStore, field: &str) -> Result<Bound, AeadError> {
    let binding = resolve(field, store).await?;
    let keyset = store
        .load_keyset(&binding.physical)
        .await?
        .ok_or_else(|| AeadError::KeyNotFound(binding.physical.clone()))?;
    debug!(
        field = %binding.field,
        physical = %binding.physical,
        primary = keyset.primary_key_id(),
        "keyset bound"
    );
    Ok(Bound { binding, keyset })
}

fn transform(direction: Direction, bound: &Bound, text: &str) -> Result<String, AeadError> {
    let aad = bound.binding.aad.as_bytes();
    match direction {
        Direction::Encrypt => {
            let ct = crypto::encrypt(&bound.keyset, text.as_bytes(), aad)?;
            Ok(STANDARD.encode(ct))
        }
        Direction::Decrypt => {
            let ct = STANDARD
                .decode(text)
                .map_err(|_| AeadError::BadRequest("ciphertext is not valid base64".into()))?;
            let pt = crypto::decrypt(&bound.keyset, &ct, aad)?;
            String::from_utf8(pt).map_err(|_| AeadError::Decode("plaintext is not valid UTF-8".into()))
        }
    }
}
