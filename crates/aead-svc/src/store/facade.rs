//! [`ConfigStore`]: the only component that mutates persisted config entries.
//!
//! # Value probing
//!
//! Entries carry no type tag. A value is *keyset-shaped* when it deserializes
//! into the keyset JSON shape (field names only; enum values are not
//! checked). Keyset-shaped values must also validate to be written, and are
//! always masked on read even if an invalid one reached the backend by other
//! means. Every other value is an opaque string and passes through unmasked.
//!
//! # Exclusivity
//!
//! Read-modify-write sequences hold a [`KeyLock`] for the entry name. Locks
//! are per name, so unrelated entries proceed in parallel. Lock acquisition
//! and every backend access are bounded by the configured deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use common::FieldMap;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use super::{KvStore, StoreError};
use crate::error::AeadError;
use crate::keyset::{self, Keyset, KeysetError, KeysetJson};

/// Collaborator key prefix under which config entries live.
pub const ENTRY_PREFIX: &str = "config/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    CreateIfAbsent,
    Overwrite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// Create-if-absent found an existing entry and left it alone.
    Exists,
}

/// A decoded config entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Keyset(Keyset),
    Opaque(String),
}

impl ConfigValue {
    /// Classify `raw`.
    ///
    /// # Errors
    ///
    /// A keyset-shaped value that fails validation is an error, never opaque.
    pub fn probe(raw: &str) -> Result<Self, KeysetError> {
        match KeysetJson::parse(raw) {
            Ok(shape) => Keyset::try_from(shape).map(ConfigValue::Keyset),
            Err(_) => Ok(ConfigValue::Opaque(raw.to_owned())),
        }
    }
}

/// Proof that the caller may read unmasked key material.
///
/// Only granted when reveal is enabled in the service configuration.
#[derive(Debug)]
pub struct RevealCapability(());

impl RevealCapability {
    pub fn grant(enabled: bool) -> Option<Self> {
        enabled.then_some(RevealCapability(()))
    }
}

type LockMap = DashMap<String, Arc<Mutex<()>>>;

/// Exclusive access to one entry name. Released on drop.
pub struct KeyLock {
    name: String,
    locks: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyLock {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for KeyLock {
    fn drop(&mut self) {
        // Release first so a waiter's clone is the only other reference.
        self.guard.take();
        self.locks.remove_if(&self.name, |_, m| Arc::strong_count(m) == 1);
    }
}

/// Façade over a [`KvStore`] with create/overwrite semantics, masking, and
/// per-name locking.
#[derive(Clone)]
pub struct ConfigStore {
    backend: Arc<dyn KvStore>,
    locks: Arc<LockMap>,
    timeout: Duration,
}

impl ConfigStore {
    pub fn new(backend: Arc<dyn KvStore>, timeout: Duration) -> Self {
        Self {
            backend,
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, AeadError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let res = match tokio::time::timeout(self.timeout, fut).await {
            Ok(res) => res,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        };
        res.map_err(|e| {
            warn!(op, error = %e, "store access failed");
            AeadError::from(e)
        })
    }

    /// Acquire exclusive access to `name`.
    pub async fn lock(&self, name: &str) -> Result<KeyLock, AeadError> {
        let mutex = Arc::clone(&self.locks.entry(name.to_owned()).or_default());
        match tokio::time::timeout(self.timeout, mutex.lock_owned()).await {
            Ok(guard) => Ok(KeyLock {
                name: name.to_owned(),
                locks: Arc::clone(&self.locks),
                guard: Some(guard),
            }),
            Err(_) => {
                self.locks.remove_if(name, |_, m| Arc::strong_count(m) == 1);
                warn!(name, "timed out waiting for entry lock");
                Err(StoreError::Timeout(self.timeout).into())
            }
        }
    }

    /// The stored text of `name`, unprobed and unmasked.
    pub async fn get_raw(&self, name: &str) -> Result<Option<String>, AeadError> {
        let key = format!("{ENTRY_PREFIX}{name}");
        let bytes = self.bounded("get", self.backend.get(&key)).await?;
        bytes
            .map(|b| String::from_utf8(b.to_vec()))
            .transpose()
            .map_err(|_| AeadError::Decode(format!("{name} is not valid UTF-8")))
    }

    pub async fn get(&self, name: &str) -> Result<Option<ConfigValue>, AeadError> {
        match self.get_raw(name).await? {
            Some(raw) => Ok(Some(ConfigValue::probe(&raw)?)),
            None => Ok(None),
        }
    }

    /// The keyset stored under `name`; `None` if absent or opaque.
    pub async fn load_keyset(&self, name: &str) -> Result<Option<Keyset>, AeadError> {
        Ok(match self.get(name).await? {
            Some(ConfigValue::Keyset(ks)) => Some(ks),
            _ => None,
        })
    }

    /// Persist `ks` under the locked name.
    pub async fn put_keyset(&self, lock: &KeyLock, ks: &Keyset) -> Result<(), AeadError> {
        let text = keyset::encode(ks)?;
        self.put_raw(lock, text).await
    }

    /// Store `text` under the locked name as-is. Callers validate it first.
    pub async fn put_raw(&self, lock: &KeyLock, text: String) -> Result<(), AeadError> {
        let key = format!("{ENTRY_PREFIX}{}", lock.name());
        self.bounded("put", self.backend.put(&key, Bytes::from(text))).await
    }

    /// Store `value` under `name` verbatim.
    ///
    /// # Errors
    ///
    /// Keyset-shaped values that fail validation are rejected before any
    /// lock is taken.
    pub async fn write(&self, name: &str, value: String, mode: WriteMode) -> Result<WriteOutcome, AeadError> {
        ConfigValue::probe(&value)?;
        let lock = self.lock(name).await?;
        if mode == WriteMode::CreateIfAbsent && self.get_raw(name).await?.is_some() {
            debug!(name, "entry exists, not overwriting");
            return Ok(WriteOutcome::Exists);
        }
        self.put_raw(&lock, value).await?;
        Ok(WriteOutcome::Written)
    }

    pub async fn delete(&self, name: &str) -> Result<(), AeadError> {
        let _lock = self.lock(name).await?;
        let key = format!("{ENTRY_PREFIX}{name}");
        self.bounded("delete", self.backend.delete(&key)).await
    }

    /// Names of every stored entry, ascending.
    pub async fn names(&self) -> Result<Vec<String>, AeadError> {
        let keys = self.bounded("list", self.backend.list_keys(ENTRY_PREFIX)).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(ENTRY_PREFIX).map(str::to_owned))
            .collect())
    }

    /// The externally visible form of `name`.
    pub async fn read_masked(&self, name: &str) -> Result<Option<String>, AeadError> {
        match self.get_raw(name).await? {
            Some(raw) => Ok(Some(masked(raw)?)),
            None => Ok(None),
        }
    }

    /// Every entry in its externally visible form.
    pub async fn read_all_masked(&self) -> Result<FieldMap, AeadError> {
        let mut out = FieldMap::new();
        for name in self.names().await? {
            if let Some(text) = self.read_masked(&name).await? {
                out.insert(name, Value::String(text));
            }
        }
        Ok(out)
    }

    /// Unmasked keyset JSON for `name`.
    pub async fn reveal(&self, _cap: &RevealCapability, name: &str) -> Result<Option<String>, AeadError> {
        Ok(self.load_keyset(name).await?.map(|ks| keyset::encode(&ks)).transpose()?)
    }

    /// Whether the backend answers a listing within the deadline.
    pub async fn ping(&self) -> bool {
        self.names().await.is_ok()
    }

    #[cfg(test)]
    fn lock_entries(&self) -> usize {
        self.locks.len()
    }
}

fn masked(raw: String) -> Result<String, AeadError> {
    match keyset::mask_text(&raw) {
        Some(res) => Ok(res?),
        None => Ok(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyset::{Algorithm, REDACTION_TOKEN};
    use crate::store::{MemoryStore, MockKvStore};
    use crate::test_vectors::NON_DETERMINISTIC_SINGLE_KEY;
    use async_trait::async_trait;

    fn store() -> ConfigStore {
        ConfigStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn create_if_absent_keeps_first_value() {
        let s = store();
        assert_eq!(s.write("hola", "mundo".into(), WriteMode::CreateIfAbsent).await.unwrap(), WriteOutcome::Written);
        assert_eq!(s.write("hola", "world".into(), WriteMode::CreateIfAbsent).await.unwrap(), WriteOutcome::Exists);
        assert_eq!(s.get_raw("hola").await.unwrap().as_deref(), Some("mundo"));
        s.write("hola", "world".into(), WriteMode::Overwrite).await.unwrap();
        assert_eq!(s.get_raw("hola").await.unwrap().as_deref(), Some("world"));
    }

    #[tokio::test]
    async fn keysets_are_masked_and_opaque_values_are_not() {
        let s = store();
        s.write("addr", NON_DETERMINISTIC_SINGLE_KEY.into(), WriteMode::Overwrite).await.unwrap();
        s.write("hello", "world".into(), WriteMode::Overwrite).await.unwrap();
        let all = s.read_all_masked().await.unwrap();
        let addr = all["addr"].as_str().unwrap();
        assert_eq!(addr.matches(REDACTION_TOKEN).count(), 1);
        assert!(!addr.contains("GiBa0wZ4"));
        assert_eq!(all["hello"], "world");
        assert!(matches!(s.get("addr").await.unwrap(), Some(ConfigValue::Keyset(_))));
    }

    #[tokio::test]
    async fn masked_keyset_is_rejected_on_write() {
        let s = store();
        let masked = keyset::mask_text(NON_DETERMINISTIC_SINGLE_KEY).unwrap().unwrap();
        let err = s.write("addr", masked, WriteMode::Overwrite).await.unwrap_err();
        assert!(matches!(err, AeadError::Decode(_)));
        assert!(s.get_raw("addr").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_keyset_reaching_backend_is_still_masked() {
        let backend = Arc::new(MemoryStore::new());
        let bad = NON_DETERMINISTIC_SINGLE_KEY.replace("\"primaryKeyId\":1416257722", "\"primaryKeyId\":1");
        backend.put("config/addr", Bytes::from(bad)).await.unwrap();
        let s = ConfigStore::new(backend, Duration::from_secs(1));
        let shown = s.read_masked("addr").await.unwrap().unwrap();
        assert!(!shown.contains("GiBa0wZ4"));
        assert!(matches!(s.get("addr").await, Err(AeadError::InvalidKeyset(_))));
    }

    #[tokio::test]
    async fn non_utf8_entry_is_a_decode_error() {
        let mut mock = MockKvStore::new();
        mock.expect_get()
            .returning(|_| Ok(Some(Bytes::from_static(&[0x61, 0xff, 0xfe]))));
        let s = ConfigStore::new(Arc::new(mock), Duration::from_secs(1));
        assert!(matches!(s.get_raw("x").await, Err(AeadError::Decode(_))));
        assert!(matches!(s.read_masked("x").await, Err(AeadError::Decode(_))));
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let s = store();
        s.write("gone", "x".into(), WriteMode::Overwrite).await.unwrap();
        s.delete("gone").await.unwrap();
        s.delete("never-there").await.unwrap();
        assert!(s.names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reveal_returns_material() {
        let s = store();
        s.write("addr", NON_DETERMINISTIC_SINGLE_KEY.into(), WriteMode::Overwrite).await.unwrap();
        let cap = RevealCapability::grant(true).unwrap();
        assert_eq!(s.reveal(&cap, "addr").await.unwrap().as_deref(), Some(NON_DETERMINISTIC_SINGLE_KEY));
        assert!(RevealCapability::grant(false).is_none());
    }

    #[tokio::test]
    async fn concurrent_create_writes_once() {
        let s = store();
        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..16 {
            let s = s.clone();
            tasks.spawn(async move {
                let ks = Keyset::generate(Algorithm::Deterministic);
                let lock = s.lock("f").await.unwrap();
                if s.get_raw("f").await.unwrap().is_some() {
                    return None;
                }
                s.put_keyset(&lock, &ks).await.unwrap();
                Some(i)
            });
        }
        let mut written = 0;
        while let Some(res) = tasks.join_next().await {
            if res.unwrap().is_some() {
                written += 1;
            }
        }
        assert_eq!(written, 1);
        assert_eq!(s.lock_entries(), 0);
    }

    #[tokio::test]
    async fn backend_error_is_store_unavailable() {
        let mut mock = MockKvStore::new();
        mock.expect_get()
            .returning(|_| Err(StoreError::Backend("connection refused".into())));
        mock.expect_list_keys()
            .returning(|_| Err(StoreError::Backend("connection refused".into())));
        let s = ConfigStore::new(Arc::new(mock), Duration::from_secs(1));
        let err = s.get("x").await.unwrap_err();
        assert!(matches!(err, AeadError::StoreUnavailable(_)));
        assert!(err.code().is_retryable());
        assert!(!s.ping().await);
    }

    struct SlowStore;

    #[async_trait]
    impl KvStore for SlowStore {
        async fn get(&self, _key: &str) -> Result<Option<Bytes>, StoreError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(None)
        }
        async fn put(&self, _key: &str, _value: Bytes) -> Result<(), StoreError> {
            Ok(())
        }
        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
        async fn list_keys(&self, _prefix: &str) -> Result<Vec<String>, StoreError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let s = ConfigStore::new(Arc::new(SlowStore), Duration::from_millis(20));
        assert!(matches!(s.get_raw("x").await, Err(AeadError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn held_lock_times_out_waiters() {
        let s = ConfigStore::new(Arc::new(MemoryStore::new()), Duration::from_millis(20));
        let held = s.lock("f").await.unwrap();
        assert!(matches!(s.lock("f").await, Err(AeadError::StoreUnavailable(_))));
        assert!(s.lock("other").await.is_ok());
        drop(held);
        assert!(s.lock("f").await.is_ok());
    }
}
