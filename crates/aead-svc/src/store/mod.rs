//! Persistence: the key-value collaborator trait, an in-memory backend, and
//! the Config Store Façade layered on top of it.

pub mod facade;
pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub use facade::{ConfigStore, ConfigValue, KeyLock, RevealCapability, WriteMode, WriteOutcome};
pub use memory::MemoryStore;

/// Errors reported by a [`KvStore`] backend, or by the façade's deadline.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend reported an I/O failure.
    #[error("store backend error: {0}")]
    Backend(String),

    /// The access did not complete before its deadline.
    #[error("store access timed out after {0:?}")]
    Timeout(Duration),
}

/// Durable string-keyed byte store.
///
/// Implementations must be strongly consistent per key. No cross-key
/// transactions are assumed; per-key exclusivity is enforced by
/// [`ConfigStore`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, StoreError>;

    async fn put(&self, key: &str, value: Bytes) -> Result<(), StoreError>;

    /// Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// All keys starting with `prefix`, in ascending order.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
