//! Shared application state injected into every Axum handler.

use std::sync::Arc;
use std::time::Duration;

use crate::engine::{CryptoEngine, FailurePolicy};
use crate::lifecycle::KeyManager;
use crate::store::{ConfigStore, MemoryStore, RevealCapability};

/// Application state shared across all request handlers.
///
/// All fields are cheaply cloneable so that Axum can clone the state for
/// each request.
#[derive(Clone)]
pub struct AppState {
    pub store: ConfigStore,
    pub keys: KeyManager,
    pub engine: CryptoEngine,
    /// Failure policy for crypto batches that do not pass `?policy=`.
    pub default_policy: FailurePolicy,
    /// Present only when unmasked reads are enabled.
    pub reveal: Option<Arc<RevealCapability>>,
    /// Name reported by `read-info`.
    pub service_name: Arc<String>,
}

impl AppState {
    pub fn new(
        store: ConfigStore,
        default_policy: FailurePolicy,
        reveal_enabled: bool,
        service_name: String,
    ) -> Self {
        Self {
            keys: KeyManager::new(store.clone()),
            engine: CryptoEngine::new(store.clone()),
            store,
            default_policy,
            reveal: RevealCapability::grant(reveal_enabled).map(Arc::new),
            service_name: Arc::new(service_name),
        }
    }

    /// Same state with the reveal capability granted.
    #[cfg(test)]
    pub fn with_reveal(mut self) -> Self {
        self.reveal = RevealCapability::grant(true).map(Arc::new);
        self
    }
}

impl Default for AppState {
    /// An in-memory state, suitable for tests.
    fn default() -> Self {
        let store = ConfigStore::new(Arc::new(MemoryStore::new()), Duration::from_secs(5));
        Self::new(store, FailurePolicy::FailFast, false, "aead-svc".into())
    }
}
