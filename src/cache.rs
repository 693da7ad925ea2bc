mod keys;
mod loader;
mod local;
mod store;

pub use keys::cache_key;
pub use keys::hashed_cache_key;
pub use loader::BatchHandler;
pub use loader::BatchLoader;
pub use store::KeyValueStore;
pub use store::MemoryStore;
pub use store::StoreError;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use local::LocalCache;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store error: {0}")]
    Store(#[from] StoreError),
    #[error("cache codec error: {0}")]
    Codec(#[from] serde_json::Error),
    #[error("cache source error: {0}")]
    Source(String),
}

/// Two-tier cache: in-process LRU in front of the shared key/value store.
///
/// The shared tier is the source of truth for cross-process consistency; the
/// local tier shadows it with a capped TTL.
pub struct CacheStore {
    local: LocalCache,
    store: Arc<dyn KeyValueStore>,
}

impl CacheStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            local: LocalCache::new(),
            store,
        }
    }

    /// Local tier first, then the shared tier. A shared hit repopulates the
    /// local tier.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        if let Some(raw) = self.local.get(key) {
            tracing::trace!("local hit for {key}");
            return Ok(Some(serde_json::from_str(&raw)?));
        }
        match self.store.get(key).await? {
            Some(raw) => {
                self.local.shadow(key, raw.clone());
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => Ok(None),
        }
    }

    pub async fn set<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let raw = serde_json::to_string(value)?;
        self.store.set(key, raw.clone(), ttl).await?;
        self.local.put(key, raw, ttl);
        Ok(())
    }

    /// On a miss, invokes `factory`, stores the result under `key` and
    /// returns it.
    ///
    /// Concurrent misses may each invoke `factory`; factories are expected to
    /// be pure with respect to the key, so the last write simply overwrites
    /// with an equally valid value. A rare duplicate fetch is preferred over a
    /// per-key distributed mutex.
    pub async fn get_or_set<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        factory: F,
    ) -> Result<T, CacheError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        if let Some(value) = self.get(key).await? {
            return Ok(value);
        }
        tracing::trace!("miss for {key}, calling factory");
        let value = factory().await?;
        self.set(key, &value, ttl).await?;
        Ok(value)
    }

    /// Invalidates `key` in both tiers.
    pub async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.local.delete(key);
        self.store.delete(key).await?;
        Ok(())
    }

    /// Invalidates all keys under `prefix` in both tiers.
    pub async fn delete_by_pattern(&self, prefix: &str) -> Result<u64, CacheError> {
        self.local.delete_by_prefix(prefix);
        let n = self.store.delete_by_prefix(prefix).await?;
        tracing::debug!("invalidated {n} keys under {prefix}");
        Ok(n)
    }

    /// Appends items to a persisted list. Used as a retry work queue.
    pub async fn list_append(&self, key: &str, items: &[String]) -> Result<(), CacheError> {
        self.store.list_append(key, items).await?;
        Ok(())
    }

    /// Atomically drains a persisted list. At most one concurrent caller
    /// receives a given item.
    pub async fn list_drain(&self, key: &str) -> Result<Vec<String>, CacheError> {
        Ok(self.store.list_drain(key).await?)
    }
}
