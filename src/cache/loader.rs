use async_trait::async_trait;
use itertools::Itertools;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::CacheError;
use super::CacheStore;

/// Per-domain half of the dataloader pattern: key-to-cache-key mapping, TTL
/// policy and the batched upstream fetch.
#[async_trait]
pub trait BatchHandler: Send + Sync {
    type Value: Serialize + DeserializeOwned + Clone + Send + Sync;

    /// Cache key for a single logical key.
    fn cache_key(&self, key: &str) -> String;

    /// TTL for a freshly fetched group. Handlers return a shorter TTL for
    /// low-confidence results (placeholder media, missing owner) so transient
    /// upstream data self-heals instead of sticking around for the default.
    fn ttl(&self, values: &[Self::Value]) -> Duration;

    /// One batched upstream call for all missing keys. A key may map to zero,
    /// one or many records; absent keys are simply not in the returned map.
    async fn fetch(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, Vec<Self::Value>>, CacheError>;
}

/// Key-deduplicating, cache-first batch loader.
///
/// `load` resolves every requested key, fetching only cache misses upstream
/// and in a single call.
pub struct BatchLoader<H: BatchHandler> {
    cache: Arc<CacheStore>,
    handler: H,
}

/// Not-found keys are cached as `None` too, so repeat lookups of an unknown
/// key stay off the upstream.
type CachedGroup<V> = Option<Vec<V>>;

impl<H: BatchHandler> BatchLoader<H> {
    pub fn new(cache: Arc<CacheStore>, handler: H) -> Self {
        Self { cache, handler }
    }

    /// Resolves `keys` to a map with exactly one entry per distinct key:
    /// `Some(records)` or `None` when the key does not exist upstream.
    pub async fn load(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, CachedGroup<H::Value>>, CacheError> {
        let distinct: Vec<String> = keys.iter().unique().cloned().collect();

        let mut resolved: HashMap<String, CachedGroup<H::Value>> = HashMap::new();
        let mut missing: Vec<String> = Vec::new();

        for key in &distinct {
            match self
                .cache
                .get::<CachedGroup<H::Value>>(&self.handler.cache_key(key))
                .await?
            {
                Some(group) => {
                    resolved.insert(key.clone(), group);
                }
                None => missing.push(key.clone()),
            }
        }

        if missing.is_empty() {
            return Ok(resolved);
        }
        tracing::trace!("batch fetching {} of {} keys", missing.len(), distinct.len());

        let mut fetched = self.handler.fetch(&missing).await?;
        for key in missing {
            let group: CachedGroup<H::Value> = fetched.remove(&key);
            let ttl = match &group {
                Some(values) => self.handler.ttl(values),
                None => self.handler.ttl(&[]),
            };
            self.cache
                .set(&self.handler.cache_key(&key), &group, ttl)
                .await?;
            resolved.insert(key, group);
        }

        Ok(resolved)
    }

    /// Single-key convenience over `load`.
    pub async fn load_one(&self, key: &str) -> Result<CachedGroup<H::Value>, CacheError> {
        let mut map = self.load(&[key.to_owned()]).await?;
        Ok(map.remove(key).flatten())
    }
}
