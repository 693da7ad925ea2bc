use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key value store unavailable: {0}")]
    Unavailable(String),
}

/// Shared key/value tier backing the cache and the locker.
///
/// Values are JSON-serialized strings. All operations honour per-key TTLs.
/// Implementations must guarantee atomicity of `set_if_absent` and
/// `list_drain` across concurrent callers.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError>;

    /// Atomically create `key` if no live entry exists. Returns false if the
    /// key was already present.
    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Delete all keys starting with `prefix`. Returns number of keys removed.
    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, StoreError>;

    async fn list_append(&self, key: &str, items: &[String]) -> Result<(), StoreError>;

    /// Atomically take the whole list, leaving it empty. A concurrent drain
    /// observes an empty list.
    async fn list_drain(&self, key: &str) -> Result<Vec<String>, StoreError>;
}

enum Slot {
    Scalar(String),
    List(Vec<String>),
}

struct Entry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(at) => at <= now,
            None => false,
        }
    }
}

/// Process-local `KeyValueStore`.
///
/// Stands in for the shared store in single-instance deployments and tests.
/// A networked backend slots in behind the trait without touching callers.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Drops expired entries before handing out the guard.
    fn live_entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        entries.retain(|_, e| !e.is_expired(now));
        entries
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.live_entries();
        Ok(entries.get(key).and_then(|e| match &e.slot {
            Slot::Scalar(s) => Some(s.clone()),
            Slot::List(_) => None,
        }))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.live_entries();
        entries.insert(
            key.to_owned(),
            Entry {
                slot: Slot::Scalar(value),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut entries = self.live_entries();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_owned(),
            Entry {
                slot: Slot::Scalar(value),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.live_entries().remove(key);
        Ok(())
    }

    async fn delete_by_prefix(&self, prefix: &str) -> Result<u64, StoreError> {
        let mut entries = self.live_entries();
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn list_append(&self, key: &str, items: &[String]) -> Result<(), StoreError> {
        let mut entries = self.live_entries();
        match entries.get_mut(key) {
            Some(Entry {
                slot: Slot::List(list),
                ..
            }) => list.extend_from_slice(items),
            _ => {
                entries.insert(
                    key.to_owned(),
                    Entry {
                        slot: Slot::List(items.to_vec()),
                        expires_at: None,
                    },
                );
            }
        }
        Ok(())
    }

    async fn list_drain(&self, key: &str) -> Result<Vec<String>, StoreError> {
        let mut entries = self.live_entries();
        match entries.remove(key) {
            Some(Entry {
                slot: Slot::List(list),
                ..
            }) => Ok(list),
            Some(other) => {
                // Key held a scalar. Put it back and return nothing.
                entries.insert(key.to_owned(), other);
                Ok(vec![])
            }
            None => Ok(vec![]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::KeyValueStore;
    use super::MemoryStore;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn set_then_get() {
        let store = MemoryStore::new();
        store.set("k", "v".to_string(), TTL).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn get_expired_is_none() {
        let store = MemoryStore::new();
        store
            .set("k", "v".to_string(), Duration::from_millis(5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_if_absent_second_call_fails() {
        let store = MemoryStore::new();
        assert!(store
            .set_if_absent("k", "a".to_string(), TTL)
            .await
            .unwrap());
        assert!(!store
            .set_if_absent("k", "b".to_string(), TTL)
            .await
            .unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn set_if_absent_succeeds_after_expiry() {
        let store = MemoryStore::new();
        store
            .set_if_absent("k", "a".to_string(), Duration::from_millis(5))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(store
            .set_if_absent("k", "b".to_string(), TTL)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn delete_by_prefix_counts() {
        let store = MemoryStore::new();
        store.set("ns_1", "a".to_string(), TTL).await.unwrap();
        store.set("ns_2", "b".to_string(), TTL).await.unwrap();
        store.set("other", "c".to_string(), TTL).await.unwrap();
        assert_eq!(store.delete_by_prefix("ns_").await.unwrap(), 2);
        assert_eq!(store.get("other").await.unwrap(), Some("c".to_string()));
    }

    #[tokio::test]
    async fn list_drain_empties_list() {
        let store = MemoryStore::new();
        store
            .list_append("q", &["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        store.list_append("q", &["c".to_string()]).await.unwrap();
        let drained = store.list_drain("q").await.unwrap();
        assert_eq!(drained, vec!["a", "b", "c"]);
        assert_eq!(store.list_drain("q").await.unwrap(), Vec::<String>::new());
    }
}
