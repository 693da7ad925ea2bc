use lru::LruCache;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

/// Longest a value may live in the in-process tier, whatever the caller asked
/// for. Keeps replicas from serving stale reads long after the shared tier
/// was invalidated elsewhere.
const MAX_LOCAL_TTL: Duration = Duration::from_secs(30);

const CAPACITY: usize = 10_000;

struct LocalEntry {
    value: String,
    expires_at: Instant,
}

/// In-process cache tier, an LRU with per-entry expiry.
///
/// Purely a performance optimization in front of the shared tier. May be
/// evicted or invalidated independently of it.
pub(super) struct LocalCache {
    lru: Mutex<LruCache<String, LocalEntry>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self {
            lru: Mutex::new(LruCache::new(std::num::NonZeroUsize::new(CAPACITY).unwrap())),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let mut lru = self.lru.lock().unwrap();
        match lru.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                lru.pop(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: &str, value: String, ttl: Duration) {
        let ttl = ttl.min(MAX_LOCAL_TTL);
        let entry = LocalEntry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.lru.lock().unwrap().put(key.to_owned(), entry);
    }

    /// Put with the maximum local TTL. For shadowing shared-tier hits whose
    /// remaining TTL is unknown.
    pub fn shadow(&self, key: &str, value: String) {
        self.put(key, value, MAX_LOCAL_TTL);
    }

    pub fn delete(&self, key: &str) {
        self.lru.lock().unwrap().pop(key);
    }

    pub fn delete_by_prefix(&self, prefix: &str) {
        let mut lru = self.lru.lock().unwrap();
        let doomed: Vec<String> = lru
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in doomed {
            lru.pop(&key);
        }
    }
}
