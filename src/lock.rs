use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cache::KeyValueStore;
use crate::cache::StoreError;

/// Worst-case staleness if a process dies mid-job. Expiry is what lets the
/// next tick proceed after a crash.
const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(300);

const KEY_PREFIX: &str = "lock";

#[derive(Debug, Error)]
pub enum LockError<E> {
    /// The named job is already running somewhere.
    #[error("lock already held: {0}")]
    Held(String),
    /// The lock store itself failed, distinct from the job's own errors.
    #[error("lock store error: {0}")]
    Store(#[from] StoreError),
    /// The locked action failed. The lock was released before this surfaced.
    #[error("locked action failed: {0}")]
    Action(E),
}

#[derive(Debug, PartialEq)]
pub enum LockOutcome<T> {
    Completed(T),
    /// The lock was held and `skip_if_locked` was set; the action did not run.
    Skipped,
}

/// Named mutual exclusion backed by the shared key/value store.
///
/// Serializes background jobs across all process instances: at most one
/// non-expired entry per name exists, enforced by atomic set-if-absent.
/// There is no blocking wait on a held lock; callers either skip or fail fast
/// and retry on their next tick.
pub struct Locker {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl Locker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            ttl: DEFAULT_LOCK_TTL,
        }
    }

    pub fn with_ttl(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// Runs `action` under the named lock.
    ///
    /// If the lock is held: returns `Skipped` when `skip_if_locked` is set,
    /// `LockError::Held` otherwise. The lock is released on every exit path;
    /// if release itself fails the entry's TTL is the recovery mechanism.
    pub async fn lock<T, E, F, Fut>(
        &self,
        name: &str,
        skip_if_locked: bool,
        action: F,
    ) -> Result<LockOutcome<T>, LockError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = format!("{}_{}", KEY_PREFIX, name);
        let acquired = self
            .store
            .set_if_absent(&key, now_millis().to_string(), self.ttl)
            .await?;

        if !acquired {
            if skip_if_locked {
                tracing::debug!("[{name}] already locked, skipping");
                return Ok(LockOutcome::Skipped);
            }
            return Err(LockError::Held(name.to_owned()));
        }

        tracing::trace!("[{name}] lock acquired");
        let result = action().await;

        if let Err(e) = self.store.delete(&key).await {
            // Leave it to the TTL.
            tracing::warn!("[{name}] failed to release lock: {e}");
        } else {
            tracing::trace!("[{name}] lock released");
        }

        match result {
            Ok(value) => Ok(LockOutcome::Completed(value)),
            Err(e) => Err(LockError::Action(e)),
        }
    }
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}
