use std::sync::Arc;
use std::time::Duration;

use super::Document;
use super::IndexError;
use super::SearchIndex;
use super::SearchQuery;
use crate::cache::cache_key;
use crate::cache::CacheStore;

/// Pull-based scan over a large index result set.
///
/// Callers loop `next_batch()` and break when they have what they need; the
/// cursor stops requesting pages immediately. `stop_at` bounds the number of
/// documents fetched so no page entirely beyond the bound is ever requested.
pub struct ScrollCursor<'a> {
    index: &'a dyn SearchIndex,
    index_name: String,
    query: SearchQuery,
    from: usize,
    stop_at: Option<usize>,
    done: bool,
}

impl<'a> ScrollCursor<'a> {
    pub fn new(index: &'a dyn SearchIndex, index_name: &str, query: SearchQuery) -> Self {
        Self {
            index,
            index_name: index_name.to_owned(),
            from: query.from,
            query,
            stop_at: None,
            done: false,
        }
    }

    /// Stop once `offset` documents have been fetched from the start of the
    /// result set.
    pub fn stop_at_offset(mut self, offset: usize) -> Self {
        self.stop_at = Some(offset);
        self
    }

    /// Next page of documents, or `None` once the scan is over.
    pub async fn next_batch(&mut self) -> Result<Option<Vec<Document>>, IndexError> {
        if self.done {
            return Ok(None);
        }
        let mut size = self.query.size;
        if let Some(stop_at) = self.stop_at {
            if self.from >= stop_at {
                self.done = true;
                return Ok(None);
            }
            size = size.min(stop_at - self.from);
        }

        let page = self.query.clone().with_pagination(self.from, size);
        let items = self.index.search(&self.index_name, &page).await?;

        if items.is_empty() {
            self.done = true;
            return Ok(None);
        }
        self.from += items.len();
        if items.len() < size {
            // Short page, the result set is exhausted.
            self.done = true;
        }
        Ok(Some(items))
    }
}

/// Resume marker for offset-resume reconciliation scans.
///
/// Lives in the shared cache under a multi-minute TTL: a crashed job resumes
/// near where it left off, a long-idle one naturally resets to the beginning.
/// Only mutated by the job holding the corresponding named lock.
pub struct ScrollState {
    cache: Arc<CacheStore>,
    key: String,
    ttl: Duration,
}

impl ScrollState {
    pub fn new(cache: Arc<CacheStore>, counter_name: &str, ttl: Duration) -> Self {
        Self {
            cache,
            key: cache_key(counter_name, &[]),
            ttl,
        }
    }

    /// Last persisted offset, 0 when absent or expired.
    pub async fn last_offset(&self) -> usize {
        match self.cache.get::<usize>(&self.key).await {
            Ok(Some(offset)) => offset,
            Ok(None) => 0,
            Err(e) => {
                tracing::warn!("failed to read scroll state {}: {e}", self.key);
                0
            }
        }
    }

    pub async fn set_last_offset(&self, offset: usize) {
        if let Err(e) = self.cache.set(&self.key, &offset, self.ttl).await {
            tracing::warn!("failed to write scroll state {}: {e}", self.key);
        }
    }
}
