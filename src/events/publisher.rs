use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::cache::cache_key;
use crate::cache::CacheStore;
use crate::constants::cache_keys;

/// What changed, so consumers know which cache entries to drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheEventType {
    AssetRefresh,
    MarketplacesRefresh,
    TokensRefresh,
}

/// Cache-invalidation notification decoupling "data changed" from "cache
/// must be refreshed".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangedEvent {
    pub id: String,
    pub event_type: CacheEventType,
}

impl ChangedEvent {
    pub fn new(id: &str, event_type: CacheEventType) -> Self {
        Self {
            id: id.to_owned(),
            event_type,
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: ChangedEvent);
}

/// Publisher handing events to the in-process invalidation consumer.
pub struct ChannelEventPublisher {
    tx: mpsc::Sender<ChangedEvent>,
}

impl ChannelEventPublisher {
    pub fn new(tx: mpsc::Sender<ChangedEvent>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl EventPublisher for ChannelEventPublisher {
    async fn publish(&self, event: ChangedEvent) {
        if let Err(e) = self.tx.send(event).await {
            tracing::warn!("failed to publish changed event: {e}");
        }
    }
}

/// Applies change notifications to the cache so readers refetch.
pub struct InvalidationConsumer {
    rx: mpsc::Receiver<ChangedEvent>,
    cache: Arc<CacheStore>,
}

impl InvalidationConsumer {
    pub fn new(rx: mpsc::Receiver<ChangedEvent>, cache: Arc<CacheStore>) -> Self {
        Self { rx, cache }
    }

    pub async fn start(mut self) {
        while let Some(event) = self.rx.recv().await {
            tracing::debug!("invalidating cache for {:?} {}", event.event_type, event.id);
            let result = match event.event_type {
                CacheEventType::AssetRefresh => {
                    self.cache
                        .delete_by_pattern(&cache_key(cache_keys::ASSETS, &[&event.id]))
                        .await
                }
                CacheEventType::MarketplacesRefresh => self
                    .cache
                    .delete_by_pattern(cache_keys::MARKETPLACES)
                    .await,
                CacheEventType::TokensRefresh => {
                    if let Err(e) = self.cache.delete(cache_keys::ALL_TOKENS).await {
                        tracing::warn!("failed to invalidate token list: {e}");
                    }
                    self.cache
                        .delete_by_pattern(cache_keys::TOKEN_PREFIX)
                        .await
                }
            };
            if let Err(e) = result {
                tracing::warn!("cache invalidation failed: {e}");
            }
        }
        tracing::debug!("invalidation channel closed");
    }
}
