use async_trait::async_trait;
use itertools::Itertools;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::cache::cache_key;
use crate::cache::BatchHandler;
use crate::cache::BatchLoader;
use crate::cache::CacheError;
use crate::cache::CacheStore;
use crate::constants::cache_keys;
use crate::constants::ttl;
use crate::core::types::Nft;
use crate::core::ChainApi;

/// Batched NFT lookups by identifier for request-time resolvers.
///
/// One API call per batch window instead of one per identifier.
pub struct AssetsHandler {
    api: Arc<dyn ChainApi>,
}

impl AssetsHandler {
    pub fn new(api: Arc<dyn ChainApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl BatchHandler for AssetsHandler {
    type Value = Nft;

    fn cache_key(&self, key: &str) -> String {
        cache_key(cache_keys::ASSETS, &[key])
    }

    fn ttl(&self, values: &[Nft]) -> Duration {
        // Incomplete gateway data gets a short life so it self-heals.
        if values.iter().any(|nft| nft.is_low_confidence()) {
            ttl::LOW_CONFIDENCE
        } else {
            ttl::ASSETS
        }
    }

    async fn fetch(&self, keys: &[String]) -> Result<HashMap<String, Vec<Nft>>, CacheError> {
        let nfts = self
            .api
            .nfts_by_identifiers(keys)
            .await
            .map_err(|e| CacheError::Source(e.to_string()))?;
        Ok(nfts
            .into_iter()
            .into_group_map_by(|nft| nft.identifier.clone()))
    }
}

pub fn assets_loader(cache: Arc<CacheStore>, api: Arc<dyn ChainApi>) -> BatchLoader<AssetsHandler> {
    BatchLoader::new(cache, AssetsHandler::new(api))
}
