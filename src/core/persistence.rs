use async_trait::async_trait;
use itertools::Itertools;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use super::types::Address;
use super::types::CollectionTicker;
use super::types::Marketplace;
use super::types::MarketplaceEventRecord;
use super::types::NftRarity;
use super::types::Timestamp;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("persistence backend error: {0}")]
    Backend(String),
}

/// Relational store for per-NFT rarity rows.
#[async_trait]
pub trait RarityRepository: Send + Sync {
    /// Distinct collections that have rarity rows.
    async fn collection_ids(&self) -> Result<Vec<CollectionTicker>, PersistenceError>;

    async fn rarities(&self, collection: &str) -> Result<Vec<NftRarity>, PersistenceError>;

    /// Insert-or-update keyed by identifier.
    async fn upsert_rarities(&self, rarities: &[NftRarity]) -> Result<(), PersistenceError>;
}

/// Relational store for marketplaces and their indexed events.
#[async_trait]
pub trait MarketplaceRepository: Send + Sync {
    async fn marketplaces(&self) -> Result<Vec<Marketplace>, PersistenceError>;

    async fn marketplace_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Marketplace>, PersistenceError>;

    async fn update_last_index_timestamp(
        &self,
        address: &str,
        timestamp: Timestamp,
    ) -> Result<(), PersistenceError>;

    /// Bulk insert with conflict-on-identifier ignore semantics. Returns the
    /// number of records actually inserted; the shortfall is duplicates.
    async fn save_or_ignore_events(
        &self,
        records: &[MarketplaceEventRecord],
    ) -> Result<u64, PersistenceError>;
}

/// In-memory `RarityRepository` for single-instance runs and tests.
pub struct MemoryRarityRepository {
    rows: Mutex<HashMap<String, NftRarity>>,
    #[cfg(feature = "test-utilities")]
    upsert_calls: std::sync::atomic::AtomicUsize,
}

impl MemoryRarityRepository {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            #[cfg(feature = "test-utilities")]
            upsert_calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of non-empty upsert calls so far.
    #[cfg(feature = "test-utilities")]
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MemoryRarityRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RarityRepository for MemoryRarityRepository {
    async fn collection_ids(&self) -> Result<Vec<CollectionTicker>, PersistenceError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .map(|r| r.collection.clone())
            .unique()
            .sorted()
            .collect())
    }

    async fn rarities(&self, collection: &str) -> Result<Vec<NftRarity>, PersistenceError> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .values()
            .filter(|r| r.collection == collection)
            .cloned()
            .sorted_by_key(|r| r.nonce)
            .collect())
    }

    async fn upsert_rarities(&self, rarities: &[NftRarity]) -> Result<(), PersistenceError> {
        if rarities.is_empty() {
            return Ok(());
        }
        #[cfg(feature = "test-utilities")]
        self.upsert_calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut rows = self.rows.lock().unwrap();
        for rarity in rarities {
            rows.insert(rarity.identifier.clone(), rarity.clone());
        }
        Ok(())
    }
}

/// In-memory `MarketplaceRepository` for single-instance runs and tests.
pub struct MemoryMarketplaceRepository {
    marketplaces: Mutex<HashMap<Address, Marketplace>>,
    events: Mutex<HashMap<(String, Option<u32>, bool), MarketplaceEventRecord>>,
}

impl MemoryMarketplaceRepository {
    pub fn new() -> Self {
        Self {
            marketplaces: Mutex::new(HashMap::new()),
            events: Mutex::new(HashMap::new()),
        }
    }

    pub fn add_marketplace(&self, marketplace: Marketplace) {
        self.marketplaces
            .lock()
            .unwrap()
            .insert(marketplace.address.clone(), marketplace);
    }

    #[cfg(feature = "test-utilities")]
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl Default for MemoryMarketplaceRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MarketplaceRepository for MemoryMarketplaceRepository {
    async fn marketplaces(&self) -> Result<Vec<Marketplace>, PersistenceError> {
        let marketplaces = self.marketplaces.lock().unwrap();
        Ok(marketplaces
            .values()
            .cloned()
            .sorted_by_key(|m| m.address.clone())
            .collect())
    }

    async fn marketplace_by_address(
        &self,
        address: &str,
    ) -> Result<Option<Marketplace>, PersistenceError> {
        Ok(self.marketplaces.lock().unwrap().get(address).cloned())
    }

    async fn update_last_index_timestamp(
        &self,
        address: &str,
        timestamp: Timestamp,
    ) -> Result<(), PersistenceError> {
        let mut marketplaces = self.marketplaces.lock().unwrap();
        match marketplaces.get_mut(address) {
            Some(marketplace) => {
                marketplace.last_index_timestamp = Some(timestamp);
                Ok(())
            }
            None => Err(PersistenceError::Backend(format!(
                "unknown marketplace {address}"
            ))),
        }
    }

    async fn save_or_ignore_events(
        &self,
        records: &[MarketplaceEventRecord],
    ) -> Result<u64, PersistenceError> {
        let mut events = self.events.lock().unwrap();
        let mut saved = 0;
        for record in records {
            let key = (
                record.tx_hash.clone(),
                record.event_order,
                record.is_tx,
            );
            if let std::collections::hash_map::Entry::Vacant(slot) = events.entry(key) {
                slot.insert(record.clone());
                saved += 1;
            }
        }
        Ok(saved)
    }
}
