use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::persistence::PersistenceError;
use super::types::CollectionTicker;
use super::types::NftIdentifier;
use super::types::NftScamRecord;
use super::types::TraitSummary;

/// Document store for scam-info and trait-summary records, distinct from the
/// relational store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn scam_record(
        &self,
        identifier: &str,
    ) -> Result<Option<NftScamRecord>, PersistenceError>;

    async fn scam_records(
        &self,
        identifiers: &[NftIdentifier],
    ) -> Result<Vec<NftScamRecord>, PersistenceError>;

    /// Save-or-update keyed by identifier.
    async fn save_scam_record(&self, record: &NftScamRecord) -> Result<(), PersistenceError>;

    async fn save_scam_records(&self, records: &[NftScamRecord]) -> Result<(), PersistenceError>;

    async fn trait_summary(
        &self,
        collection: &str,
    ) -> Result<Option<TraitSummary>, PersistenceError>;

    async fn save_trait_summary(&self, summary: &TraitSummary) -> Result<(), PersistenceError>;
}

/// In-memory `DocumentStore` for single-instance runs and tests.
pub struct MemoryDocumentStore {
    scam_records: Mutex<HashMap<NftIdentifier, NftScamRecord>>,
    trait_summaries: Mutex<HashMap<CollectionTicker, TraitSummary>>,
    #[cfg(feature = "test-utilities")]
    scam_writes: std::sync::atomic::AtomicUsize,
    #[cfg(feature = "test-utilities")]
    summary_writes: std::sync::atomic::AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            scam_records: Mutex::new(HashMap::new()),
            trait_summaries: Mutex::new(HashMap::new()),
            #[cfg(feature = "test-utilities")]
            scam_writes: std::sync::atomic::AtomicUsize::new(0),
            #[cfg(feature = "test-utilities")]
            summary_writes: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    #[cfg(feature = "test-utilities")]
    pub fn scam_writes(&self) -> usize {
        self.scam_writes.load(std::sync::atomic::Ordering::SeqCst)
    }

    #[cfg(feature = "test-utilities")]
    pub fn summary_writes(&self) -> usize {
        self.summary_writes.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn scam_record(
        &self,
        identifier: &str,
    ) -> Result<Option<NftScamRecord>, PersistenceError> {
        Ok(self.scam_records.lock().unwrap().get(identifier).cloned())
    }

    async fn scam_records(
        &self,
        identifiers: &[NftIdentifier],
    ) -> Result<Vec<NftScamRecord>, PersistenceError> {
        let records = self.scam_records.lock().unwrap();
        Ok(identifiers
            .iter()
            .filter_map(|id| records.get(id).cloned())
            .collect())
    }

    async fn save_scam_record(&self, record: &NftScamRecord) -> Result<(), PersistenceError> {
        #[cfg(feature = "test-utilities")]
        self.scam_writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.scam_records
            .lock()
            .unwrap()
            .insert(record.identifier.clone(), record.clone());
        Ok(())
    }

    async fn save_scam_records(&self, records: &[NftScamRecord]) -> Result<(), PersistenceError> {
        if records.is_empty() {
            return Ok(());
        }
        #[cfg(feature = "test-utilities")]
        self.scam_writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut scam_records = self.scam_records.lock().unwrap();
        for record in records {
            scam_records.insert(record.identifier.clone(), record.clone());
        }
        Ok(())
    }

    async fn trait_summary(
        &self,
        collection: &str,
    ) -> Result<Option<TraitSummary>, PersistenceError> {
        Ok(self.trait_summaries.lock().unwrap().get(collection).cloned())
    }

    async fn save_trait_summary(&self, summary: &TraitSummary) -> Result<(), PersistenceError> {
        #[cfg(feature = "test-utilities")]
        self.summary_writes
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.trait_summaries
            .lock()
            .unwrap()
            .insert(summary.collection.clone(), summary.clone());
        Ok(())
    }
}
