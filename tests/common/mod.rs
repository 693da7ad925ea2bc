#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use nftagg::core::api::ApiAbout;
use nftagg::core::types::Nft;
use nftagg::core::types::Token;
use nftagg::core::ApiError;
use nftagg::core::ChainApi;
use nftagg::events::ChangedEvent;
use nftagg::events::EventPublisher;
use nftagg::index::BulkUpdate;
use nftagg::index::Condition;
use nftagg::index::Document;
use nftagg::index::IndexError;
use nftagg::index::SearchIndex;
use nftagg::index::SearchQuery;
use nftagg::index::SortOrder;

pub fn set_tracing_subscriber(set: bool) -> Option<tracing::dispatcher::DefaultGuard> {
    if !set {
        return None;
    }
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_max_level(tracing::Level::TRACE)
        .with_env_filter("nftagg=trace")
        .finish();
    Some(tracing::subscriber::set_default(subscriber))
}

/// A collection-level index document.
pub fn collection_doc(ticker: &str, fields: Value) -> Document {
    let mut doc = json!({
        "token": ticker,
        "type": "NonFungibleESDT",
        "timestamp": 1_690_000_000,
    });
    merge(&mut doc, fields);
    Document(doc)
}

/// An NFT-level index document.
pub fn nft_doc(ticker: &str, nonce: u64, fields: Value) -> Document {
    let mut doc = json!({
        "token": ticker,
        "identifier": format!("{}-{:02x}", ticker, nonce),
        "nonce": nonce,
        "type": "NonFungibleESDT",
        "timestamp": 1_690_000_000,
    });
    merge(&mut doc, fields);
    Document(doc)
}

fn merge(target: &mut Value, from: Value) {
    if let (Some(target), Some(from)) = (target.as_object_mut(), from.as_object()) {
        for (k, v) in from {
            target.insert(k.clone(), v.clone());
        }
    }
}

/// In-memory search index with the filtering the jobs rely on.
pub struct FakeIndex {
    docs: Mutex<HashMap<String, Vec<Document>>>,
    search_calls: AtomicUsize,
    update_calls: AtomicUsize,
}

impl FakeIndex {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            search_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_docs(index: &str, docs: Vec<Document>) -> Self {
        let fake = Self::new();
        fake.put_docs(index, docs);
        fake
    }

    pub fn put_docs(&self, index: &str, docs: Vec<Document>) {
        self.docs.lock().unwrap().insert(index.to_owned(), docs);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub fn doc_by_identifier(&self, index: &str, identifier: &str) -> Option<Document> {
        self.doc_by_field(index, "identifier", identifier)
    }

    pub fn doc_by_field(&self, index: &str, field: &str, value: &str) -> Option<Document> {
        self.docs
            .lock()
            .unwrap()
            .get(index)?
            .iter()
            .find(|d| d.str_field(field) == Some(value))
            .cloned()
    }

    fn matches(doc: &Document, condition: &Condition) -> bool {
        match condition {
            Condition::Match { field, value } => doc.0.get(field) == Some(value),
            Condition::Exists { field } => doc.0.get(field).is_some(),
            Condition::NotExists { field } => doc.0.get(field).is_none(),
            Condition::Nested { path, field, value } => match doc.0.get(path) {
                Some(Value::Object(nested)) => nested.get(field) == Some(value),
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| item.get(field) == Some(value)),
                _ => false,
            },
            Condition::ShouldMatch { field, values } => {
                values.iter().any(|v| doc.0.get(field) == Some(v))
            }
            Condition::SinceTimestamp { value } => {
                doc.timestamp().map(|t| t >= *value).unwrap_or(false)
            }
            Condition::UntilTimestamp { value } => {
                doc.timestamp().map(|t| t <= *value).unwrap_or(false)
            }
        }
    }
}

#[async_trait]
impl SearchIndex for FakeIndex {
    async fn search(&self, index: &str, query: &SearchQuery) -> Result<Vec<Document>, IndexError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        let docs = self.docs.lock().unwrap();
        let mut hits: Vec<Document> = docs
            .get(index)
            .map(|docs| {
                docs.iter()
                    .filter(|d| query.musts.iter().all(|c| Self::matches(d, c)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if let Some((field, order)) = &query.sort {
            hits.sort_by_key(|d| d.i64_field(field).unwrap_or_default());
            if *order == SortOrder::Descending {
                hits.reverse();
            }
        }
        Ok(hits.into_iter().skip(query.from).take(query.size).collect())
    }

    async fn count(&self, index: &str, query: &SearchQuery) -> Result<u64, IndexError> {
        let all = self
            .search(index, &query.clone().with_pagination(0, usize::MAX))
            .await?;
        Ok(all.len() as u64)
    }

    async fn update_bulk(
        &self,
        index: &str,
        id_field: &str,
        updates: Vec<BulkUpdate>,
    ) -> Result<(), IndexError> {
        if updates.is_empty() {
            return Ok(());
        }
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        let mut docs = self.docs.lock().unwrap();
        let docs = match docs.get_mut(index) {
            Some(docs) => docs,
            None => return Ok(()),
        };
        for update in updates {
            for doc in docs.iter_mut() {
                if doc.str_field(id_field) == Some(update.identifier.as_str()) {
                    if let Some(object) = doc.0.as_object_mut() {
                        for (field, value) in &update.fields {
                            if value.is_null() {
                                object.remove(field);
                            } else {
                                object.insert(field.clone(), value.clone());
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

/// In-memory chain API with per-operation call counters.
pub struct FakeChainApi {
    pub collections: Mutex<HashMap<String, Vec<Nft>>>,
    pub tokens: Mutex<Vec<Token>>,
    pub egld_price: Mutex<Decimal>,
    pub scam_engine_version: Mutex<String>,
    /// Collections that fail on fetch, to exercise requeue paths.
    pub failing_collections: Mutex<Vec<String>>,
    /// Identifiers of the most recent bulk fetch.
    pub last_bulk_keys: Mutex<Vec<String>>,
    pub about_calls: AtomicUsize,
    pub nft_calls: AtomicUsize,
    pub bulk_calls: AtomicUsize,
    pub collection_calls: AtomicUsize,
    pub egld_calls: AtomicUsize,
}

impl FakeChainApi {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            tokens: Mutex::new(vec![]),
            egld_price: Mutex::new(Decimal::new(4025, 2)),
            scam_engine_version: Mutex::new("v7".to_string()),
            failing_collections: Mutex::new(vec![]),
            last_bulk_keys: Mutex::new(vec![]),
            about_calls: AtomicUsize::new(0),
            nft_calls: AtomicUsize::new(0),
            bulk_calls: AtomicUsize::new(0),
            collection_calls: AtomicUsize::new(0),
            egld_calls: AtomicUsize::new(0),
        }
    }

    pub fn put_collection(&self, ticker: &str, nfts: Vec<Nft>) {
        self.collections
            .lock()
            .unwrap()
            .insert(ticker.to_owned(), nfts);
    }

    pub fn fail_collection(&self, ticker: &str) {
        self.failing_collections
            .lock()
            .unwrap()
            .push(ticker.to_owned());
    }

    pub fn clear_failures(&self) {
        self.failing_collections.lock().unwrap().clear();
    }

    fn all_nfts(&self) -> Vec<Nft> {
        self.collections
            .lock()
            .unwrap()
            .values()
            .flatten()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChainApi for FakeChainApi {
    async fn about(&self) -> Result<ApiAbout, ApiError> {
        self.about_calls.fetch_add(1, Ordering::SeqCst);
        Ok(ApiAbout {
            scam_engine_version: self.scam_engine_version.lock().unwrap().clone(),
        })
    }

    async fn nft(&self, identifier: &str) -> Result<Option<Nft>, ApiError> {
        self.nft_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .all_nfts()
            .into_iter()
            .find(|n| n.identifier == identifier))
    }

    async fn nfts_by_identifiers(&self, identifiers: &[String]) -> Result<Vec<Nft>, ApiError> {
        self.bulk_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_bulk_keys.lock().unwrap() = identifiers.to_vec();
        Ok(self
            .all_nfts()
            .into_iter()
            .filter(|n| identifiers.contains(&n.identifier))
            .collect())
    }

    async fn collection_nfts(&self, collection: &str) -> Result<Vec<Nft>, ApiError> {
        self.collection_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_collections
            .lock()
            .unwrap()
            .iter()
            .any(|c| c == collection)
        {
            return Err(ApiError::Request(format!("{collection} unavailable")));
        }
        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn collection_nft_count(&self, collection: &str) -> Result<u64, ApiError> {
        Ok(self
            .collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|nfts| nfts.len() as u64)
            .unwrap_or_default())
    }

    async fn all_tokens(&self) -> Result<Vec<Token>, ApiError> {
        Ok(self.tokens.lock().unwrap().clone())
    }

    async fn token(&self, identifier: &str) -> Result<Option<Token>, ApiError> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.identifier == identifier)
            .cloned())
    }

    async fn egld_price(&self) -> Result<Decimal, ApiError> {
        self.egld_calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.egld_price.lock().unwrap())
    }
}

/// Publisher capturing events for assertions.
pub struct CapturingPublisher {
    events: Mutex<Vec<ChangedEvent>>,
}

impl CapturingPublisher {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(vec![]),
        }
    }

    pub fn events(&self) -> Vec<ChangedEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for CapturingPublisher {
    async fn publish(&self, event: ChangedEvent) {
        self.events.lock().unwrap().push(event);
    }
}
