use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use itertools::Itertools;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

use super::JobError;
use crate::cache::CacheStore;
use crate::constants::cache_keys;
use crate::constants::settings::SCROLL_PAGE_SIZE;
use crate::core::types::Address;
use crate::core::types::MarketplaceEventRecord;
use crate::core::types::Timestamp;
use crate::core::MarketplaceRepository;
use crate::events::CacheEventType;
use crate::events::ChangedEvent;
use crate::events::EventPublisher;
use crate::index::Document;
use crate::index::ScrollCursor;
use crate::index::SearchIndex;
use crate::index::SearchQuery;
use crate::index::SortOrder;
use crate::lock::LockOutcome;
use crate::lock::Locker;
use crate::monitor::JobReport;
use crate::monitor::MonitorMessage;

const WORKER_ID: &str = "marketplace_events";

const REINDEX_LATEST_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct EventsIndexingRequest {
    pub marketplace_address: Address,
    pub before_timestamp: Option<Timestamp>,
    pub after_timestamp: Option<Timestamp>,
    /// Stop scrolling once a page saved fewer records than it carried;
    /// everything older is already indexed.
    pub stop_if_duplicates: bool,
}

impl EventsIndexingRequest {
    pub fn latest(marketplace_address: &str, after_timestamp: Option<Timestamp>) -> Self {
        Self {
            marketplace_address: marketplace_address.to_owned(),
            before_timestamp: None,
            after_timestamp,
            stop_if_duplicates: true,
        }
    }
}

/// Pulls marketplace transactions and event logs from the index into the
/// insert-or-ignore event archive, newest first.
pub struct MarketplaceEventsIndexer {
    locker: Arc<Locker>,
    index: Arc<dyn SearchIndex>,
    repo: Arc<dyn MarketplaceRepository>,
    cache: Arc<CacheStore>,
    publisher: Arc<dyn EventPublisher>,
    monitor_tx: Sender<MonitorMessage>,
}

impl MarketplaceEventsIndexer {
    pub fn new(
        locker: Arc<Locker>,
        index: Arc<dyn SearchIndex>,
        repo: Arc<dyn MarketplaceRepository>,
        cache: Arc<CacheStore>,
        publisher: Arc<dyn EventPublisher>,
        monitor_tx: Sender<MonitorMessage>,
    ) -> Self {
        Self {
            locker,
            index,
            repo,
            cache,
            publisher,
            monitor_tx,
        }
    }

    #[tracing::instrument(name = "marketplace_events", skip_all)]
    pub async fn start(&self) {
        let mut tick = tokio::time::interval(REINDEX_LATEST_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("got a ctrl-c message");
                    return;
                },
                _ = tick.tick() => {
                    match self.repo.marketplaces().await {
                        Ok(marketplaces) => {
                            let addresses: Vec<Address> =
                                marketplaces.into_iter().map(|m| m.address).collect();
                            self.reindex_latest_marketplace_events(&addresses).await;
                        }
                        Err(e) => tracing::error!("[{WORKER_ID}] failed to list marketplaces: {e}"),
                    }
                },
            }
        }
    }

    /// Full backfill over every known marketplace.
    pub async fn reindex_all_marketplace_events(
        &self,
        stop_if_duplicates: bool,
        before_timestamp: Option<Timestamp>,
        after_timestamp: Option<Timestamp>,
    ) {
        let outcome = self
            .locker
            .lock("reindexAllMarketplaceEvents", true, || async {
                let marketplaces = self.repo.marketplaces().await?;
                let addresses: Vec<Address> = marketplaces
                    .into_iter()
                    .map(|m| m.address)
                    .unique()
                    .collect();
                let mut processed = 0;
                let mut failed = 0;
                for address in &addresses {
                    let request = EventsIndexingRequest {
                        marketplace_address: address.clone(),
                        before_timestamp,
                        after_timestamp,
                        stop_if_duplicates,
                    };
                    match self.reindex_marketplace_events(request).await {
                        Ok(()) => processed += 1,
                        Err(e) => {
                            tracing::error!("[{WORKER_ID}] failed to reindex {address}: {e}");
                            failed += 1;
                        }
                    }
                }
                Ok::<_, JobError>((processed, failed))
            })
            .await;
        match outcome {
            Ok(LockOutcome::Completed((processed, failed))) => {
                self.monitor_tx
                    .send(MonitorMessage::Job(JobReport::new(
                        "reindexAllMarketplaceEvents",
                        processed,
                        failed,
                    )))
                    .await
                    .unwrap();
            }
            Ok(LockOutcome::Skipped) => (),
            Err(e) => tracing::error!("[{WORKER_ID}] reindexAllMarketplaceEvents failed: {e}"),
        }
    }

    /// Catches up every given marketplace from its last indexed timestamp,
    /// each under its own lock so overlapping deliveries cannot double-index
    /// one marketplace.
    pub async fn reindex_latest_marketplace_events(&self, addresses: &[Address]) {
        let mut processed = 0;
        let mut failed = 0;
        for address in addresses.iter().unique() {
            let name = format!("reindexLatestMarketplacesEvents_{address}");
            let result = self
                .locker
                .lock(&name, true, || async {
                    let last_indexed = self
                        .repo
                        .marketplace_by_address(address)
                        .await?
                        .and_then(|m| m.last_index_timestamp);
                    self.reindex_marketplace_events(EventsIndexingRequest::latest(
                        address,
                        last_indexed,
                    ))
                    .await
                })
                .await;
            match result {
                Ok(_) => processed += 1,
                Err(e) => {
                    tracing::error!("[{WORKER_ID}] failed to reindex {address}: {e}");
                    failed += 1;
                }
            }
        }
        self.monitor_tx
            .send(MonitorMessage::Job(JobReport::new(
                "reindexLatestMarketplacesEvents",
                processed,
                failed,
            )))
            .await
            .unwrap();
    }

    pub async fn reindex_marketplace_events(
        &self,
        request: EventsIndexingRequest,
    ) -> Result<(), JobError> {
        if let (Some(before), Some(after)) = (request.before_timestamp, request.after_timestamp) {
            if before < after {
                return Err(JobError::Invalid(
                    "before_timestamp can't be less than after_timestamp".to_owned(),
                ));
            }
        }

        let newest_tx = self
            .index_slice("transactions", transactions_query(&request), &request, map_transaction)
            .await?;
        let newest_event = self
            .index_slice("logs", logs_query(&request), &request, map_log)
            .await?;

        let newest = newest_tx.max(newest_event);

        let last_indexed = self
            .repo
            .marketplace_by_address(&request.marketplace_address)
            .await?
            .and_then(|m| m.last_index_timestamp);

        if let Some(newest) = newest {
            if last_indexed.map(|last| newest > last).unwrap_or(true) {
                self.repo
                    .update_last_index_timestamp(&request.marketplace_address, newest)
                    .await?;
                self.cache.delete(cache_keys::MARKETPLACES).await?;
                self.publisher
                    .publish(ChangedEvent::new(
                        &request.marketplace_address,
                        CacheEventType::MarketplacesRefresh,
                    ))
                    .await;
            }
        }
        Ok(())
    }

    /// Scrolls one index newest-first, persisting each page and honouring the
    /// duplicate stop signal. Returns the newest timestamp seen.
    async fn index_slice(
        &self,
        index_name: &str,
        query: SearchQuery,
        request: &EventsIndexingRequest,
        map: fn(&Document, &str) -> Vec<MarketplaceEventRecord>,
    ) -> Result<Option<Timestamp>, JobError> {
        let mut newest: Option<Timestamp> = None;
        let mut cursor = ScrollCursor::new(self.index.as_ref(), index_name, query);
        while let Some(batch) = cursor.next_batch().await? {
            if newest.is_none() {
                newest = batch.first().and_then(|d| d.timestamp());
            }
            let records: Vec<MarketplaceEventRecord> = batch
                .iter()
                .flat_map(|doc| map(doc, &request.marketplace_address))
                .collect();
            let total = records.len() as u64;
            let saved = self.repo.save_or_ignore_events(&records).await?;
            if request.stop_if_duplicates && saved != total {
                tracing::debug!(
                    "[{}] hit {} duplicates, stopping",
                    request.marketplace_address,
                    total - saved
                );
                break;
            }
        }
        Ok(newest)
    }
}

fn with_time_range(mut query: SearchQuery, request: &EventsIndexingRequest) -> SearchQuery {
    if let Some(after) = request.after_timestamp {
        query = query.with_since_timestamp(after);
    }
    if let Some(before) = request.before_timestamp {
        query = query.with_until_timestamp(before);
    }
    query
}

fn transactions_query(request: &EventsIndexingRequest) -> SearchQuery {
    let query = SearchQuery::create()
        .with_must_match("receiver", request.marketplace_address.clone())
        .with_sort("timestamp", SortOrder::Descending)
        .with_pagination(0, SCROLL_PAGE_SIZE);
    with_time_range(query, request)
}

fn logs_query(request: &EventsIndexingRequest) -> SearchQuery {
    let query = SearchQuery::create()
        .with_must_nested("events", "address", request.marketplace_address.clone())
        .with_sort("timestamp", SortOrder::Descending)
        .with_pagination(0, SCROLL_PAGE_SIZE);
    with_time_range(query, request)
}

fn map_transaction(doc: &Document, marketplace_address: &str) -> Vec<MarketplaceEventRecord> {
    let tx_hash = match doc.str_field("identifier") {
        Some(hash) => hash.to_owned(),
        None => return vec![],
    };
    let data = doc
        .str_field("data")
        .map(|raw| match BASE64.decode(raw) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => raw.to_owned(),
        })
        .unwrap_or_default();
    vec![MarketplaceEventRecord {
        tx_hash,
        original_tx_hash: None,
        event_order: None,
        is_tx: true,
        marketplace_address: marketplace_address.to_owned(),
        timestamp: doc.timestamp().unwrap_or_default(),
        data: json!({
            "txData": {
                "sender": doc.str_field("sender").unwrap_or_default(),
                "receiver": doc.str_field("receiver").unwrap_or_default(),
                "data": data,
                "value": doc.str_field("value").unwrap_or_default(),
                "blockHash": doc.str_field("miniBlockHash").unwrap_or_default(),
            }
        }),
    }]
}

fn map_log(doc: &Document, marketplace_address: &str) -> Vec<MarketplaceEventRecord> {
    let tx_hash = match doc.str_field("identifier") {
        Some(hash) => hash.to_owned(),
        None => return vec![],
    };
    let original_tx_hash = doc.str_field("originalTxHash").map(String::from);
    let timestamp = doc.timestamp().unwrap_or_default();

    doc.0
        .get("events")
        .and_then(|v| v.as_array())
        .map(|events| {
            events
                .iter()
                .enumerate()
                .map(|(order, event)| MarketplaceEventRecord {
                    tx_hash: tx_hash.clone(),
                    original_tx_hash: original_tx_hash.clone(),
                    event_order: Some(
                        event
                            .get("order")
                            .and_then(|o| o.as_u64())
                            .unwrap_or(order as u64) as u32,
                    ),
                    is_tx: false,
                    marketplace_address: marketplace_address.to_owned(),
                    timestamp,
                    data: json!({ "eventData": event }),
                })
                .collect()
        })
        .unwrap_or_default()
}
