mod queries;
mod service;

pub use service::NftRarityService;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

use super::JobError;
use crate::cache::CacheStore;
use crate::constants::cache_keys;
use crate::constants::ttl;
use crate::index::ScrollCursor;
use crate::index::ScrollState;
use crate::index::SearchIndex;
use crate::lock::LockOutcome;
use crate::lock::Locker;
use crate::monitor::JobReport;
use crate::monitor::MonitorMessage;
use crate::core::RarityRepository;

const WORKER_ID: &str = "rarity";

const VALIDATE_INTERVAL: Duration = Duration::from_secs(30 * 60);
const UPDATE_INTERVAL: Duration = Duration::from_secs(10 * 60);
const QUEUE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Scheduled rarity reconciliation.
///
/// A validate pass walks known collections in bounded, offset-resumed slices;
/// an update pass picks up collections whose NFTs lack rarity flags; failures
/// land on a retry queue drained by its own tick.
pub struct RarityUpdater {
    locker: Arc<Locker>,
    cache: Arc<CacheStore>,
    index: Arc<dyn SearchIndex>,
    repo: Arc<dyn RarityRepository>,
    service: NftRarityService,
    monitor_tx: Sender<MonitorMessage>,
}

impl RarityUpdater {
    pub fn new(
        locker: Arc<Locker>,
        cache: Arc<CacheStore>,
        index: Arc<dyn SearchIndex>,
        repo: Arc<dyn RarityRepository>,
        service: NftRarityService,
        monitor_tx: Sender<MonitorMessage>,
    ) -> Self {
        Self {
            locker,
            cache,
            index,
            repo,
            service,
            monitor_tx,
        }
    }

    #[tracing::instrument(name = "rarity", skip_all)]
    pub async fn start(&self, max_per_tick: usize) {
        let mut validate_tick = tokio::time::interval(VALIDATE_INTERVAL);
        let mut update_tick = tokio::time::interval(UPDATE_INTERVAL);
        let mut queue_tick = tokio::time::interval(QUEUE_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("got a ctrl-c message");
                    return;
                },
                _ = validate_tick.tick() => {
                    self.handle_validate_token_rarities(max_per_tick).await;
                },
                _ = update_tick.tick() => {
                    self.handle_update_token_rarities(max_per_tick).await;
                },
                _ = queue_tick.tick() => {
                    self.process_rarity_queue().await;
                },
            }
        }
    }

    /// Revalidates every collection that has rarity rows.
    pub async fn handle_reindex_token_rarities(&self) {
        let outcome = self
            .locker
            .lock("handleReindexTokenRarities", true, || async {
                let collections = self.repo.collection_ids().await?;
                let (processed, failed) = self.validate_collections(&collections).await;
                Ok::<_, JobError>((processed, failed.len()))
            })
            .await;
        self.conclude("handleReindexTokenRarities", outcome).await;
    }

    /// Validates the next `max` collections, resuming from the persisted
    /// offset and wrapping to the start once the universe is exhausted.
    pub async fn handle_validate_token_rarities(&self, max: usize) {
        let outcome = self
            .locker
            .lock("handleValidateTokenRarities", true, || async {
                let state = ScrollState::new(
                    self.cache.clone(),
                    cache_keys::RARITY_VALIDATOR_COUNTER,
                    ttl::SCROLL_STATE,
                );
                let last = state.last_offset().await;

                let mut collections: Vec<String> = vec![];
                let mut cursor =
                    ScrollCursor::new(self.index.as_ref(), "tokens", queries::collections_with_rarities())
                        .stop_at_offset(last + max);
                while let Some(batch) = cursor.next_batch().await? {
                    collections
                        .extend(batch.iter().filter_map(|d| d.str_field("token").map(String::from)));
                }

                let slice: Vec<String> = collections.into_iter().skip(last).take(max).collect();

                if slice.len() < max {
                    // End of the collection universe; next tick starts over.
                    state.set_last_offset(0).await;
                    return Ok::<_, JobError>((0, 0));
                }

                let (processed, failed) = self.validate_collections(&slice).await;
                state.set_last_offset(last + slice.len()).await;
                Ok((processed, failed.len()))
            })
            .await;
        self.conclude("handleValidateTokenRarities", outcome).await;
    }

    /// Computes rarities for collections whose NFTs have none yet. Failed
    /// collections go to the retry queue.
    pub async fn handle_update_token_rarities(&self, max: usize) {
        let outcome = self
            .locker
            .lock("handleUpdateTokenRarities", true, || async {
                let mut to_update: Vec<String> = vec![];
                let mut cursor =
                    ScrollCursor::new(self.index.as_ref(), "tokens", queries::nfts_missing_rarity());
                while let Some(batch) = cursor.next_batch().await? {
                    for doc in &batch {
                        if let Some(ticker) = doc.str_field("token") {
                            if !to_update.iter().any(|t| t == ticker) {
                                to_update.push(ticker.to_owned());
                            }
                        }
                    }
                    if to_update.len() >= max {
                        break;
                    }
                }
                to_update.truncate(max);

                let (processed, failed) = self.validate_collections(&to_update).await;
                self.add_to_rarity_queue(&failed).await?;
                Ok::<_, JobError>((processed, failed.len()))
            })
            .await;
        self.conclude("handleUpdateTokenRarities", outcome).await;
    }

    /// Drains the retry queue and revalidates every queued collection,
    /// requeueing the ones that fail again.
    pub async fn process_rarity_queue(&self) {
        let outcome = self
            .locker
            .lock("processTokenRarityQueue", true, || async {
                let drained = self.cache.list_drain(cache_keys::RARITY_QUEUE).await?;
                let (processed, failed) = self.validate_collections(&drained).await;
                self.add_to_rarity_queue(&failed).await?;
                Ok::<_, JobError>((processed, failed.len()))
            })
            .await;
        self.conclude("processTokenRarityQueue", outcome).await;
    }

    pub async fn add_to_rarity_queue(&self, collections: &[String]) -> Result<(), JobError> {
        if collections.is_empty() {
            return Ok(());
        }
        self.cache
            .list_append(cache_keys::RARITY_QUEUE, collections)
            .await?;
        Ok(())
    }

    /// Validates collections one by one under a per-collection lock so a bulk
    /// run and a targeted update cannot race on the same collection. Returns
    /// processed count and the collections that failed.
    async fn validate_collections(&self, collections: &[String]) -> (usize, Vec<String>) {
        let mut processed = 0;
        let mut failed: Vec<String> = vec![];
        for collection in collections {
            let name = format!("updateRarities_{collection}");
            let result = self
                .locker
                .lock(&name, true, || self.service.validate_rarities(collection))
                .await;
            match result {
                Ok(_) => processed += 1,
                Err(e) => {
                    tracing::error!("[{WORKER_ID}] failed to validate {collection}: {e}");
                    failed.push(collection.clone());
                }
            }
        }
        (processed, failed)
    }

    /// Logs the tick's outcome and reports it to the monitor.
    async fn conclude(
        &self,
        job: &'static str,
        outcome: Result<LockOutcome<(usize, usize)>, crate::lock::LockError<JobError>>,
    ) {
        match outcome {
            Ok(LockOutcome::Completed((processed, failed))) => {
                self.monitor_tx
                    .send(MonitorMessage::Job(JobReport::new(job, processed, failed)))
                    .await
                    .unwrap();
            }
            Ok(LockOutcome::Skipped) => (),
            Err(e) => tracing::error!("[{WORKER_ID}] {job} failed: {e}"),
        }
    }
}
