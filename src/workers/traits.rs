mod service;

pub use service::NftTraitsService;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::Sender;

use super::JobError;
use crate::cache::CacheStore;
use crate::constants::cache_keys;
use crate::constants::index_fields;
use crate::constants::settings::SCROLL_PAGE_SIZE;
use crate::constants::ttl;
use crate::index::ScrollCursor;
use crate::index::ScrollState;
use crate::index::SearchIndex;
use crate::index::SearchQuery;
use crate::lock::LockOutcome;
use crate::lock::Locker;
use crate::monitor::JobReport;
use crate::monitor::MonitorMessage;

const WORKER_ID: &str = "traits";

const VALIDATE_INTERVAL: Duration = Duration::from_secs(45 * 60);
const SET_INTERVAL: Duration = Duration::from_secs(15 * 60);
const QUEUE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Scheduled trait-summary reconciliation, shaped like the rarity job: a
/// bounded validate pass, a catch-up pass for unflagged collections and a
/// retry-queue drain.
pub struct TraitsUpdater {
    locker: Arc<Locker>,
    cache: Arc<CacheStore>,
    index: Arc<dyn SearchIndex>,
    service: NftTraitsService,
    monitor_tx: Sender<MonitorMessage>,
}

impl TraitsUpdater {
    pub fn new(
        locker: Arc<Locker>,
        cache: Arc<CacheStore>,
        index: Arc<dyn SearchIndex>,
        service: NftTraitsService,
        monitor_tx: Sender<MonitorMessage>,
    ) -> Self {
        Self {
            locker,
            cache,
            index,
            service,
            monitor_tx,
        }
    }

    #[tracing::instrument(name = "traits", skip_all)]
    pub async fn start(&self, max_per_tick: usize) {
        let mut validate_tick = tokio::time::interval(VALIDATE_INTERVAL);
        let mut set_tick = tokio::time::interval(SET_INTERVAL);
        let mut queue_tick = tokio::time::interval(QUEUE_INTERVAL);
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("got a ctrl-c message");
                    return;
                },
                _ = validate_tick.tick() => {
                    self.handle_validate_token_traits(max_per_tick).await;
                },
                _ = set_tick.tick() => {
                    self.handle_set_traits_where_not_set(max_per_tick).await;
                },
                _ = queue_tick.tick() => {
                    self.process_token_traits_queue().await;
                },
            }
        }
    }

    /// Revalidates the next `max` collections that already carry a trait
    /// summary, resuming from the persisted offset.
    pub async fn handle_validate_token_traits(&self, max: usize) {
        let outcome = self
            .locker
            .lock("handleValidateTokenTraits", true, || async {
                let state = ScrollState::new(
                    self.cache.clone(),
                    cache_keys::TRAITS_INDEXER_COUNTER,
                    ttl::SCROLL_STATE,
                );
                let last = state.last_offset().await;

                let mut collections: Vec<String> = vec![];
                let mut cursor = ScrollCursor::new(
                    self.index.as_ref(),
                    "tokens",
                    collections_with_summary_query(),
                )
                .stop_at_offset(last + max);
                while let Some(batch) = cursor.next_batch().await? {
                    for doc in &batch {
                        if let Some(ticker) = doc.str_field("token") {
                            if !collections.iter().any(|c| c == ticker) {
                                collections.push(ticker.to_owned());
                            }
                        }
                    }
                }

                let slice: Vec<String> = collections.into_iter().skip(last).take(max).collect();

                if slice.is_empty() {
                    state.set_last_offset(0).await;
                    return Ok::<_, JobError>((0, 0));
                }

                let (processed, failed) = self.update_collections(&slice).await;
                state.set_last_offset(last + slice.len()).await;
                Ok((processed, failed.len()))
            })
            .await;
        self.conclude("handleValidateTokenTraits", outcome).await;
    }

    /// Builds summaries for collections that have none yet.
    pub async fn handle_set_traits_where_not_set(&self, max: usize) {
        let outcome = self
            .locker
            .lock("handleSetTraitsWhereNotSet", true, || async {
                let mut to_update: Vec<String> = vec![];
                let mut cursor = ScrollCursor::new(
                    self.index.as_ref(),
                    "tokens",
                    collections_without_summary_query(),
                );
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

                let (processed, failed) = self.update_collections(&to_update).await;
                self.add_to_traits_queue(&failed).await?;
                Ok::<_, JobError>((processed, failed.len()))
            })
            .await;
        self.conclude("handleSetTraitsWhereNotSet", outcome).await;
    }

    /// Drains the retry queue. Entries are collections or single NFTs;
    /// whatever fails again goes back on the queue.
    pub async fn process_token_traits_queue(&self) {
        let outcome = self
            .locker
            .lock("processTokenTraitsQueue", true, || async {
                let drained = self.cache.list_drain(cache_keys::TRAITS_QUEUE).await?;
                let mut processed = 0;
                let mut failed: Vec<String> = vec![];
                for identifier in &drained {
                    let name = format!("updateTokenTraits_{identifier}");
                    let result = self
                        .locker
                        .lock(&name, true, || self.service.update_token_traits(identifier))
                        .await;
                    match result {
                        Ok(_) => processed += 1,
                        Err(e) => {
                            tracing::error!("[{WORKER_ID}] failed to update {identifier}: {e}");
                            failed.push(identifier.clone());
                        }
                    }
                }
                self.add_to_traits_queue(&failed).await?;
                Ok::<_, JobError>((processed, failed.len()))
            })
            .await;
        self.conclude("processTokenTraitsQueue", outcome).await;
    }

    pub async fn add_to_traits_queue(&self, identifiers: &[String]) -> Result<(), JobError> {
        if identifiers.is_empty() {
            return Ok(());
        }
        self.cache
            .list_append(cache_keys::TRAITS_QUEUE, identifiers)
            .await?;
        Ok(())
    }

    async fn update_collections(&self, collections: &[String]) -> (usize, Vec<String>) {
        let mut processed = 0;
        let mut failed: Vec<String> = vec![];
        for collection in collections {
            let name = format!("updateCollectionTraits_{collection}");
            let result = self
                .locker
                .lock(&name, true, || {
                    self.service.update_collection_traits(collection)
                })
                .await;
            match result {
                Ok(_) => processed += 1,
                Err(e) => {
                    tracing::error!("[{WORKER_ID}] failed to update {collection}: {e}");
                    failed.push(collection.clone());
                }
            }
        }
        (processed, failed)
    }

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

/// Collection documents that already have a trait summary.
fn collections_with_summary_query() -> SearchQuery {
    SearchQuery::create()
        .with_must_not_exist("nonce")
        .with_must_exist(index_fields::HAS_TRAIT_SUMMARY)
        .with_must_match(index_fields::HAS_TRAIT_SUMMARY, true)
        .with_pagination(0, SCROLL_PAGE_SIZE)
}

/// Collection documents still missing the trait summary flag.
fn collections_without_summary_query() -> SearchQuery {
    SearchQuery::create()
        .with_must_not_exist("nonce")
        .with_must_not_exist(index_fields::HAS_TRAIT_SUMMARY)
        .with_pagination(0, SCROLL_PAGE_SIZE)
}
