use std::env;
use std::sync::Arc;
use tokio;

use nftagg::cache::CacheStore;
use nftagg::cache::MemoryStore;
use nftagg::config::ApiConfig;
use nftagg::config::IndexConfig;
use nftagg::constants::settings::MAX_COLLECTIONS_PER_TICK;
use nftagg::core::HttpChainApi;
use nftagg::core::MemoryDocumentStore;
use nftagg::core::MemoryMarketplaceRepository;
use nftagg::core::MemoryRarityRepository;
use nftagg::events::ChannelEventPublisher;
use nftagg::events::InvalidationConsumer;
use nftagg::index::HttpSearchIndex;
use nftagg::lock::Locker;
use nftagg::monitor::Monitor;
use nftagg::workers::marketplace_events::MarketplaceEventsIndexer;
use nftagg::workers::rarity::NftRarityService;
use nftagg::workers::rarity::RarityUpdater;
use nftagg::workers::scam::NftScamService;
use nftagg::workers::scam::ScamUpdater;
use nftagg::workers::traits::NftTraitsService;
use nftagg::workers::traits::TraitsUpdater;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), &'static str> {
    // Configure tracing subscriber
    let filter = env::var("NFTAGG_LOG").unwrap_or(String::from("nftagg=info"));
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_max_level(tracing::Level::INFO)
        .with_env_filter(filter)
        .finish();

    let _guard = tracing::subscriber::set_global_default(subscriber);

    tracing::info!("starting nftagg v{VERSION}");
    if cfg!(feature = "test-utilities") {
        tracing::warn!("build includes test-utilities, use cargo's `--no-default-features` flag");
    } else {
        tracing::debug!("compiled without test-utilities");
    }

    // Env variables
    let api_url = env::var("NFTAGG_API_URL").unwrap();
    tracing::debug!("found NFTAGG_API_URL environment variable");

    let index_url = env::var("NFTAGG_INDEX_URL").unwrap();
    tracing::debug!("found NFTAGG_INDEX_URL environment variable");

    let mut monitor = Monitor::new();
    let monitor_tx = monitor.sender();

    // Shared handles
    let kv_store = Arc::new(MemoryStore::new());
    let cache = Arc::new(CacheStore::new(kv_store.clone()));
    let locker = Arc::new(Locker::new(kv_store));
    let api_conf = ApiConfig::new(&api_url);
    let index_conf = IndexConfig::new(&index_url);
    let api = Arc::new(HttpChainApi::new(&api_conf));
    let index = Arc::new(HttpSearchIndex::new(&index_conf));
    let rarity_repo = Arc::new(MemoryRarityRepository::new());
    let marketplace_repo = Arc::new(MemoryMarketplaceRepository::new());
    let docs = Arc::new(MemoryDocumentStore::new());

    // Cache invalidation channel
    let (events_tx, events_rx) = tokio::sync::mpsc::channel(64);
    let publisher = Arc::new(ChannelEventPublisher::new(events_tx));
    let invalidation = InvalidationConsumer::new(events_rx, cache.clone());

    // Workers
    let rarity = RarityUpdater::new(
        locker.clone(),
        cache.clone(),
        index.clone(),
        rarity_repo.clone(),
        NftRarityService::new(api.clone(), rarity_repo, publisher.clone()),
        monitor_tx.clone(),
    );

    let traits = TraitsUpdater::new(
        locker.clone(),
        cache.clone(),
        index.clone(),
        NftTraitsService::new(api.clone(), docs.clone(), index.clone(), publisher.clone()),
        monitor_tx.clone(),
    );

    let scam = ScamUpdater::new(
        locker.clone(),
        Arc::new(NftScamService::new(
            api.clone(),
            index.clone(),
            docs,
            publisher.clone(),
        )),
        monitor_tx.clone(),
    );

    let marketplace_events = MarketplaceEventsIndexer::new(
        locker,
        index,
        marketplace_repo,
        cache,
        publisher,
        monitor_tx,
    );

    // Start monitor
    tokio::spawn(async move {
        monitor.start().await;
    });

    // Start invalidation consumer
    tokio::spawn(async move {
        invalidation.start().await;
    });

    // Start workers
    tokio::spawn(async move {
        rarity.start(MAX_COLLECTIONS_PER_TICK).await;
    });
    tokio::spawn(async move {
        traits.start(MAX_COLLECTIONS_PER_TICK).await;
    });
    tokio::spawn(async move {
        scam.start().await;
    });
    tokio::spawn(async move {
        marketplace_events.start().await;
    });

    // Wait for ctrl-c
    _ = tokio::signal::ctrl_c().await;
    tracing::info!("exiting");
    Ok(())
}
