mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

use nftagg::cache::CacheStore;
use nftagg::cache::MemoryStore;
use nftagg::constants::cache_keys;
use nftagg::core::types::Nft;
use nftagg::core::DocumentStore;
use nftagg::core::MemoryDocumentStore;
use nftagg::lock::Locker;
use nftagg::monitor::MonitorMessage;
use nftagg::workers::traits::NftTraitsService;
use nftagg::workers::traits::TraitsUpdater;

use common::collection_doc;
use common::CapturingPublisher;
use common::FakeChainApi;
use common::FakeIndex;

struct Setup {
    cache: Arc<CacheStore>,
    api: Arc<FakeChainApi>,
    index: Arc<FakeIndex>,
    docs: Arc<MemoryDocumentStore>,
    updater: TraitsUpdater,
    _monitor_rx: tokio::sync::mpsc::Receiver<MonitorMessage>,
}

fn setup(index: FakeIndex) -> Setup {
    let store = Arc::new(MemoryStore::new());
    let cache = Arc::new(CacheStore::new(store.clone()));
    let locker = Arc::new(Locker::new(store));
    let api = Arc::new(FakeChainApi::new());
    let index = Arc::new(index);
    let docs = Arc::new(MemoryDocumentStore::new());
    let publisher = Arc::new(CapturingPublisher::new());
    let (monitor_tx, monitor_rx) = tokio::sync::mpsc::channel(32);

    let updater = TraitsUpdater::new(
        locker,
        cache.clone(),
        index.clone(),
        NftTraitsService::new(api.clone(), docs.clone(), index.clone(), publisher),
        monitor_tx,
    );
    Setup {
        cache,
        api,
        index,
        docs,
        updater,
        _monitor_rx: monitor_rx,
    }
}

fn attributed_nfts(ticker: &str) -> Vec<Nft> {
    vec![
        Nft::dummy(ticker, 1)
            .attribute("background", "blue")
            .attribute("eyes", "red"),
        Nft::dummy(ticker, 2).attribute("background", "blue"),
    ]
}

/// Collections without the summary flag get one built, persisted and flagged
/// in the index.
#[tokio::test]
async fn set_where_not_set_builds_summary() {
    let s = setup(FakeIndex::with_docs(
        "tokens",
        vec![collection_doc("TRAIT-000001", json!({}))],
    ));
    s.api.put_collection("TRAIT-000001", attributed_nfts("TRAIT-000001"));

    s.updater.handle_set_traits_where_not_set(5).await;

    let summary = s
        .docs
        .trait_summary("TRAIT-000001")
        .await
        .unwrap()
        .expect("summary persisted");
    assert_eq!(summary.nft_count, 2);
    assert_eq!(summary.attributes.len(), 2);

    // The collection document now carries the flag.
    let doc = s
        .index
        .doc_by_field("tokens", "token", "TRAIT-000001")
        .expect("collection doc");
    assert_eq!(doc.bool_field("nft_hasTraitSummary"), Some(true));
    assert_eq!(s.index.update_calls(), 1);
}

/// Re-running against unchanged upstream data writes nothing.
#[tokio::test]
async fn summary_update_is_idempotent() {
    let s = setup(FakeIndex::with_docs(
        "tokens",
        vec![collection_doc("TRAIT-000001", json!({}))],
    ));
    s.api.put_collection("TRAIT-000001", attributed_nfts("TRAIT-000001"));

    s.updater.handle_set_traits_where_not_set(5).await;
    assert_eq!(s.docs.summary_writes(), 1);

    // The flag update took the collection out of the not-set query, but a
    // direct revalidation must also see it is current.
    s.updater.handle_set_traits_where_not_set(5).await;
    s.updater.handle_validate_token_traits(5).await;
    assert_eq!(s.docs.summary_writes(), 1);
}

/// A changed collection upstream makes the validate pass rewrite the summary.
#[tokio::test]
async fn validate_picks_up_upstream_changes() {
    let s = setup(FakeIndex::with_docs(
        "tokens",
        vec![collection_doc(
            "TRAIT-000001",
            json!({ "nft_hasTraitSummary": true }),
        )],
    ));
    s.api.put_collection("TRAIT-000001", attributed_nfts("TRAIT-000001"));

    s.updater.handle_validate_token_traits(5).await;
    assert_eq!(s.docs.summary_writes(), 1);

    // A new NFT shifts the occurrence counts.
    let mut nfts = attributed_nfts("TRAIT-000001");
    nfts.push(Nft::dummy("TRAIT-000001", 3).attribute("background", "gold"));
    s.api.put_collection("TRAIT-000001", nfts);

    s.updater.handle_validate_token_traits(5).await;
    assert_eq!(s.docs.summary_writes(), 2);

    let summary = s
        .docs
        .trait_summary("TRAIT-000001")
        .await
        .unwrap()
        .expect("summary persisted");
    assert_eq!(summary.nft_count, 3);
}

/// Queue entries that are single NFTs only rebuild the summary when the NFT
/// brings unseen attribute values.
#[tokio::test]
async fn queued_nft_with_known_traits_is_a_noop() {
    let s = setup(FakeIndex::with_docs(
        "tokens",
        vec![collection_doc("TRAIT-000001", json!({}))],
    ));
    s.api.put_collection("TRAIT-000001", attributed_nfts("TRAIT-000001"));

    // Seed the summary.
    s.updater.handle_set_traits_where_not_set(5).await;
    assert_eq!(s.docs.summary_writes(), 1);

    // Queue an NFT whose attributes the summary already covers.
    s.updater
        .add_to_traits_queue(&["TRAIT-000001-02".to_string()])
        .await
        .unwrap();
    s.updater.process_token_traits_queue().await;

    assert_eq!(s.docs.summary_writes(), 1);
    assert_eq!(
        s.cache.list_drain(cache_keys::TRAITS_QUEUE).await.unwrap(),
        Vec::<String>::new()
    );
}
