mod common;

use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use nftagg::cache::CacheStore;
use nftagg::cache::MemoryStore;
use nftagg::index::ScrollCursor;
use nftagg::index::ScrollState;
use nftagg::index::SearchIndex;
use nftagg::index::SearchQuery;

use common::nft_doc;
use common::FakeIndex;

fn docs(n: u64) -> Vec<nftagg::index::Document> {
    (1..=n).map(|i| nft_doc("SCAN-000001", i, json!({}))).collect()
}

fn paged_query(size: usize) -> SearchQuery {
    SearchQuery::create()
        .with_must_exist("nonce")
        .with_pagination(0, size)
}

#[tokio::test]
async fn scroll_walks_all_pages() {
    let index = FakeIndex::with_docs("tokens", docs(25));
    let mut cursor = ScrollCursor::new(&index, "tokens", paged_query(10));

    let mut seen = 0;
    while let Some(batch) = cursor.next_batch().await.unwrap() {
        seen += batch.len();
    }
    assert_eq!(seen, 25);
    // 10 + 10 + 5; the short page ends the scan without an extra request.
    assert_eq!(index.search_calls(), 3);
}

#[tokio::test]
async fn stop_at_offset_fetches_minimum_pages() {
    let index = FakeIndex::with_docs("tokens", docs(100));
    let mut cursor = ScrollCursor::new(&index, "tokens", paged_query(10)).stop_at_offset(15);

    let mut seen = 0;
    while let Some(batch) = cursor.next_batch().await.unwrap() {
        seen += batch.len();
    }

    // Two pages cover offset 15; nothing beyond is requested.
    assert_eq!(seen, 15);
    assert_eq!(index.search_calls(), 2);
}

#[tokio::test]
async fn caller_break_stops_fetching() {
    let index = FakeIndex::with_docs("tokens", docs(100));
    let mut cursor = ScrollCursor::new(&index, "tokens", paged_query(10));

    let mut collected: Vec<String> = vec![];
    while let Some(batch) = cursor.next_batch().await.unwrap() {
        collected.extend(
            batch
                .iter()
                .filter_map(|d| d.str_field("identifier").map(String::from)),
        );
        if collected.len() >= 20 {
            break;
        }
    }

    assert_eq!(collected.len(), 20);
    assert_eq!(index.search_calls(), 2);
}

#[tokio::test]
async fn empty_result_ends_immediately() {
    let index = FakeIndex::new();
    let mut cursor = ScrollCursor::new(&index, "tokens", paged_query(10));
    assert_eq!(cursor.next_batch().await.unwrap(), None);
    assert_eq!(cursor.next_batch().await.unwrap(), None);
    assert_eq!(index.search_calls(), 1);
}

#[tokio::test]
async fn scroll_state_round_trip() {
    let cache = Arc::new(CacheStore::new(Arc::new(MemoryStore::new())));
    let state = ScrollState::new(cache.clone(), "scanCounter", Duration::from_secs(600));

    assert_eq!(state.last_offset().await, 0);
    state.set_last_offset(40).await;
    assert_eq!(state.last_offset().await, 40);

    // A fresh handle over the same cache sees the persisted offset.
    let resumed = ScrollState::new(cache, "scanCounter", Duration::from_secs(600));
    assert_eq!(resumed.last_offset().await, 40);
}

#[tokio::test]
async fn count_matches_universe() {
    let index = FakeIndex::with_docs("tokens", docs(7));
    let count = index.count("tokens", &paged_query(2)).await.unwrap();
    assert_eq!(count, 7);
}
