use crate::constants::settings::SCROLL_PAGE_SIZE;
use crate::index::SearchQuery;

/// All collection-level documents.
pub(super) fn all_collections() -> SearchQuery {
    SearchQuery::create()
        .with_must_not_exist("nonce")
        .with_pagination(0, SCROLL_PAGE_SIZE)
}

/// All NFT documents of one collection.
pub(super) fn collection_nfts(collection: &str) -> SearchQuery {
    SearchQuery::create()
        .with_must_match("token", collection)
        .with_must_exist("nonce")
        .with_pagination(0, SCROLL_PAGE_SIZE)
}

/// A single NFT document by identifier.
pub(super) fn nft_by_identifier(identifier: &str) -> SearchQuery {
    SearchQuery::create()
        .with_must_match("identifier", identifier)
        .with_pagination(0, 1)
}
