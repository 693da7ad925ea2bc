use crate::constants::index_fields;
use crate::constants::settings::SCROLL_PAGE_SIZE;
use crate::index::SearchQuery;

const NFT_TYPES: [&str; 2] = ["NonFungibleESDT", "SemiFungibleESDT"];

/// Collection documents that already carry rarities, for the validate pass.
pub(super) fn collections_with_rarities() -> SearchQuery {
    SearchQuery::create()
        .with_must_not_exist("nonce")
        .with_must_exist(index_fields::HAS_RARITIES)
        .with_must_match(index_fields::HAS_RARITIES, true)
        .with_should_match("type", NFT_TYPES.to_vec())
        .with_pagination(0, SCROLL_PAGE_SIZE)
}

/// NFT documents missing their rarity flag, for the update pass.
pub(super) fn nfts_missing_rarity() -> SearchQuery {
    SearchQuery::create()
        .with_must_exist("nonce")
        .with_must_not_exist(index_fields::HAS_RARITY)
        .with_must_nested("data", "nonEmptyURIs", true)
        .with_must_nested("data", "whiteListedStorage", true)
        .with_should_match("type", NFT_TYPES.to_vec())
        .with_pagination(0, SCROLL_PAGE_SIZE)
}
