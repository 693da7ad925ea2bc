use std::time::Duration;

/// Cache key namespaces and literal keys.
pub mod cache_keys {
    /// Per-asset groups, suffixed with the identifier.
    pub const ASSETS: &str = "assets";
    /// Per-token data, suffixed with the token identifier.
    pub const TOKEN_PREFIX: &str = "token_";
    /// Native token USD quote.
    pub const EGLD_TOKEN: &str = "token_EGLD";
    pub const ALL_TOKENS: &str = "allTokens";
    pub const MARKETPLACES: &str = "marketplaces";

    /// Retry queues, one list per reconciliation domain.
    pub const RARITY_QUEUE: &str = "rarityQueue";
    pub const TRAITS_QUEUE: &str = "traitsQueue";

    /// Offset-resume counters for the scheduled validation passes.
    pub const RARITY_VALIDATOR_COUNTER: &str = "rarityValidatorCounter";
    pub const TRAITS_INDEXER_COUNTER: &str = "traitsIndexerCounter";
}

/// Cache TTLs, from volatile counts to token metadata.
pub mod ttl {
    use super::Duration;

    pub const ONE_MINUTE: Duration = Duration::from_secs(60);
    pub const ONE_HOUR: Duration = Duration::from_secs(3600);
    pub const ONE_DAY: Duration = Duration::from_secs(86400);
    pub const ONE_WEEK: Duration = Duration::from_secs(7 * 86400);

    pub const EGLD_PRICE: Duration = Duration::from_secs(60);
    pub const ALL_TOKENS: Duration = Duration::from_secs(600);
    pub const TOKEN: Duration = ONE_DAY;
    pub const ASSETS: Duration = ONE_DAY;
    /// Incomplete upstream data self-heals quickly under this TTL.
    pub const LOW_CONFIDENCE: Duration = ONE_MINUTE;
    /// Scroll offsets survive a crash but reset after a long idle spell.
    pub const SCROLL_STATE: Duration = Duration::from_secs(90 * 60);
}

pub mod settings {
    /// Page size for index scrolls.
    pub const SCROLL_PAGE_SIZE: usize = 50;
    /// Collections validated per scheduled rarity/traits tick.
    pub const MAX_COLLECTIONS_PER_TICK: usize = 10;
}

/// Index field names carrying scam info on token documents.
pub mod index_fields {
    pub const SCAM_TYPE: &str = "nft_scamInfoType";
    pub const SCAM_INFO: &str = "nft_scamInfoDescription";
    pub const HAS_RARITIES: &str = "nft_hasRarities";
    pub const HAS_RARITY: &str = "nft_hasRarity";
    pub const HAS_TRAIT_SUMMARY: &str = "nft_hasTraitSummary";
}
