use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;

pub type Address = String;
/// Collection ticker, e.g. `CHESS-1a2b3c`.
pub type CollectionTicker = String;
/// Full NFT identifier, e.g. `CHESS-1a2b3c-04`.
pub type NftIdentifier = String;
pub type Timestamp = i64;
pub type TxHash = String;

/// Sentinel `version` marking a manually curated scam-info record.
///
/// Terminal for the automatic reconciliation path; only an explicit manual
/// clear returns such a record to the automatic flow.
pub const MANUAL_SCAM_INFO_VERSION: &str = "manual";

/// Splits an NFT identifier into its collection ticker and nonce.
///
/// An identifier with no nonce part denotes the collection itself.
pub fn split_identifier(identifier: &str) -> (CollectionTicker, Option<u64>) {
    let parts: Vec<&str> = identifier.split('-').collect();
    if parts.len() < 3 {
        return (identifier.to_owned(), None);
    }
    let collection = format!("{}-{}", parts[0], parts[1]);
    let nonce = u64::from_str_radix(parts[2], 16).ok();
    (collection, nonce)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NftType {
    NonFungibleESDT,
    SemiFungibleESDT,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScamInfoType {
    Potential,
    Scam,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScamInfo {
    #[serde(rename = "type")]
    pub scam_type: ScamInfoType,
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftAttribute {
    pub trait_type: String,
    pub value: String,
}

/// An NFT as returned by the chain API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nft {
    pub identifier: NftIdentifier,
    pub collection: CollectionTicker,
    pub nonce: u64,
    #[serde(rename = "type")]
    pub nft_type: NftType,
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<NftAttribute>,
    #[serde(default)]
    pub owner: Option<Address>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub scam_info: Option<ScamInfo>,
}

impl Nft {
    /// A result worth caching only briefly: the gateway has not filled in
    /// owner or media yet and usually will within minutes.
    pub fn is_low_confidence(&self) -> bool {
        self.owner.is_none()
            || self
                .thumbnail_url
                .as_deref()
                .map(|u| u.contains("default"))
                .unwrap_or(true)
    }
}

/// Per-NFT rarity as persisted by the rarity reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftRarity {
    pub identifier: NftIdentifier,
    pub collection: CollectionTicker,
    pub nonce: u64,
    pub score: Decimal,
    pub rank: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueOccurrence {
    pub value: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSummary {
    pub name: String,
    pub occurrences: Vec<ValueOccurrence>,
}

/// Per-collection trait summary as persisted by the traits reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraitSummary {
    pub collection: CollectionTicker,
    pub nft_count: u64,
    pub attributes: Vec<AttributeSummary>,
}

/// Per-NFT scam info record in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NftScamRecord {
    pub identifier: NftIdentifier,
    /// Scam engine version that produced this record, or
    /// [`MANUAL_SCAM_INFO_VERSION`].
    pub version: String,
    pub scam_info: Option<ScamInfo>,
}

impl NftScamRecord {
    pub fn is_manual(&self) -> bool {
        self.version == MANUAL_SCAM_INFO_VERSION
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marketplace {
    pub address: Address,
    pub name: String,
    pub last_index_timestamp: Option<Timestamp>,
}

/// One indexed marketplace transaction or event log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketplaceEventRecord {
    pub tx_hash: TxHash,
    pub original_tx_hash: Option<TxHash>,
    pub event_order: Option<u32>,
    pub is_tx: bool,
    pub marketplace_address: Address,
    pub timestamp: Timestamp,
    pub data: serde_json::Value,
}

/// A fungible token with its USD quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub identifier: String,
    pub name: String,
    pub decimals: u32,
    pub price_usd: Option<Decimal>,
}

#[cfg(feature = "test-utilities")]
pub mod testutils {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    use super::Nft;
    use super::NftAttribute;
    use super::NftType;

    /// Random collection ticker like `TEST-1a2b3c`.
    pub fn random_ticker() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect();
        format!("TEST-{}", suffix)
    }

    impl Nft {
        pub fn dummy(collection: &str, nonce: u64) -> Self {
            Self {
                identifier: format!("{}-{:02x}", collection, nonce),
                collection: collection.to_owned(),
                nonce,
                nft_type: NftType::NonFungibleESDT,
                name: format!("{} #{}", collection, nonce),
                attributes: vec![],
                owner: Some("erd1dummyowner".to_owned()),
                thumbnail_url: Some("https://media.test/thumb.png".to_owned()),
                scam_info: None,
            }
        }

        /// Returns copy with an extra attribute.
        pub fn attribute(mut self, trait_type: &str, value: &str) -> Self {
            self.attributes.push(NftAttribute {
                trait_type: trait_type.to_owned(),
                value: value.to_owned(),
            });
            self
        }

        /// Returns copy with owner set or cleared.
        pub fn owner(mut self, owner: Option<&str>) -> Self {
            self.owner = owner.map(|o| o.to_owned());
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::split_identifier;
    use pretty_assertions::assert_eq;

    #[test]
    fn split_full_identifier() {
        let (collection, nonce) = split_identifier("CHESS-1a2b3c-0a");
        assert_eq!(collection, "CHESS-1a2b3c");
        assert_eq!(nonce, Some(10));
    }

    #[test]
    fn split_collection_only() {
        let (collection, nonce) = split_identifier("CHESS-1a2b3c");
        assert_eq!(collection, "CHESS-1a2b3c");
        assert_eq!(nonce, None);
    }
}
