use itertools::Itertools;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;

use super::super::JobError;
use crate::core::types::Nft;
use crate::core::types::NftRarity;
use crate::core::ChainApi;
use crate::core::RarityRepository;
use crate::events::CacheEventType;
use crate::events::ChangedEvent;
use crate::events::EventPublisher;

/// Computes and reconciles per-NFT rarity rows for whole collections.
pub struct NftRarityService {
    api: Arc<dyn ChainApi>,
    repo: Arc<dyn RarityRepository>,
    publisher: Arc<dyn EventPublisher>,
}

impl NftRarityService {
    pub fn new(
        api: Arc<dyn ChainApi>,
        repo: Arc<dyn RarityRepository>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            api,
            repo,
            publisher,
        }
    }

    /// Recomputes rarities from upstream truth and persists only deltas.
    ///
    /// Returns whether anything was written. A run against unchanged upstream
    /// data is a no-op.
    pub async fn validate_rarities(&self, collection: &str) -> Result<bool, JobError> {
        let nfts = self.api.collection_nfts(collection).await?;
        let computed = compute_rarities(&nfts);
        let stored = self.repo.rarities(collection).await?;

        if !differ(&stored, &computed) {
            tracing::trace!("[{collection}] rarities up to date");
            return Ok(false);
        }

        tracing::info!(
            "[{collection}] updating rarities for {} NFTs",
            computed.len()
        );
        self.repo.upsert_rarities(&computed).await?;
        self.publisher
            .publish(ChangedEvent::new(collection, CacheEventType::AssetRefresh))
            .await;
        Ok(true)
    }
}

/// Statistical rarity: an NFT's score is the sum over its attributes of the
/// inverse trait frequency; rank 1 is the rarest.
pub(super) fn compute_rarities(nfts: &[Nft]) -> Vec<NftRarity> {
    if nfts.is_empty() {
        return vec![];
    }
    let total = Decimal::from(nfts.len());

    let mut counts: HashMap<(&str, &str), i64> = HashMap::new();
    for nft in nfts {
        for attribute in &nft.attributes {
            *counts
                .entry((&attribute.trait_type, &attribute.value))
                .or_default() += 1;
        }
    }

    nfts.iter()
        .map(|nft| {
            let score: Decimal = nft
                .attributes
                .iter()
                .map(|a| total / Decimal::from(counts[&(a.trait_type.as_str(), a.value.as_str())]))
                .sum();
            (nft, score.round_dp(4))
        })
        .sorted_by(|(a, score_a), (b, score_b)| {
            score_b.cmp(score_a).then(a.nonce.cmp(&b.nonce))
        })
        .enumerate()
        .map(|(i, (nft, score))| NftRarity {
            identifier: nft.identifier.clone(),
            collection: nft.collection.clone(),
            nonce: nft.nonce,
            score,
            rank: (i + 1) as u32,
        })
        .collect()
}

fn differ(stored: &[NftRarity], computed: &[NftRarity]) -> bool {
    if stored.len() != computed.len() {
        return true;
    }
    let by_id: HashMap<&str, &NftRarity> =
        stored.iter().map(|r| (r.identifier.as_str(), r)).collect();
    computed.iter().any(|c| match by_id.get(c.identifier.as_str()) {
        Some(s) => s.score != c.score || s.rank != c.rank,
        None => true,
    })
}
