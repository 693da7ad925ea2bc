use itertools::Itertools;
use std::collections::HashMap;
use std::sync::Arc;

use super::super::JobError;
use crate::constants::index_fields;
use crate::core::types::split_identifier;
use crate::core::types::AttributeSummary;
use crate::core::types::Nft;
use crate::core::types::TraitSummary;
use crate::core::types::ValueOccurrence;
use crate::core::ChainApi;
use crate::core::DocumentStore;
use crate::events::CacheEventType;
use crate::events::ChangedEvent;
use crate::events::EventPublisher;
use crate::index::BulkUpdate;
use crate::index::SearchIndex;

/// Computes and reconciles per-collection trait summaries.
pub struct NftTraitsService {
    api: Arc<dyn ChainApi>,
    docs: Arc<dyn DocumentStore>,
    index: Arc<dyn SearchIndex>,
    publisher: Arc<dyn EventPublisher>,
}

impl NftTraitsService {
    pub fn new(
        api: Arc<dyn ChainApi>,
        docs: Arc<dyn DocumentStore>,
        index: Arc<dyn SearchIndex>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            api,
            docs,
            index,
            publisher,
        }
    }

    /// Rebuilds the summary from upstream truth; persists and flags the
    /// collection document only when the summary actually changed.
    pub async fn update_collection_traits(&self, collection: &str) -> Result<bool, JobError> {
        let nfts = self.api.collection_nfts(collection).await?;
        let summary = build_summary(collection, &nfts);
        let stored = self.docs.trait_summary(collection).await?;

        if stored.as_ref() == Some(&summary) {
            tracing::trace!("[{collection}] trait summary up to date");
            return Ok(false);
        }

        tracing::info!(
            "[{collection}] updating trait summary ({} attributes)",
            summary.attributes.len()
        );
        self.docs.save_trait_summary(&summary).await?;
        self.index
            .update_bulk(
                "tokens",
                "token",
                vec![BulkUpdate {
                    identifier: collection.to_owned(),
                    fields: [(index_fields::HAS_TRAIT_SUMMARY.to_owned(), true.into())]
                        .into_iter()
                        .collect(),
                }],
            )
            .await?;
        self.publisher
            .publish(ChangedEvent::new(collection, CacheEventType::AssetRefresh))
            .await;
        Ok(true)
    }

    /// Queue entries may be NFT identifiers or bare collection tickers.
    ///
    /// For an NFT, the collection summary is rebuilt only when the NFT's
    /// attributes are not yet reflected in it.
    pub async fn update_token_traits(&self, identifier: &str) -> Result<bool, JobError> {
        let (collection, nonce) = split_identifier(identifier);
        if nonce.is_none() {
            return self.update_collection_traits(&collection).await;
        }

        let nft = match self.api.nft(identifier).await? {
            Some(nft) => nft,
            None => {
                tracing::debug!("[{identifier}] unknown upstream, nothing to update");
                return Ok(false);
            }
        };
        let summary = self.docs.trait_summary(&collection).await?;
        match summary {
            Some(summary) if covers(&summary, &nft) => Ok(false),
            _ => self.update_collection_traits(&collection).await,
        }
    }
}

/// True when every attribute of `nft` already occurs in `summary`.
fn covers(summary: &TraitSummary, nft: &Nft) -> bool {
    nft.attributes.iter().all(|attribute| {
        summary
            .attributes
            .iter()
            .find(|a| a.name == attribute.trait_type)
            .map(|a| a.occurrences.iter().any(|o| o.value == attribute.value))
            .unwrap_or(false)
    })
}

/// Occurrence counts per trait name and value, deterministically ordered so
/// summaries compare by equality.
pub(super) fn build_summary(collection: &str, nfts: &[Nft]) -> TraitSummary {
    let mut counts: HashMap<(&str, &str), u64> = HashMap::new();
    for nft in nfts {
        for attribute in &nft.attributes {
            *counts
                .entry((&attribute.trait_type, &attribute.value))
                .or_default() += 1;
        }
    }

    let mut by_name: std::collections::BTreeMap<String, Vec<ValueOccurrence>> =
        std::collections::BTreeMap::new();
    for ((name, value), count) in counts.into_iter().sorted() {
        by_name.entry(name.to_owned()).or_default().push(ValueOccurrence {
            value: value.to_owned(),
            count,
        });
    }
    let attributes: Vec<AttributeSummary> = by_name
        .into_iter()
        .map(|(name, occurrences)| AttributeSummary { name, occurrences })
        .collect();

    TraitSummary {
        collection: collection.to_owned(),
        nft_count: nfts.len() as u64,
        attributes,
    }
}
