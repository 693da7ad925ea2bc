use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::super::JobError;
use super::queries;
use crate::constants::index_fields;
use crate::core::types::Nft;
use crate::core::types::NftScamRecord;
use crate::core::types::ScamInfo;
use crate::core::types::ScamInfoType;
use crate::core::types::MANUAL_SCAM_INFO_VERSION;
use crate::core::ChainApi;
use crate::core::DocumentStore;
use crate::events::CacheEventType;
use crate::events::ChangedEvent;
use crate::events::EventPublisher;
use crate::index::BulkUpdate;
use crate::index::Document;
use crate::index::ScrollCursor;
use crate::index::SearchIndex;

/// Reconciles per-NFT scam info between the chain API (truth), the document
/// store and the search index.
pub struct NftScamService {
    api: Arc<dyn ChainApi>,
    index: Arc<dyn SearchIndex>,
    docs: Arc<dyn DocumentStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl NftScamService {
    pub fn new(
        api: Arc<dyn ChainApi>,
        index: Arc<dyn SearchIndex>,
        docs: Arc<dyn DocumentStore>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            api,
            index,
            docs,
            publisher,
        }
    }

    /// Validates one NFT's scam info against upstream truth.
    ///
    /// A manually curated record is left untouched, without contacting
    /// upstream at all, unless `clear_manual` is set.
    pub async fn validate_or_update_nft_scam_info(
        &self,
        identifier: &str,
        clear_manual: bool,
    ) -> Result<(), JobError> {
        let record = self.docs.scam_record(identifier).await?;

        if let Some(ref record) = record {
            if record.is_manual() && !clear_manual {
                tracing::debug!("[{identifier}] manually curated, leaving as is");
                return Ok(());
            }
        }

        let version = self.api.about().await?.scam_engine_version;
        let nft = match self.api.nft(identifier).await? {
            Some(nft) => nft,
            None => {
                tracing::debug!("[{identifier}] unknown upstream, nothing to validate");
                return Ok(());
            }
        };
        let doc = self
            .index
            .search("tokens", &queries::nft_by_identifier(identifier))
            .await?
            .into_iter()
            .next();

        self.reconcile_one(&nft, record.as_ref(), doc.as_ref(), &version)
            .await
    }

    /// Walks every collection and reconciles all its NFTs.
    ///
    /// Returns processed and failed collection counts; one bad collection
    /// never aborts the pass.
    pub async fn validate_or_update_all(&self) -> Result<(usize, usize), JobError> {
        let version = self.api.about().await?.scam_engine_version;

        let mut collections: Vec<String> = vec![];
        let mut cursor = ScrollCursor::new(self.index.as_ref(), "tokens", queries::all_collections());
        while let Some(batch) = cursor.next_batch().await? {
            collections.extend(
                batch
                    .iter()
                    .filter_map(|d| d.str_field("token").map(String::from)),
            );
        }

        let mut processed = 0;
        let mut failed = 0;
        for collection in &collections {
            match self.validate_collection(collection, &version).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    tracing::error!("[scam] failed to process {collection}: {e}");
                    failed += 1;
                }
            }
        }
        tracing::info!("[scam] processed scam info for {processed} collections");
        Ok((processed, failed))
    }

    pub async fn validate_collection(
        &self,
        collection: &str,
        version: &str,
    ) -> Result<(), JobError> {
        tracing::debug!("[{collection}] processing scam info");
        let mut cursor = ScrollCursor::new(
            self.index.as_ref(),
            "tokens",
            queries::collection_nfts(collection),
        );
        while let Some(batch) = cursor.next_batch().await? {
            self.validate_batch(&batch, version).await?;
        }
        Ok(())
    }

    /// Reconciles one page of index documents in two bulk round trips: one
    /// to the document store, one to the API for the stale subset.
    async fn validate_batch(&self, docs: &[Document], version: &str) -> Result<(), JobError> {
        if docs.is_empty() {
            return Ok(());
        }
        let identifiers: Vec<String> = docs
            .iter()
            .filter_map(|d| d.str_field("identifier").map(String::from))
            .collect();
        let records: HashMap<String, NftScamRecord> = self
            .docs
            .scam_records(&identifiers)
            .await?
            .into_iter()
            .map(|r| (r.identifier.clone(), r))
            .collect();

        let mut stale: Vec<String> = vec![];
        let mut index_updates: Vec<BulkUpdate> = vec![];

        for doc in docs {
            let identifier = match doc.str_field("identifier") {
                Some(id) => id,
                None => continue,
            };
            match records.get(identifier) {
                // Manual curation wins over the engine.
                Some(record) if record.is_manual() => (),
                Some(record) if record.version == version => {
                    // Record is current; the index may still lag behind it.
                    if doc_scam_info(doc) != record.scam_info {
                        index_updates.push(scam_update(identifier, record.scam_info.as_ref()));
                    }
                }
                _ => stale.push(identifier.to_owned()),
            }
        }

        let mut record_saves: Vec<NftScamRecord> = vec![];
        if !stale.is_empty() {
            let nfts = self.api.nfts_by_identifiers(&stale).await?;
            let docs_by_id: HashMap<&str, &Document> = docs
                .iter()
                .filter_map(|d| d.str_field("identifier").map(|id| (id, d)))
                .collect();
            for nft in &nfts {
                record_saves.push(NftScamRecord {
                    identifier: nft.identifier.clone(),
                    version: version.to_owned(),
                    scam_info: nft.scam_info.clone(),
                });
                let indexed = docs_by_id
                    .get(nft.identifier.as_str())
                    .and_then(|d| doc_scam_info(d));
                if indexed != nft.scam_info {
                    index_updates.push(scam_update(&nft.identifier, nft.scam_info.as_ref()));
                }
            }
        }

        self.docs.save_scam_records(&record_saves).await?;
        self.index
            .update_bulk("tokens", "identifier", index_updates)
            .await?;
        Ok(())
    }

    async fn reconcile_one(
        &self,
        nft: &Nft,
        record: Option<&NftScamRecord>,
        doc: Option<&Document>,
        version: &str,
    ) -> Result<(), JobError> {
        let record_differs = match record {
            Some(record) => record.version != version || record.scam_info != nft.scam_info,
            None => true,
        };
        if record_differs {
            self.docs
                .save_scam_record(&NftScamRecord {
                    identifier: nft.identifier.clone(),
                    version: version.to_owned(),
                    scam_info: nft.scam_info.clone(),
                })
                .await?;
        }

        let indexed = doc.and_then(doc_scam_info);
        if indexed != nft.scam_info {
            self.index
                .update_bulk(
                    "tokens",
                    "identifier",
                    vec![scam_update(&nft.identifier, nft.scam_info.as_ref())],
                )
                .await?;
        }
        Ok(())
    }

    /// Pins the record to the manual sentinel so the automatic path never
    /// touches it again.
    pub async fn manually_set_nft_scam_info(
        &self,
        identifier: &str,
        scam_type: ScamInfoType,
        info: &str,
    ) -> Result<(), JobError> {
        let scam_info = ScamInfo {
            scam_type,
            info: info.to_owned(),
        };
        self.docs
            .save_scam_record(&NftScamRecord {
                identifier: identifier.to_owned(),
                version: MANUAL_SCAM_INFO_VERSION.to_owned(),
                scam_info: Some(scam_info.clone()),
            })
            .await?;
        self.index
            .update_bulk(
                "tokens",
                "identifier",
                vec![scam_update(identifier, Some(&scam_info))],
            )
            .await?;
        self.publisher
            .publish(ChangedEvent::new(identifier, CacheEventType::AssetRefresh))
            .await;
        Ok(())
    }

    /// Returns a manually curated record to the automatic flow and
    /// revalidates it right away.
    pub async fn manually_clear_nft_scam_info(&self, identifier: &str) -> Result<(), JobError> {
        self.validate_or_update_nft_scam_info(identifier, true)
            .await?;
        self.publisher
            .publish(ChangedEvent::new(identifier, CacheEventType::AssetRefresh))
            .await;
        Ok(())
    }
}

/// Scam info as currently denormalized on an index document.
fn doc_scam_info(doc: &Document) -> Option<ScamInfo> {
    let scam_type = match doc.str_field(index_fields::SCAM_TYPE)? {
        "potential" => ScamInfoType::Potential,
        "scam" => ScamInfoType::Scam,
        other => {
            tracing::warn!("unknown scam type {other} in index");
            return None;
        }
    };
    Some(ScamInfo {
        scam_type,
        info: doc
            .str_field(index_fields::SCAM_INFO)
            .unwrap_or_default()
            .to_owned(),
    })
}

/// Partial update setting or clearing the denormalized scam fields.
fn scam_update(identifier: &str, scam_info: Option<&ScamInfo>) -> BulkUpdate {
    let (type_value, info_value) = match scam_info {
        Some(info) => {
            let scam_type = match info.scam_type {
                ScamInfoType::Potential => "potential",
                ScamInfoType::Scam => "scam",
            };
            (Value::from(scam_type), Value::from(info.info.clone()))
        }
        None => (Value::Null, Value::Null),
    };
    BulkUpdate {
        identifier: identifier.to_owned(),
        fields: [
            (index_fields::SCAM_TYPE.to_owned(), type_value),
            (index_fields::SCAM_INFO.to_owned(), info_value),
        ]
        .into_iter()
        .collect(),
    }
}
