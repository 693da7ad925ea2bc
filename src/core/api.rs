use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use super::types::Nft;
use super::types::NftIdentifier;
use super::types::Token;
use crate::config::ApiConfig;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("api request failed: {0}")]
    Request(String),
    #[error("api response decode failed: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ApiAbout {
    pub scam_engine_version: String,
}

/// Gateway to the chain API, the upstream truth for NFT and token data.
#[async_trait]
pub trait ChainApi: Send + Sync {
    async fn about(&self) -> Result<ApiAbout, ApiError>;

    /// Single NFT with scam info, `None` when unknown upstream.
    async fn nft(&self, identifier: &str) -> Result<Option<Nft>, ApiError>;

    /// Bulk NFT fetch. Unknown identifiers are simply absent from the result.
    async fn nfts_by_identifiers(&self, identifiers: &[NftIdentifier])
        -> Result<Vec<Nft>, ApiError>;

    /// All NFTs of a collection, attributes included.
    async fn collection_nfts(&self, collection: &str) -> Result<Vec<Nft>, ApiError>;

    async fn collection_nft_count(&self, collection: &str) -> Result<u64, ApiError>;

    async fn all_tokens(&self) -> Result<Vec<Token>, ApiError>;

    async fn token(&self, identifier: &str) -> Result<Option<Token>, ApiError>;

    async fn egld_price(&self) -> Result<Decimal, ApiError>;
}

/// Thin HTTP client for the chain API.
pub struct HttpChainApi {
    url: String,
    client: reqwest::Client,
}

/// NFTs are fetched in pages of this size.
const PAGE_SIZE: usize = 100;

impl HttpChainApi {
    pub fn new(conf: &ApiConfig) -> Self {
        tracing::debug!("using chain api: {}", conf.url);
        Self {
            url: conf.url.clone(),
            client: reqwest::Client::new(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.url, path);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Request(e.to_string()))?;
        if res.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(path.to_owned()));
        }
        res.json().await.map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ChainApi for HttpChainApi {
    async fn about(&self) -> Result<ApiAbout, ApiError> {
        #[derive(Deserialize)]
        struct About {
            #[serde(rename = "scamEngineVersion")]
            scam_engine_version: String,
        }
        let about: About = self.get_json("about").await?;
        Ok(ApiAbout {
            scam_engine_version: about.scam_engine_version,
        })
    }

    async fn nft(&self, identifier: &str) -> Result<Option<Nft>, ApiError> {
        match self.get_json(&format!("nfts/{}", identifier)).await {
            Ok(nft) => Ok(Some(nft)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn nfts_by_identifiers(
        &self,
        identifiers: &[NftIdentifier],
    ) -> Result<Vec<Nft>, ApiError> {
        if identifiers.is_empty() {
            return Ok(vec![]);
        }
        self.get_json(&format!(
            "nfts?identifiers={}&withOwner=true",
            identifiers.join(",")
        ))
        .await
    }

    async fn collection_nfts(&self, collection: &str) -> Result<Vec<Nft>, ApiError> {
        let mut nfts: Vec<Nft> = vec![];
        loop {
            let page: Vec<Nft> = self
                .get_json(&format!(
                    "collections/{}/nfts?from={}&size={}&withOwner=true",
                    collection,
                    nfts.len(),
                    PAGE_SIZE
                ))
                .await?;
            let exhausted = page.len() < PAGE_SIZE;
            nfts.extend(page);
            if exhausted {
                return Ok(nfts);
            }
        }
    }

    async fn collection_nft_count(&self, collection: &str) -> Result<u64, ApiError> {
        self.get_json(&format!("collections/{}/nfts/count", collection))
            .await
    }

    async fn all_tokens(&self) -> Result<Vec<Token>, ApiError> {
        self.get_json("tokens").await
    }

    async fn token(&self, identifier: &str) -> Result<Option<Token>, ApiError> {
        match self.get_json(&format!("tokens/{}", identifier)).await {
            Ok(token) => Ok(Some(token)),
            Err(ApiError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn egld_price(&self) -> Result<Decimal, ApiError> {
        #[derive(Deserialize)]
        struct Economics {
            price: Decimal,
        }
        let economics: Economics = self.get_json("economics").await?;
        Ok(economics.price)
    }
}
