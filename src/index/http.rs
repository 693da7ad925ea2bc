use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;

use super::BulkUpdate;
use super::Document;
use super::IndexError;
use super::SearchIndex;
use super::SearchQuery;
use crate::config::IndexConfig;

/// Search index backed by an HTTP endpoint speaking the usual
/// `_search`/`_count`/`_bulk` dialect.
pub struct HttpSearchIndex {
    url: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct SearchResponse {
    hits: Hits,
}

#[derive(Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Deserialize)]
struct Hit {
    _source: Value,
}

#[derive(Deserialize)]
struct CountResponse {
    count: u64,
}

impl HttpSearchIndex {
    pub fn new(conf: &IndexConfig) -> Self {
        tracing::debug!("using search index: {}", conf.url);
        Self {
            url: conf.url.clone(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn search(&self, index: &str, query: &SearchQuery) -> Result<Vec<Document>, IndexError> {
        let url = format!("{}/{}/_search", self.url, index);
        let res = self
            .client
            .post(&url)
            .json(&query.to_body())
            .send()
            .await
            .map_err(|e| IndexError::Request(e.to_string()))?;
        let body: SearchResponse = res
            .json()
            .await
            .map_err(|e| IndexError::Decode(e.to_string()))?;
        Ok(body.hits.hits.into_iter().map(|h| Document(h._source)).collect())
    }

    async fn count(&self, index: &str, query: &SearchQuery) -> Result<u64, IndexError> {
        let url = format!("{}/{}/_count", self.url, index);
        let body = json!({ "query": query.to_body()["query"] });
        let res = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| IndexError::Request(e.to_string()))?;
        let body: CountResponse = res
            .json()
            .await
            .map_err(|e| IndexError::Decode(e.to_string()))?;
        Ok(body.count)
    }

    async fn update_bulk(
        &self,
        index: &str,
        id_field: &str,
        updates: Vec<BulkUpdate>,
    ) -> Result<(), IndexError> {
        if updates.is_empty() {
            return Ok(());
        }
        let url = format!("{}/{}/_bulk", self.url, index);
        let mut payload = String::new();
        for update in &updates {
            payload.push_str(&json!({ "update": { id_field: update.identifier } }).to_string());
            payload.push('\n');
            payload.push_str(&json!({ "doc": update.fields }).to_string());
            payload.push('\n');
        }
        self.client
            .post(&url)
            .header("content-type", "application/x-ndjson")
            .body(payload)
            .send()
            .await
            .map_err(|e| IndexError::Request(e.to_string()))?;
        Ok(())
    }
}
