mod http;
mod query;
mod scroll;

pub use http::HttpSearchIndex;
pub use query::Condition;
pub use query::SearchQuery;
pub use query::SortOrder;
pub use scroll::ScrollCursor;
pub use scroll::ScrollState;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index request failed: {0}")]
    Request(String),
    #[error("index response decode failed: {0}")]
    Decode(String),
}

/// A raw JSON document from the search index.
///
/// Documents carry at least an identifier field and a timestamp; everything
/// else is accessed ad hoc at the decode boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document(pub Value);

impl Document {
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.as_str())
    }

    pub fn i64_field(&self, name: &str) -> Option<i64> {
        self.0.get(name).and_then(|v| v.as_i64())
    }

    pub fn bool_field(&self, name: &str) -> Option<bool> {
        self.0.get(name).and_then(|v| v.as_bool())
    }

    pub fn timestamp(&self) -> Option<i64> {
        self.i64_field("timestamp")
    }
}

/// One partial-update instruction for `update_bulk`.
///
/// `Value::Null` fields are removed from the document.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkUpdate {
    pub identifier: String,
    pub fields: serde_json::Map<String, Value>,
}

/// Paginated document search over the chain's analytics index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    async fn search(&self, index: &str, query: &SearchQuery) -> Result<Vec<Document>, IndexError>;

    async fn count(&self, index: &str, query: &SearchQuery) -> Result<u64, IndexError>;

    /// Applies partial updates keyed by `id_field`.
    async fn update_bulk(
        &self,
        index: &str,
        id_field: &str,
        updates: Vec<BulkUpdate>,
    ) -> Result<(), IndexError>;
}
