use serde::Serialize;
use serde_json::json;
use serde_json::Value;

/// A single must-clause of a search query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Condition {
    /// Exact field match.
    Match { field: String, value: Value },
    /// Field present.
    Exists { field: String },
    /// Field absent.
    NotExists { field: String },
    /// Match inside a nested object.
    Nested {
        path: String,
        field: String,
        value: Value,
    },
    /// Multi-value OR on one field.
    ShouldMatch { field: String, values: Vec<Value> },
    /// Inclusive timestamp lower bound.
    SinceTimestamp { value: i64 },
    /// Inclusive timestamp upper bound.
    UntilTimestamp { value: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Filterable, paginated search over an external index.
///
/// Built fluently the way call sites read: conditions first, pagination last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchQuery {
    pub musts: Vec<Condition>,
    pub from: usize,
    pub size: usize,
    pub sort: Option<(String, SortOrder)>,
}

impl SearchQuery {
    pub fn create() -> Self {
        Self {
            musts: vec![],
            from: 0,
            size: 25,
            sort: None,
        }
    }

    pub fn with_must_match<V: Into<Value>>(mut self, field: &str, value: V) -> Self {
        self.musts.push(Condition::Match {
            field: field.to_owned(),
            value: value.into(),
        });
        self
    }

    pub fn with_must_exist(mut self, field: &str) -> Self {
        self.musts.push(Condition::Exists {
            field: field.to_owned(),
        });
        self
    }

    pub fn with_must_not_exist(mut self, field: &str) -> Self {
        self.musts.push(Condition::NotExists {
            field: field.to_owned(),
        });
        self
    }

    pub fn with_must_nested<V: Into<Value>>(mut self, path: &str, field: &str, value: V) -> Self {
        self.musts.push(Condition::Nested {
            path: path.to_owned(),
            field: field.to_owned(),
            value: value.into(),
        });
        self
    }

    pub fn with_should_match<V: Into<Value>>(mut self, field: &str, values: Vec<V>) -> Self {
        self.musts.push(Condition::ShouldMatch {
            field: field.to_owned(),
            values: values.into_iter().map(|v| v.into()).collect(),
        });
        self
    }

    pub fn with_since_timestamp(mut self, timestamp: i64) -> Self {
        self.musts.push(Condition::SinceTimestamp { value: timestamp });
        self
    }

    pub fn with_until_timestamp(mut self, timestamp: i64) -> Self {
        self.musts.push(Condition::UntilTimestamp { value: timestamp });
        self
    }

    pub fn with_pagination(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    pub fn with_sort(mut self, field: &str, order: SortOrder) -> Self {
        self.sort = Some((field.to_owned(), order));
        self
    }

    /// Renders the query to the backend's JSON body.
    pub fn to_body(&self) -> Value {
        let musts: Vec<Value> = self.musts.iter().map(condition_to_body).collect();
        let mut body = json!({
            "from": self.from,
            "size": self.size,
            "query": { "bool": { "must": musts } },
        });
        if let Some((field, order)) = &self.sort {
            let dir = match order {
                SortOrder::Ascending => "asc",
                SortOrder::Descending => "desc",
            };
            body["sort"] = json!([{ field: { "order": dir } }]);
        }
        body
    }
}

fn condition_to_body(condition: &Condition) -> Value {
    match condition {
        Condition::Match { field, value } => json!({ "match": { field: value } }),
        Condition::Exists { field } => json!({ "exists": { "field": field } }),
        Condition::NotExists { field } => {
            json!({ "bool": { "must_not": [{ "exists": { "field": field } }] } })
        }
        Condition::Nested { path, field, value } => json!({
            "nested": { "path": path, "query": { "match": { field: value } } }
        }),
        Condition::ShouldMatch { field, values } => {
            let shoulds: Vec<Value> = values
                .iter()
                .map(|v| json!({ "match": { field: v } }))
                .collect();
            json!({ "bool": { "should": shoulds } })
        }
        Condition::SinceTimestamp { value } => json!({ "range": { "timestamp": { "gte": value } } }),
        Condition::UntilTimestamp { value } => json!({ "range": { "timestamp": { "lte": value } } }),
    }
}
