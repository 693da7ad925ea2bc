#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the chain API gateway.
    pub url: String,
}

impl ApiConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Base URL of the chain's analytics/search index.
    pub url: String,
}

impl IndexConfig {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
        }
    }
}
