use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

/// Builds a cache key as `<namespace>_<part>_<part>...`.
pub fn cache_key(namespace: &str, parts: &[&str]) -> String {
    let mut key = String::from(namespace);
    for part in parts {
        key.push('_');
        key.push_str(part);
    }
    key
}

/// Builds a cache key from a namespace and a stable hash of `params`.
///
/// The hash goes over the canonical JSON rendering of `params` (object keys
/// sorted), so structurally identical filter objects collide to the same key
/// regardless of field order.
pub fn hashed_cache_key<P: Serialize>(namespace: &str, params: &P) -> String {
    // serde_json maps are ordered by key, so Value -> String is canonical.
    let canonical = serde_json::to_value(params)
        .map(|v| v.to_string())
        .unwrap_or_default();
    let digest = Sha256::digest(canonical.as_bytes());
    format!("{}_{}", namespace, base16::encode_lower(&digest[..8]))
}

#[cfg(test)]
mod tests {
    use super::cache_key;
    use super::hashed_cache_key;
    use pretty_assertions::assert_eq;
    use serde::Serialize;

    #[test]
    fn key_from_parts() {
        assert_eq!(cache_key("offers_owner", &["erd1abc"]), "offers_owner_erd1abc");
        assert_eq!(cache_key("tokens", &[]), "tokens");
    }

    #[derive(Serialize)]
    struct FiltersA {
        collection: String,
        status: String,
    }

    #[derive(Serialize)]
    struct FiltersB {
        status: String,
        collection: String,
    }

    #[test]
    fn hash_ignores_field_order() {
        let a = FiltersA {
            collection: "CHESS-1234".to_string(),
            status: "active".to_string(),
        };
        let b = FiltersB {
            status: "active".to_string(),
            collection: "CHESS-1234".to_string(),
        };
        assert_eq!(hashed_cache_key("offers", &a), hashed_cache_key("offers", &b));
    }

    #[test]
    fn hash_differs_on_content() {
        let a = FiltersA {
            collection: "CHESS-1234".to_string(),
            status: "active".to_string(),
        };
        let b = FiltersA {
            collection: "CHESS-1234".to_string(),
            status: "closed".to_string(),
        };
        assert_ne!(hashed_cache_key("offers", &a), hashed_cache_key("offers", &b));
    }
}
