use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

use crate::cache::CacheError;
use crate::cache::CacheStore;
use crate::constants::cache_keys;
use crate::constants::ttl;
use crate::core::types::Token;
use crate::core::ChainApi;

const EGLD: &str = "EGLD";
const EGLD_DECIMALS: u32 = 18;

/// USD pricing reads, cache-first.
///
/// Price lookups ride `get_or_set`: volatile quotes under a short TTL, token
/// metadata under a long one.
pub struct UsdPriceService {
    cache: Arc<CacheStore>,
    api: Arc<dyn ChainApi>,
}

impl UsdPriceService {
    pub fn new(cache: Arc<CacheStore>, api: Arc<dyn ChainApi>) -> Self {
        Self { cache, api }
    }

    pub async fn egld_price(&self) -> Result<Decimal, CacheError> {
        let api = self.api.clone();
        self.cache
            .get_or_set(cache_keys::EGLD_TOKEN, ttl::EGLD_PRICE, || async move {
                api.egld_price()
                    .await
                    .map_err(|e| CacheError::Source(e.to_string()))
            })
            .await
    }

    pub async fn all_tokens(&self) -> Result<Vec<Token>, CacheError> {
        let api = self.api.clone();
        self.cache
            .get_or_set(cache_keys::ALL_TOKENS, ttl::ALL_TOKENS, || async move {
                api.all_tokens()
                    .await
                    .map_err(|e| CacheError::Source(e.to_string()))
            })
            .await
    }

    pub async fn token(&self, identifier: &str) -> Result<Option<Token>, CacheError> {
        if identifier == EGLD {
            return Ok(Some(Token {
                identifier: EGLD.to_owned(),
                name: EGLD.to_owned(),
                decimals: EGLD_DECIMALS,
                price_usd: Some(self.egld_price().await?),
            }));
        }

        let tokens = self.all_tokens().await?;
        if let Some(token) = tokens.into_iter().find(|t| t.identifier == identifier) {
            return Ok(Some(token));
        }

        let api = self.api.clone();
        let id = identifier.to_owned();
        let key = format!("{}{}", cache_keys::TOKEN_PREFIX, identifier);
        self.cache
            .get_or_set(&key, ttl::TOKEN, || async move {
                api.token(&id)
                    .await
                    .map_err(|e| CacheError::Source(e.to_string()))
            })
            .await
    }

    /// USD value of a raw on-chain `amount` of `token_id`, or `None` when no
    /// quote exists.
    pub async fn usd_amount(
        &self,
        token_id: &str,
        amount: &str,
    ) -> Result<Option<String>, CacheError> {
        if amount == "0" {
            return Ok(Some("0".to_owned()));
        }
        let token = match self.token(token_id).await? {
            Some(token) => token,
            None => return Ok(None),
        };
        let price = match token.price_usd {
            Some(price) => price,
            None => return Ok(None),
        };
        Ok(compute_usd_amount(amount, token.decimals, price))
    }
}

/// `amount / 10^decimals * price`, rendered with two decimal places.
fn compute_usd_amount(amount: &str, decimals: u32, price: Decimal) -> Option<String> {
    let mut value = Decimal::from_str(amount).ok()?;
    value.set_scale(value.scale() + decimals).ok()?;
    Some((value * price).round_dp(2).to_string())
}

#[cfg(test)]
mod tests {
    use super::compute_usd_amount;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    #[test]
    fn one_egld_at_40_usd() {
        let price = Decimal::from_str("40.25").unwrap();
        let usd = compute_usd_amount("1000000000000000000", 18, price);
        assert_eq!(usd, Some("40.25".to_string()));
    }

    #[test]
    fn fractional_amount() {
        let price = Decimal::from_str("2").unwrap();
        let usd = compute_usd_amount("500000", 6, price);
        assert_eq!(usd, Some("1.00".to_string()));
    }

    #[test]
    fn garbage_amount_is_none() {
        let price = Decimal::from_str("2").unwrap();
        assert_eq!(compute_usd_amount("not-a-number", 6, price), None);
    }
}
