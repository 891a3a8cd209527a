//! Fiat reference price service.
//!
//! Reference prices make balances and traded volumes comparable across
//! venues. The service degrades to an empty map when no credential is
//! configured or a fetch fails; callers treat missing prices as "this
//! asset cannot be compared" rather than an error.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::config::PricingConfig;
use crate::domain::Asset;
use crate::error::Result;

/// Environment variable holding the reference price API credential.
pub const API_KEY_ENV: &str = "CMC_API_KEY";

/// A fiat reference price for one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferencePrice {
    pub price: Decimal,
    /// Market-cap rank reported by the service, when available.
    pub rank: Option<u32>,
}

/// Source of fiat reference prices for a set of asset symbols.
#[async_trait]
pub trait ReferencePriceSource: Send + Sync {
    /// Source name for logging/config.
    fn name(&self) -> &'static str;

    /// Fetch reference prices for the given symbols.
    ///
    /// Never fails: a missing credential or a failed call returns an empty
    /// map, and symbols the service cannot price are simply absent.
    async fn prices(&self, symbols: &[Asset]) -> HashMap<Asset, ReferencePrice>;
}

/// Build the configured price source. The API credential comes from the
/// `CMC_API_KEY` environment variable, never from the config file.
pub fn build_price_source(config: &PricingConfig) -> Result<Arc<dyn ReferencePriceSource>> {
    match config {
        PricingConfig::CoinMarketCap { endpoint, convert } => {
            let api_key = std::env::var(API_KEY_ENV).ok();
            if api_key.is_none() {
                warn!(
                    env = API_KEY_ENV,
                    "No reference price credential; price lookups will return nothing"
                );
            }
            Ok(Arc::new(CoinMarketCapClient::new(
                endpoint, convert, api_key,
            )?))
        }
        PricingConfig::Static { prices } => {
            let table = prices
                .iter()
                .map(|(symbol, price)| {
                    (
                        Asset::new(symbol.as_str()),
                        ReferencePrice {
                            price: *price,
                            rank: None,
                        },
                    )
                })
                .collect();
            Ok(Arc::new(StaticPrices::new(table)))
        }
    }
}

/// CoinMarketCap-compatible quote client.
pub struct CoinMarketCapClient {
    http: Client,
    quotes_url: Url,
    convert: String,
    api_key: Option<String>,
}

impl CoinMarketCapClient {
    pub fn new(
        endpoint: &str,
        convert: impl Into<String>,
        api_key: Option<String>,
    ) -> Result<Self> {
        let base = Url::parse(endpoint)?;
        let quotes_url = base.join("v2/cryptocurrency/quotes/latest")?;
        Ok(Self {
            http: Client::new(),
            quotes_url,
            convert: convert.into().to_uppercase(),
            api_key,
        })
    }

    async fn request(&self, key: &str, symbols: &[Asset]) -> Result<QuotesResponse> {
        let joined = symbols
            .iter()
            .map(Asset::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .http
            .get(self.quotes_url.clone())
            .header("X-CMC_PRO_API_KEY", key)
            .header("Accept", "application/json")
            .query(&[("symbol", joined.as_str()), ("convert", &self.convert)])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ReferencePriceSource for CoinMarketCapClient {
    fn name(&self) -> &'static str {
        "coinmarketcap"
    }

    async fn prices(&self, symbols: &[Asset]) -> HashMap<Asset, ReferencePrice> {
        let Some(key) = self.api_key.as_deref() else {
            return HashMap::new();
        };

        // The quote API rejects requests containing non-symbol input, so
        // filter to plausible ticker symbols before building the query.
        let symbols: Vec<Asset> = symbols
            .iter()
            .filter(|s| {
                let s = s.as_str();
                !s.is_empty() && s.len() < 20 && s.chars().all(|c| c.is_ascii_alphabetic())
            })
            .cloned()
            .collect();

        if symbols.is_empty() {
            return HashMap::new();
        }

        match self.request(key, &symbols).await {
            Ok(response) => {
                let prices = response.into_prices(&self.convert);
                debug!(
                    requested = symbols.len(),
                    priced = prices.len(),
                    "Reference prices fetched"
                );
                prices
            }
            Err(e) => {
                warn!(error = %e, "Reference price fetch failed");
                HashMap::new()
            }
        }
    }
}

/// Fixed price table; used for dry runs and as the `static` pricing kind.
#[derive(Debug, Default, Clone)]
pub struct StaticPrices {
    table: HashMap<Asset, ReferencePrice>,
}

impl StaticPrices {
    pub fn new(table: HashMap<Asset, ReferencePrice>) -> Self {
        Self { table }
    }

    /// Convenience constructor from `(symbol, price)` pairs.
    pub fn from_prices<I, S>(prices: I) -> Self
    where
        I: IntoIterator<Item = (S, Decimal)>,
        S: Into<String>,
    {
        Self::new(
            prices
                .into_iter()
                .map(|(symbol, price)| (Asset::new(symbol), ReferencePrice { price, rank: None }))
                .collect(),
        )
    }
}

#[async_trait]
impl ReferencePriceSource for StaticPrices {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn prices(&self, symbols: &[Asset]) -> HashMap<Asset, ReferencePrice> {
        symbols
            .iter()
            .filter_map(|s| self.table.get(s).map(|p| (s.clone(), *p)))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct QuotesResponse {
    #[serde(default)]
    data: HashMap<String, EntryOrList>,
}

// The v2 quote endpoint returns a list per symbol; older deployments return
// a single object. Accept both.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EntryOrList {
    Many(Vec<QuoteEntry>),
    One(QuoteEntry),
}

#[derive(Debug, Deserialize)]
struct QuoteEntry {
    #[serde(default)]
    cmc_rank: Option<u32>,
    #[serde(default)]
    quote: HashMap<String, QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    price: Option<Decimal>,
}

impl QuotesResponse {
    fn into_prices(self, convert: &str) -> HashMap<Asset, ReferencePrice> {
        let mut prices = HashMap::new();
        for (symbol, entry) in self.data {
            let entry = match entry {
                EntryOrList::One(entry) => entry,
                EntryOrList::Many(mut list) => {
                    if list.is_empty() {
                        continue;
                    }
                    list.swap_remove(0)
                }
            };

            let Some(price) = entry.quote.get(convert).and_then(|q| q.price) else {
                continue;
            };

            prices.insert(
                Asset::new(symbol),
                ReferencePrice {
                    price,
                    rank: entry.cmc_rank,
                },
            );
        }
        prices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn static_prices_returns_requested_subset() {
        let source = StaticPrices::from_prices([("BTC", dec!(60000)), ("ETH", dec!(3000))]);

        let prices = source
            .prices(&[Asset::new("BTC"), Asset::new("DOGE")])
            .await;

        assert_eq!(prices.len(), 1);
        assert_eq!(prices[&Asset::new("BTC")].price, dec!(60000));
    }

    #[tokio::test]
    async fn missing_credential_degrades_to_empty() {
        let client = CoinMarketCapClient::new("https://example.com", "USD", None).unwrap();
        let prices = client.prices(&[Asset::new("BTC")]).await;
        assert!(prices.is_empty());
    }

    #[test]
    fn response_parsing_handles_list_and_object_entries() {
        let raw = r#"{
            "data": {
                "BTC": [{"cmc_rank": 1, "quote": {"USD": {"price": 60000.5}}}],
                "ETH": {"cmc_rank": 2, "quote": {"USD": {"price": 3000.0}}},
                "XYZ": [{"quote": {"USD": {"price": null}}}]
            }
        }"#;

        let response: QuotesResponse = serde_json::from_str(raw).unwrap();
        let prices = response.into_prices("USD");

        assert_eq!(prices.len(), 2);
        assert_eq!(prices[&Asset::new("BTC")].rank, Some(1));
        assert_eq!(prices[&Asset::new("ETH")].price, dec!(3000.0));
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        assert!(CoinMarketCapClient::new("not a url", "USD", None).is_err());
    }
}
