//! Deterministic in-memory venue.
//!
//! Serves static quotes, balances, and withdrawal fees from configuration.
//! Used for dry runs of the detection engine without live venue access.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::config::SimVenueConfig;
use crate::domain::Asset;
use crate::error::Result;

use super::{MarketCatalog, MarketDataGateway, OrderBook, PairListing, PriceLevel, Ticker,
    WithdrawalFee};

/// A simulated venue backed by a static configuration snapshot.
pub struct SimVenue {
    name: String,
    tickers: Vec<Ticker>,
    balances: HashMap<Asset, Decimal>,
    withdrawal_fees: HashMap<Asset, WithdrawalFee>,
}

impl SimVenue {
    pub fn from_config(name: impl Into<String>, config: &SimVenueConfig) -> Self {
        let tickers = config
            .markets
            .iter()
            .map(|m| Ticker {
                base: Asset::new(m.base.as_str()),
                quote: Asset::new(m.quote.as_str()),
                bid: Some(m.bid),
                ask: Some(m.ask),
                base_volume: Some(m.volume),
            })
            .collect();

        let balances = config
            .balances
            .iter()
            .map(|(asset, amount)| (Asset::new(asset.as_str()), *amount))
            .collect();

        let withdrawal_fees = config
            .withdrawal_fees
            .iter()
            .map(|(asset, fee)| {
                (
                    Asset::new(asset.as_str()),
                    WithdrawalFee {
                        fixed: fee.fixed,
                        fiat: fee.fiat,
                    },
                )
            })
            .collect();

        Self {
            name: name.into(),
            tickers,
            balances,
            withdrawal_fees,
        }
    }
}

#[async_trait]
impl MarketDataGateway for SimVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_markets(&self) -> Result<MarketCatalog> {
        let pairs: Vec<PairListing> = self
            .tickers
            .iter()
            .map(|t| PairListing::new(t.base.clone(), t.quote.clone()))
            .collect();

        // The asset list covers everything the venue knows about, whether
        // or not a pair is currently listed for it.
        let mut assets: Vec<Asset> = pairs
            .iter()
            .flat_map(|p| [p.base.clone(), p.quote.clone()])
            .chain(self.balances.keys().cloned())
            .chain(self.withdrawal_fees.keys().cloned())
            .collect();
        assets.sort();
        assets.dedup();

        Ok(MarketCatalog { pairs, assets })
    }

    async fn fetch_tickers(&self) -> Result<Vec<Ticker>> {
        Ok(self.tickers.clone())
    }

    async fn fetch_order_book(
        &self,
        base: &Asset,
        quote: &Asset,
        depth: usize,
    ) -> Result<OrderBook> {
        let Some(ticker) = self
            .tickers
            .iter()
            .find(|t| &t.base == base && &t.quote == quote)
        else {
            return Ok(OrderBook::default());
        };

        let level_size = ticker
            .base_volume
            .map(|v| v / Decimal::from(depth.max(1) as u64))
            .unwrap_or_default();

        let side = |price: Option<Decimal>| {
            price
                .map(|p| {
                    (0..depth)
                        .map(|_| PriceLevel {
                            price: p,
                            size: level_size,
                        })
                        .collect()
                })
                .unwrap_or_default()
        };

        Ok(OrderBook {
            bids: side(ticker.bid),
            asks: side(ticker.ask),
        })
    }

    async fn fetch_free_balances(&self) -> Result<HashMap<Asset, Decimal>> {
        Ok(self.balances.clone())
    }

    async fn withdrawal_fees(&self) -> Result<HashMap<Asset, WithdrawalFee>> {
        Ok(self.withdrawal_fees.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimMarketConfig, SimWithdrawalFeeConfig};
    use rust_decimal_macros::dec;

    fn config() -> SimVenueConfig {
        SimVenueConfig {
            markets: vec![SimMarketConfig {
                base: "BTC".into(),
                quote: "USDT".into(),
                bid: dec!(60000),
                ask: dec!(60050),
                volume: dec!(100),
            }],
            balances: [("BTC".to_string(), dec!(0.5))].into_iter().collect(),
            withdrawal_fees: [(
                "BTC".to_string(),
                SimWithdrawalFeeConfig {
                    fixed: dec!(0.0005),
                    fiat: dec!(30),
                },
            )]
            .into_iter()
            .collect(),
        }
    }

    #[tokio::test]
    async fn catalog_includes_balance_only_assets() {
        let venue = SimVenue::from_config("sim", &config());
        let catalog = venue.load_markets().await.unwrap();

        assert_eq!(catalog.pairs.len(), 1);
        assert!(catalog.assets.contains(&Asset::new("BTC")));
        assert!(catalog.assets.contains(&Asset::new("USDT")));
    }

    #[tokio::test]
    async fn tickers_carry_configured_quotes() {
        let venue = SimVenue::from_config("sim", &config());
        let tickers = venue.fetch_tickers().await.unwrap();

        assert_eq!(tickers.len(), 1);
        assert_eq!(tickers[0].bid, Some(dec!(60000)));
        assert_eq!(tickers[0].ask, Some(dec!(60050)));
    }

    #[tokio::test]
    async fn order_book_has_requested_depth() {
        let venue = SimVenue::from_config("sim", &config());
        let book = venue
            .fetch_order_book(&Asset::new("BTC"), &Asset::new("USDT"), 5)
            .await
            .unwrap();

        assert_eq!(book.bids.len(), 5);
        assert_eq!(book.asks.len(), 5);
    }

    #[tokio::test]
    async fn unknown_pair_yields_empty_book() {
        let venue = SimVenue::from_config("sim", &config());
        let book = venue
            .fetch_order_book(&Asset::new("ETH"), &Asset::new("USDT"), 5)
            .await
            .unwrap();

        assert!(book.bids.is_empty());
        assert!(book.asks.is_empty());
    }
}
