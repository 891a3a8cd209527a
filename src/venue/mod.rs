//! Venue gateway abstraction.
//!
//! These traits and types define the interface any market-data gateway must
//! provide. Venue-specific quirks (authentication, pagination, symbol
//! normalization) belong to gateway implementations, never to the model.

mod factory;
pub mod sim;

pub use factory::build_gateways;
pub use sim::SimVenue;

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::Asset;
use crate::error::Result;

/// A listed trading pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairListing {
    pub base: Asset,
    pub quote: Asset,
}

impl PairListing {
    pub fn new(base: Asset, quote: Asset) -> Self {
        Self { base, quote }
    }
}

/// Everything a venue lists: tradable pairs plus its full asset list.
#[derive(Debug, Clone, Default)]
pub struct MarketCatalog {
    pub pairs: Vec<PairListing>,
    pub assets: Vec<Asset>,
}

/// A current market quote for one pair.
///
/// Missing or zero bid/ask means the pair cannot be priced this cycle.
#[derive(Debug, Clone)]
pub struct Ticker {
    pub base: Asset,
    pub quote: Asset,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    /// 24h traded volume in base units.
    pub base_volume: Option<Decimal>,
}

/// One price level of an order book side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Order book depth for one pair, best levels first.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
}

/// A withdrawal fee quote: fixed fee in asset units plus its fiat value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalFee {
    pub fixed: Decimal,
    pub fiat: Decimal,
}

/// Market-data gateway for a single venue.
///
/// All calls are fallible and network-bound; callers bound them with
/// request timeouts and treat failures as that venue contributing nothing
/// for the current operation.
#[async_trait]
pub trait MarketDataGateway: Send + Sync {
    /// Venue name for logging/debugging.
    fn name(&self) -> &str;

    /// List tradable pairs and the venue's asset list.
    async fn load_markets(&self) -> Result<MarketCatalog>;

    /// Fetch current bid/ask/volume for all listed pairs in one call.
    async fn fetch_tickers(&self) -> Result<Vec<Ticker>>;

    /// Fetch order book depth to `depth` levels for one pair.
    async fn fetch_order_book(&self, base: &Asset, quote: &Asset, depth: usize)
        -> Result<OrderBook>;

    /// Fetch free balances per asset.
    async fn fetch_free_balances(&self) -> Result<HashMap<Asset, Decimal>>;

    /// Withdrawal fee quotes per asset. Assets without an entry cannot be
    /// withdrawn from this venue.
    async fn withdrawal_fees(&self) -> Result<HashMap<Asset, WithdrawalFee>>;
}
