//! Scripted in-memory venue for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::domain::Asset;
use crate::error::{Result, VenueError};
use crate::venue::{MarketCatalog, MarketDataGateway, OrderBook, PairListing, Ticker,
    WithdrawalFee};

/// A gateway serving scripted data, with per-call failure injection and
/// call counters. Quotes can be mutated mid-test through shared references.
pub struct ScriptedVenue {
    name: String,
    pairs: RwLock<Vec<PairListing>>,
    extra_assets: RwLock<Vec<Asset>>,
    tickers: RwLock<Vec<Ticker>>,
    balances: RwLock<HashMap<Asset, Decimal>>,
    withdrawal_fees: RwLock<HashMap<Asset, WithdrawalFee>>,
    fail_markets: AtomicBool,
    fail_tickers: AtomicBool,
    markets_calls: AtomicUsize,
    ticker_calls: AtomicUsize,
    withdrawal_calls: AtomicUsize,
}

impl ScriptedVenue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pairs: RwLock::new(Vec::new()),
            extra_assets: RwLock::new(Vec::new()),
            tickers: RwLock::new(Vec::new()),
            balances: RwLock::new(HashMap::new()),
            withdrawal_fees: RwLock::new(HashMap::new()),
            fail_markets: AtomicBool::new(false),
            fail_tickers: AtomicBool::new(false),
            markets_calls: AtomicUsize::new(0),
            ticker_calls: AtomicUsize::new(0),
            withdrawal_calls: AtomicUsize::new(0),
        }
    }

    /// List a pair and publish a ticker for it.
    pub fn with_market(
        self,
        base: &str,
        quote: &str,
        bid: Decimal,
        ask: Decimal,
        volume: Decimal,
    ) -> Self {
        self.pairs
            .write()
            .push(PairListing::new(Asset::new(base), Asset::new(quote)));
        self.tickers.write().push(Ticker {
            base: Asset::new(base),
            quote: Asset::new(quote),
            bid: Some(bid),
            ask: Some(ask),
            base_volume: Some(volume),
        });
        self
    }

    /// List an asset that has no pair on this venue.
    pub fn with_asset(self, symbol: &str) -> Self {
        self.extra_assets.write().push(Asset::new(symbol));
        self
    }

    pub fn with_balance(self, symbol: &str, amount: Decimal) -> Self {
        self.balances.write().insert(Asset::new(symbol), amount);
        self
    }

    pub fn with_withdrawal_fee(self, symbol: &str, fixed: Decimal, fiat: Decimal) -> Self {
        self.withdrawal_fees
            .write()
            .insert(Asset::new(symbol), WithdrawalFee { fixed, fiat });
        self
    }

    /// Make `load_markets` fail, simulating a venue outage at startup.
    pub fn failing_markets(self) -> Self {
        self.fail_markets.store(true, Ordering::SeqCst);
        self
    }

    /// Make `fetch_tickers` fail, simulating a mid-run outage.
    pub fn failing_tickers(self) -> Self {
        self.fail_tickers.store(true, Ordering::SeqCst);
        self
    }

    /// Replace the quote for one pair mid-test.
    pub fn set_quote(&self, base: &str, quote: &str, bid: Decimal, ask: Decimal) {
        let base = Asset::new(base);
        let quote = Asset::new(quote);
        for ticker in self.tickers.write().iter_mut() {
            if ticker.base == base && ticker.quote == quote {
                ticker.bid = Some(bid);
                ticker.ask = Some(ask);
            }
        }
    }

    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    pub fn withdrawal_calls(&self) -> usize {
        self.withdrawal_calls.load(Ordering::SeqCst)
    }

    pub fn markets_calls(&self) -> usize {
        self.markets_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataGateway for ScriptedVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn load_markets(&self) -> Result<MarketCatalog> {
        self.markets_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_markets.load(Ordering::SeqCst) {
            return Err(VenueError::Request("scripted outage".into()).into());
        }

        let pairs = self.pairs.read().clone();
        let mut assets: Vec<Asset> = pairs
            .iter()
            .flat_map(|p| [p.base.clone(), p.quote.clone()])
            .chain(self.extra_assets.read().iter().cloned())
            .collect();
        assets.sort();
        assets.dedup();

        Ok(MarketCatalog { pairs, assets })
    }

    async fn fetch_tickers(&self) -> Result<Vec<Ticker>> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_tickers.load(Ordering::SeqCst) {
            return Err(VenueError::Request("scripted outage".into()).into());
        }
        Ok(self.tickers.read().clone())
    }

    async fn fetch_order_book(
        &self,
        _base: &Asset,
        _quote: &Asset,
        _depth: usize,
    ) -> Result<OrderBook> {
        Ok(OrderBook::default())
    }

    async fn fetch_free_balances(&self) -> Result<HashMap<Asset, Decimal>> {
        Ok(self.balances.read().clone())
    }

    async fn withdrawal_fees(&self) -> Result<HashMap<Asset, WithdrawalFee>> {
        self.withdrawal_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.withdrawal_fees.read().clone())
    }
}
