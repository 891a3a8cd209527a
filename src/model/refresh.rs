//! Per-iteration market data refresh.
//!
//! Each refresh fans out across venues with a bounded worker count and a
//! per-call timeout. A failed or timed-out call degrades that venue's
//! contribution to zero for the current iteration; it never aborts the
//! detection loop.

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::{Asset, EdgeKind, Node, VenueId};
use crate::fetch::{fan_out, fan_out_cancellable};
use crate::venue::{MarketCatalog, Ticker};

use super::{NodeBalance, OpportunityModel, VOLUME_SAFETY_FRACTION};

impl OpportunityModel {
    /// Load every venue's market catalog, skipping venues that fail.
    pub(crate) async fn fetch_catalogs(&self) -> Vec<(VenueId, Option<MarketCatalog>)> {
        let venues = self.venues.clone();
        let this = &*self;
        let results = fan_out(
            venues,
            this.settings.fetch_workers,
            |(venue, gateway)| async move {
                let result = this.bounded(gateway.load_markets()).await;
                (venue, result)
            },
        )
        .await;

        results
            .into_iter()
            .map(|(venue, result)| match result {
                Ok(catalog) => (venue, Some(catalog)),
                Err(e) => {
                    warn!(venue = %venue, error = %e, "Skipping venue: market listing failed");
                    (venue, None)
                }
            })
            .collect()
    }

    /// Re-fetch withdrawal fee quotes and index them by source node.
    pub(crate) async fn refresh_withdrawal_quotes(&mut self, cancel: &CancellationToken) {
        let venues = self.venues.clone();
        let this = &*self;
        let results = fan_out_cancellable(
            venues,
            this.settings.fetch_workers,
            cancel,
            |(venue, gateway)| async move {
                let result = this.bounded(gateway.withdrawal_fees()).await;
                (venue, result)
            },
        )
        .await;

        let mut quotes = HashMap::new();
        for (venue, result) in results.into_iter().flatten() {
            match result {
                Ok(fees) => {
                    for (asset, fee) in fees {
                        let Some(index) = self.node_index(&venue, &asset) else {
                            continue;
                        };
                        if let Some(fiat) = fee.fiat.to_f64() {
                            quotes.insert(index, fiat);
                        }
                    }
                }
                Err(e) => {
                    warn!(venue = %venue, error = %e, "Withdrawal fee refresh failed");
                }
            }
        }
        self.withdrawal_fiat_fees = quotes;
    }

    /// Re-fetch fiat reference prices for the universe's assets.
    ///
    /// An empty result keeps the previous table: stale prices beat pricing
    /// every node out of the graph for the rest of the run.
    pub(crate) async fn refresh_reference_prices(&mut self) {
        let symbols = self.universe.assets();
        let fresh = self.prices.prices(&symbols).await;
        if fresh.is_empty() {
            warn!("Reference price refresh returned nothing; keeping previous prices");
            return;
        }
        self.ref_prices = fresh;
    }

    /// Rebuild the per-node balance table, either from the simulated
    /// balance override or from live venue balances.
    pub(crate) async fn refresh_balances(&mut self, cancel: &CancellationToken) {
        let mut balances: HashMap<usize, NodeBalance> = HashMap::new();

        if let Some(simulated) = self.settings.params.simulated_balances.clone() {
            for (venue, assets) in &simulated {
                let venue = VenueId::new(venue.clone());
                for (symbol, amount) in assets {
                    let asset = Asset::new(symbol.clone());
                    self.insert_balance(&mut balances, &venue, &asset, amount.to_f64());
                }
            }
        } else {
            let venues = self.venues.clone();
            let this = &*self;
            let results = fan_out_cancellable(
                venues,
                this.settings.fetch_workers,
                cancel,
                |(venue, gateway)| async move {
                    let result = this.bounded(gateway.fetch_free_balances()).await;
                    (venue, result)
                },
            )
            .await;

            for (venue, result) in results.into_iter().flatten() {
                match result {
                    Ok(fetched) => {
                        for (asset, amount) in fetched {
                            self.insert_balance(&mut balances, &venue, &asset, amount.to_f64());
                        }
                    }
                    Err(e) => {
                        warn!(venue = %venue, error = %e, "Balance refresh failed");
                    }
                }
            }
        }

        self.balances = balances;
    }

    fn insert_balance(
        &self,
        balances: &mut HashMap<usize, NodeBalance>,
        venue: &VenueId,
        asset: &Asset,
        amount: Option<f64>,
    ) {
        let Some(index) = self.node_index(venue, asset) else {
            return;
        };
        let Some(amount) = amount else {
            return;
        };
        let Some(price) = self.fiat_price(asset) else {
            return;
        };
        balances.insert(
            index,
            NodeBalance {
                amount,
                fiat: amount * price,
            },
        );
    }

    /// Fetch current tickers from every venue concurrently.
    pub(crate) async fn fetch_all_tickers(
        &self,
        cancel: &CancellationToken,
    ) -> Vec<(VenueId, Vec<Ticker>)> {
        let venues = self.venues.clone();
        let this = &*self;
        let results = fan_out_cancellable(
            venues,
            this.settings.fetch_workers,
            cancel,
            |(venue, gateway)| async move {
                let result = this.bounded(gateway.fetch_tickers()).await;
                (venue, result)
            },
        )
        .await;

        let mut tickers = Vec::new();
        for (venue, result) in results.into_iter().flatten() {
            match result {
                Ok(list) => tickers.push((venue, list)),
                Err(e) => {
                    warn!(venue = %venue, error = %e, "Ticker refresh failed");
                }
            }
        }
        tickers
    }

    /// Rebuild the conversion rate matrix.
    ///
    /// For a listed pair base/quote: selling base hits the bid, so the
    /// forward rate is `bid` and the reverse rate is `1 / ask`. Pairs
    /// missing either side of the quote stay at zero (infeasible this
    /// iteration). Transfer edges convert 1:1 when the source node has a
    /// withdrawal quote.
    pub(crate) fn refresh_rates(&mut self, tickers: &[(VenueId, Vec<Ticker>)]) {
        self.rates.reset();

        for (venue, list) in tickers {
            for ticker in list {
                let (Some(i), Some(j)) = (
                    self.node_index(venue, &ticker.base),
                    self.node_index(venue, &ticker.quote),
                ) else {
                    continue;
                };
                let (Some(bid), Some(ask)) = (
                    ticker.bid.and_then(|d| d.to_f64()),
                    ticker.ask.and_then(|d| d.to_f64()),
                ) else {
                    continue;
                };
                if bid > 0.0 && ask > 0.0 {
                    self.rates.set(i, j, bid);
                    self.rates.set(j, i, 1.0 / ask);
                }
            }
        }

        for idx in 0..self.edges.len() {
            let edge = self.edges[idx];
            if edge.kind == EdgeKind::Transfer
                && self.withdrawal_fiat_fees.contains_key(&edge.from)
            {
                self.rates.set(edge.from, edge.to, 1.0);
            }
        }
    }

    /// Rebuild the liquidity matrix: the fiat notional each edge can
    /// safely carry this iteration.
    pub(crate) fn refresh_liquidity(&mut self, tickers: &[(VenueId, Vec<Ticker>)]) {
        self.liquidity.reset();

        for (venue, list) in tickers {
            for ticker in list {
                let (Some(i), Some(j)) = (
                    self.node_index(venue, &ticker.base),
                    self.node_index(venue, &ticker.quote),
                ) else {
                    continue;
                };
                let Some(volume) = ticker.base_volume.and_then(|d| d.to_f64()) else {
                    continue;
                };
                let Some(price) = self.fiat_price(&ticker.base) else {
                    continue;
                };
                let fiat_volume = volume * price * VOLUME_SAFETY_FRACTION;
                self.liquidity.set(i, j, fiat_volume);
                self.liquidity.set(j, i, fiat_volume);
            }
        }

        // A transfer is bounded by what the destination side could absorb;
        // the withdrawal fee rides on top of the transferred amount.
        let consider_balance = self.settings.params.consider_inter_venue_balance;
        for idx in 0..self.edges.len() {
            let edge = self.edges[idx];
            if edge.kind != EdgeKind::Transfer {
                continue;
            }
            let capacity = if consider_balance {
                let destination = self.balances.get(&edge.to).map_or(0.0, |b| b.fiat);
                let fee = self
                    .withdrawal_fiat_fees
                    .get(&edge.from)
                    .copied()
                    .unwrap_or(0.0);
                destination + fee
            } else {
                f64::INFINITY
            };
            self.liquidity.set(edge.from, edge.to, capacity);
        }
    }

    /// Rebuild the commission matrix: per-venue trading fees on trade
    /// edges, withdrawal fee as a fraction of the configured transfer size
    /// on transfer edges.
    pub(crate) fn refresh_commissions(&mut self) {
        self.commissions.reset();
        let trade_size = self.settings.params.inter_venue_trade_size;

        for idx in 0..self.edges.len() {
            let edge = self.edges[idx];
            match edge.kind {
                EdgeKind::Trade => {
                    let venue = self.universe.node(edge.from).venue().clone();
                    let fee = self.settings.fees.fee_for(&venue);
                    self.commissions.set(edge.from, edge.to, fee);
                }
                EdgeKind::Transfer => {
                    if let Some(fiat_fee) = self.withdrawal_fiat_fees.get(&edge.from) {
                        self.commissions
                            .set(edge.from, edge.to, fiat_fee / trade_size);
                    }
                }
            }
        }
    }

    pub(crate) fn node_index(&self, venue: &VenueId, asset: &Asset) -> Option<usize> {
        self.universe
            .index_of(&Node::new(venue.clone(), asset.clone()))
    }
}
