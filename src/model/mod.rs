//! The opportunity graph model.
//!
//! Builds a weighted multigraph over (venue, asset) nodes and formulates
//! cycle selection as a mixed-integer program: one binary variable per
//! feasible conversion edge, flow balance at every node, and a maximized
//! log-sum objective. Because `ln(a * b) = ln(a) + ln(b)`, the additive
//! objective linearizes the multiplicative chain of after-fee conversion
//! rates; the profit factor is recovered as `exp(objective) - 1`.
//!
//! The node universe, feasibility mask, and constraint rows are built once
//! per run. Every detection iteration rebuilds market-data matrices from
//! scratch, rewrites the objective coefficients, and re-solves.
//!
//! The model owns a [`MipSolver`] handle rather than extending any solver
//! type, so backends can be swapped without touching graph logic.

mod formulate;
mod matrix;
mod params;
mod reconstruct;
mod refresh;

pub use params::{DetectorParams, SimulatedBalances};

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::domain::solver::{CycleProblem, LinearConstraint, MipSolver};
use crate::domain::{Asset, CandidateCycle, EdgeKind, Node, Universe, VenueId};
use crate::error::{ModelError, Result, VenueError};
use crate::pricing::{ReferencePrice, ReferencePriceSource};
use crate::venue::{MarketDataGateway, PairListing};

use matrix::Matrix;

/// Fraction of 24h traded volume considered safely tradable on an edge.
const VOLUME_SAFETY_FRACTION: f64 = 0.01;

/// Objective coefficient for edges that must never be selected: zero or
/// unpriceable rate, or liquidity below the tradable floor. Large enough
/// that no bounded optimum can absorb it, finite so the solver stays
/// numerically well-behaved.
const EDGE_PENALTY: f64 = -1.0e6;

/// Proportional trading fees per venue with a default fallback.
#[derive(Debug, Clone)]
pub struct FeeTable {
    default: f64,
    venues: HashMap<VenueId, f64>,
}

impl FeeTable {
    pub fn new(default: f64) -> Self {
        Self {
            default,
            venues: HashMap::new(),
        }
    }

    pub fn with_venue(mut self, venue: VenueId, fee: f64) -> Self {
        self.venues.insert(venue, fee);
        self
    }

    pub fn from_config(config: &Config) -> Self {
        let venues = config
            .fees
            .venues
            .iter()
            .map(|(venue, fee)| (VenueId::new(venue.as_str()), *fee))
            .collect();
        Self {
            default: config.fees.default,
            venues,
        }
    }

    pub fn fee_for(&self, venue: &VenueId) -> f64 {
        self.venues.get(venue).copied().unwrap_or(self.default)
    }
}

/// Model configuration beyond its collaborators.
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub params: DetectorParams,
    pub fees: FeeTable,
    /// Symbols treated as fiat.
    pub fiat: HashSet<Asset>,
    /// Optional asset whitelist; `None` admits every listed asset.
    pub allowed: Option<HashSet<Asset>>,
    /// Upper bound on any single venue call.
    pub request_timeout: Duration,
    /// Concurrency bound for per-venue fetches.
    pub fetch_workers: usize,
    /// Withdrawal fee / reference price refresh cadence, in iterations.
    pub refresh_every: u32,
}

impl ModelSettings {
    pub fn from_config(config: &Config) -> Self {
        let allowed: HashSet<Asset> = config
            .assets
            .allowed
            .iter()
            .map(|s| Asset::new(s.as_str()))
            .collect();
        Self {
            params: config.detector.clone(),
            fees: FeeTable::from_config(config),
            fiat: config
                .assets
                .fiat
                .iter()
                .map(|s| Asset::new(s.as_str()))
                .collect(),
            allowed: (!allowed.is_empty()).then_some(allowed),
            request_timeout: Duration::from_secs(config.supervisor.request_timeout_secs),
            fetch_workers: config.supervisor.fetch_workers,
            refresh_every: config.supervisor.withdrawal_refresh_every,
        }
    }

    /// Replace the parameter set, e.g. with per-run overrides applied.
    pub fn with_params(mut self, params: DetectorParams) -> Self {
        self.params = params;
        self
    }
}

/// A feasible ordered edge. Its position in the edge list is its decision
/// variable index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeVar {
    pub from: usize,
    pub to: usize,
    pub kind: EdgeKind,
}

/// Balance held at one node, in asset units and fiat equivalent.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeBalance {
    pub amount: f64,
    pub fiat: f64,
}

/// The per-run detection engine. See the module docs for the formulation.
pub struct OpportunityModel {
    venues: Vec<(VenueId, Arc<dyn MarketDataGateway>)>,
    prices: Arc<dyn ReferencePriceSource>,
    solver: Arc<dyn MipSolver>,
    settings: ModelSettings,

    // Built once by initialize_universe()
    universe: Universe,
    venue_pairs: HashMap<VenueId, Vec<PairListing>>,
    ref_prices: HashMap<Asset, ReferencePrice>,
    universe_ready: bool,

    // Built once by build_variables()
    mask: Vec<bool>,
    edges: Vec<EdgeVar>,
    out_edges: Vec<Vec<usize>>,
    in_edges: Vec<Vec<usize>>,
    static_constraints: Vec<LinearConstraint>,
    variables_built: bool,

    // Rebuilt every iteration
    iteration: u64,
    withdrawal_fiat_fees: HashMap<usize, f64>,
    balances: HashMap<usize, NodeBalance>,
    rates: Matrix,
    commissions: Matrix,
    liquidity: Matrix,
    objective: Vec<f64>,
    preferred_start: Vec<usize>,
    preferred_constraint: Option<LinearConstraint>,
}

impl OpportunityModel {
    /// Create a model over the given venues.
    ///
    /// Fails fast on an empty venue map; individual venue outages are
    /// tolerated later, during universe initialization.
    pub fn new(
        venues: HashMap<VenueId, Arc<dyn MarketDataGateway>>,
        prices: Arc<dyn ReferencePriceSource>,
        solver: Arc<dyn MipSolver>,
        settings: ModelSettings,
    ) -> Result<Self> {
        if venues.is_empty() {
            return Err(ModelError::NoVenues.into());
        }

        // Deterministic venue order keeps node indexing and logs stable.
        let mut venues: Vec<_> = venues.into_iter().collect();
        venues.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Self {
            venues,
            prices,
            solver,
            settings,
            universe: Universe::default(),
            venue_pairs: HashMap::new(),
            ref_prices: HashMap::new(),
            universe_ready: false,
            mask: Vec::new(),
            edges: Vec::new(),
            out_edges: Vec::new(),
            in_edges: Vec::new(),
            static_constraints: Vec::new(),
            variables_built: false,
            iteration: 0,
            withdrawal_fiat_fees: HashMap::new(),
            balances: HashMap::new(),
            rates: Matrix::zeros(0),
            commissions: Matrix::zeros(0),
            liquidity: Matrix::zeros(0),
            objective: Vec::new(),
            preferred_start: Vec::new(),
            preferred_constraint: None,
        })
    }

    /// Build the node universe from venue listings and reference prices.
    ///
    /// A venue that fails its listing call is skipped with a warning and
    /// contributes no nodes; startup only fails when every venue is
    /// unusable. Fiat assets are dropped unless configured in, and any
    /// asset without a reference price is dropped because it cannot be
    /// compared across venues.
    ///
    /// This is the one slow, network-bound setup step; call it exactly
    /// once before the detection loop starts.
    pub async fn initialize_universe(&mut self) -> Result<()> {
        let catalogs = self.fetch_catalogs().await;

        let mut nodes = Vec::new();
        let mut venue_pairs = HashMap::new();
        let mut usable = 0usize;

        for (venue, catalog) in catalogs {
            let Some(catalog) = catalog else {
                continue;
            };
            usable += 1;

            for asset in &catalog.assets {
                if !self.settings.params.include_fiat && self.settings.fiat.contains(asset) {
                    continue;
                }
                if let Some(allowed) = &self.settings.allowed {
                    if !allowed.contains(asset) {
                        continue;
                    }
                }
                nodes.push(Node::new(venue.clone(), asset.clone()));
            }

            venue_pairs.insert(venue, catalog.pairs);
        }

        if usable == 0 {
            return Err(ModelError::NoUsableVenues.into());
        }

        let mut symbols: Vec<Asset> = nodes.iter().map(|n| n.asset().clone()).collect();
        symbols.sort();
        symbols.dedup();

        self.ref_prices = self.prices.prices(&symbols).await;
        nodes.retain(|n| self.ref_prices.contains_key(n.asset()));

        self.universe = Universe::from_nodes(nodes);
        self.venue_pairs = venue_pairs;
        self.universe_ready = true;

        info!(
            venues = usable,
            nodes = self.universe.len(),
            priced_assets = self.ref_prices.len(),
            "Universe initialized"
        );

        Ok(())
    }

    /// Compute the feasibility mask and instantiate the decision variable
    /// universe and static constraint rows. Call once, after
    /// [`initialize_universe`](Self::initialize_universe).
    pub async fn build_variables(&mut self) -> Result<()> {
        if !self.universe_ready {
            return Err(ModelError::UniverseNotInitialized.into());
        }

        // Transfer feasibility depends on which assets have withdrawal
        // quotes, so fetch them before masking.
        self.refresh_withdrawal_quotes(&CancellationToken::new())
            .await;

        self.build_feasibility();
        self.static_constraints = self.build_static_constraints();

        let n = self.universe.len();
        self.rates = Matrix::zeros(n);
        self.commissions = Matrix::zeros(n);
        self.liquidity = Matrix::zeros(n);
        self.objective = vec![0.0; self.edges.len()];
        self.variables_built = true;

        info!(
            edges = self.edges.len(),
            constraints = self.static_constraints.len(),
            "Decision variables built"
        );

        Ok(())
    }

    /// Run one full detection iteration: refresh market data, re-weight the
    /// objective, solve, and reconstruct the selected edges into a cycle.
    ///
    /// Returns `Ok(None)` when no profitable cycle exists this iteration -
    /// including infeasible or unbounded solves, which are expected
    /// outcomes, not errors. Data fetch failures degrade the affected
    /// venue's edges to zero rate for this iteration only.
    pub async fn detect_cycle(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<CandidateCycle>> {
        if !self.variables_built {
            return Err(ModelError::VariablesNotBuilt.into());
        }

        let iteration = self.iteration;
        self.iteration += 1;

        // Withdrawal fees and reference prices move slowly and are the
        // most fragile calls; refresh them on their own cadence.
        let refresh_every = u64::from(self.settings.refresh_every);
        if iteration > 0 && refresh_every > 0 && iteration % refresh_every == 0 {
            self.refresh_withdrawal_quotes(cancel).await;
            self.refresh_reference_prices().await;
        }

        self.refresh_balances(cancel).await;

        let tickers = self.fetch_all_tickers(cancel).await;
        self.refresh_rates(&tickers);
        self.refresh_liquidity(&tickers);
        self.refresh_commissions();

        self.update_preferred_start();
        self.rebuild_objective();

        if cancel.is_cancelled() {
            return Ok(None);
        }

        let mut constraints = self.static_constraints.clone();
        if let Some(preferred) = &self.preferred_constraint {
            constraints.push(preferred.clone());
        }
        let problem = CycleProblem {
            num_vars: self.edges.len(),
            objective: self.objective.clone(),
            constraints,
        };

        // The solve is CPU-bound; keep it off the async workers.
        let solver = self.solver.clone();
        let solution = match tokio::task::spawn_blocking(move || solver.solve(&problem)).await {
            Ok(Ok(solution)) => solution,
            Ok(Err(e)) => {
                error!(error = %e, "Solver failed");
                return Ok(None);
            }
            Err(e) => {
                error!(error = %e, "Solve task aborted");
                return Ok(None);
            }
        };

        if !solution.is_optimal() {
            debug!(status = ?solution.status, iteration, "No solution this iteration");
            return Ok(None);
        }

        if solution.values.len() != self.edges.len() {
            // A shape mismatch means variable construction is buggy, not
            // that the market holds no opportunity.
            let err = ModelError::VariableCountMismatch {
                expected: self.edges.len(),
                got: solution.values.len(),
            };
            error!(error = %err, "Discarding malformed solution");
            return Ok(None);
        }

        let selected = solution.selected();
        if selected.is_empty() {
            debug!(iteration, "Empty selection; no opportunity");
            return Ok(None);
        }

        let Some(cycle) = reconstruct::best_cycle(
            &selected,
            &self.edges,
            &self.objective,
            &self.preferred_start,
            &self.universe,
        ) else {
            return Ok(None);
        };

        if cycle.profit_factor() <= 0.0 {
            debug!(
                profit_factor = cycle.profit_factor(),
                iteration, "Best cycle not profitable"
            );
            return Ok(None);
        }

        info!(cycle = %cycle, iteration, "Arbitrage cycle detected");
        Ok(Some(cycle))
    }

    /// The retained node universe. Empty until
    /// [`initialize_universe`](Self::initialize_universe) runs.
    pub fn universe(&self) -> &Universe {
        &self.universe
    }

    /// The feasible edge list; one decision variable exists per entry.
    pub fn edges(&self) -> &[EdgeVar] {
        &self.edges
    }

    /// Whether a directed edge between two nodes is feasible.
    pub fn is_feasible(&self, from: &Node, to: &Node) -> bool {
        let (Some(i), Some(j)) = (self.universe.index_of(from), self.universe.index_of(to)) else {
            return false;
        };
        self.mask[i * self.universe.len() + j]
    }

    /// Number of `true` entries in the feasibility mask.
    pub fn feasible_pair_count(&self) -> usize {
        self.mask.iter().filter(|m| **m).count()
    }

    /// Fiat value of one unit of `asset`, when a reference price is known.
    fn fiat_price(&self, asset: &Asset) -> Option<f64> {
        use rust_decimal::prelude::ToPrimitive;
        self.ref_prices.get(asset).and_then(|p| p.price.to_f64())
    }

    /// Bound a venue call with the configured request timeout.
    async fn bounded<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let timeout = self.settings.request_timeout;
        match tokio::time::timeout(timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(VenueError::Timeout {
                timeout_secs: timeout.as_secs(),
            }
            .into()),
        }
    }
}
