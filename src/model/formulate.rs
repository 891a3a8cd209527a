//! Problem formulation: feasibility mask, constraint rows, objective.

use tracing::debug;

use crate::domain::solver::LinearConstraint;
use crate::domain::EdgeKind;

use super::{EdgeVar, OpportunityModel, EDGE_PENALTY};

impl OpportunityModel {
    /// Compute the feasibility mask and derive the edge (variable) list.
    ///
    /// Intra-venue edges come from listed pairs and are feasible in both
    /// directions. Inter-venue edges exist for assets held on at least two
    /// venues, in each direction whose source node has a withdrawal quote.
    pub(crate) fn build_feasibility(&mut self) {
        let n = self.universe.len();
        let mut mask = vec![false; n * n];

        for (venue, pairs) in &self.venue_pairs {
            for pair in pairs {
                let (Some(i), Some(j)) = (
                    self.node_index(venue, &pair.base),
                    self.node_index(venue, &pair.quote),
                ) else {
                    continue;
                };
                mask[i * n + j] = true;
                mask[j * n + i] = true;
            }
        }

        if self.settings.params.allow_inter_venue {
            for asset in self.universe.assets() {
                let holders: Vec<usize> = self.universe.nodes_for_asset(&asset).collect();
                if holders.len() < 2 {
                    continue;
                }
                for &u in &holders {
                    if !self.withdrawal_fiat_fees.contains_key(&u) {
                        continue;
                    }
                    for &v in &holders {
                        if u != v {
                            mask[u * n + v] = true;
                        }
                    }
                }
            }
        }

        // One binary variable per feasible ordered edge, in row-major
        // order so variable indexing is reproducible.
        let mut edges = Vec::new();
        let mut out_edges = vec![Vec::new(); n];
        let mut in_edges = vec![Vec::new(); n];
        for i in 0..n {
            for j in 0..n {
                if !mask[i * n + j] {
                    continue;
                }
                let kind = if self.universe.node(i).venue() == self.universe.node(j).venue() {
                    EdgeKind::Trade
                } else {
                    EdgeKind::Transfer
                };
                let id = edges.len();
                edges.push(EdgeVar { from: i, to: j, kind });
                out_edges[i].push(id);
                in_edges[j].push(id);
            }
        }

        self.mask = mask;
        self.edges = edges;
        self.out_edges = out_edges;
        self.in_edges = in_edges;
    }

    /// Constraint rows that never change across iterations: flow balance
    /// and degree limits per node, and the cycle length cap.
    pub(crate) fn build_static_constraints(&self) -> Vec<LinearConstraint> {
        let mut rows = Vec::new();

        for node in 0..self.universe.len() {
            let outs = &self.out_edges[node];
            let ins = &self.in_edges[node];
            if outs.is_empty() && ins.is_empty() {
                continue;
            }

            // Selected in-degree equals selected out-degree: whatever
            // enters a node must leave it.
            let terms: Vec<(usize, f64)> = outs
                .iter()
                .map(|&e| (e, 1.0))
                .chain(ins.iter().map(|&e| (e, -1.0)))
                .collect();
            rows.push(LinearConstraint::eq(terms, 0.0));

            if !outs.is_empty() {
                rows.push(LinearConstraint::leq(
                    outs.iter().map(|&e| (e, 1.0)).collect(),
                    1.0,
                ));
            }
            if !ins.is_empty() {
                rows.push(LinearConstraint::leq(
                    ins.iter().map(|&e| (e, 1.0)).collect(),
                    1.0,
                ));
            }
        }

        if !self.edges.is_empty() {
            rows.push(LinearConstraint::leq(
                (0..self.edges.len()).map(|e| (e, 1.0)).collect(),
                self.settings.params.max_cycle_len as f64,
            ));
        }

        rows
    }

    /// Recompute the preferred start set and its constraint row.
    ///
    /// Preferred nodes are those whose fiat balance meets the tradable
    /// floor, ranked by balance descending. The constraint row is only
    /// rebuilt when the set actually changes, and removed entirely when it
    /// becomes empty.
    pub(crate) fn update_preferred_start(&mut self) {
        if !self.settings.params.consider_starting_balance {
            self.preferred_start.clear();
            self.preferred_constraint = None;
            return;
        }

        let mut ranked: Vec<(usize, f64)> = self
            .balances
            .iter()
            .filter(|(_, balance)| balance.fiat >= self.settings.params.min_trade_notional)
            .map(|(&index, balance)| (index, balance.fiat))
            .collect();
        ranked.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        let preferred: Vec<usize> = ranked.into_iter().map(|(index, _)| index).collect();

        if preferred == self.preferred_start {
            return;
        }

        debug!(nodes = preferred.len(), "Preferred start set changed");

        if preferred.is_empty() {
            self.preferred_constraint = None;
        } else {
            // At least one selected edge must leave a preferred node.
            let terms: Vec<(usize, f64)> = preferred
                .iter()
                .flat_map(|&node| self.out_edges[node].iter().map(|&e| (e, 1.0)))
                .collect();
            self.preferred_constraint = if terms.is_empty() {
                None
            } else {
                Some(LinearConstraint::geq(terms, 1.0))
            };
        }

        self.preferred_start = preferred;
    }

    /// Re-weight the objective from the current matrices.
    ///
    /// A feasible edge contributes `ln(rate * (1 - fee))`. Edges whose
    /// liquidity misses the tradable floor, or whose after-fee rate cannot
    /// produce a finite log, get a penalty no bounded optimum can select.
    pub(crate) fn rebuild_objective(&mut self) {
        let min_notional = self.settings.params.min_trade_notional;

        for idx in 0..self.edges.len() {
            let edge = self.edges[idx];
            let rate = self.rates.get(edge.from, edge.to);
            let fee = self.commissions.get(edge.from, edge.to);
            let liquidity = self.liquidity.get(edge.from, edge.to);

            let after_fee = rate * (1.0 - fee);
            self.objective[idx] = if liquidity >= min_notional && after_fee > 0.0 {
                let contribution = after_fee.ln();
                if contribution.is_finite() {
                    contribution
                } else {
                    EDGE_PENALTY
                }
            } else {
                EDGE_PENALTY
            };
        }
    }
}
