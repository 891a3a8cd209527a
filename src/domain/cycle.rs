//! Candidate cycles and opportunity records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::node::Node;

/// The kind of conversion an edge performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// A trade between two assets on the same venue.
    Trade,
    /// A transfer of one asset between two venues.
    Transfer,
}

/// One hop of a candidate cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleEdge {
    pub from: Node,
    pub to: Node,
    pub kind: EdgeKind,
}

/// A closed walk of conversions whose compounded rate-after-fees exceeded 1.
///
/// The walk is ordered: each edge's `to` node is the next edge's `from`
/// node, and the last edge returns to the first edge's `from` node.
#[derive(Debug, Clone)]
pub struct CandidateCycle {
    edges: Vec<CycleEdge>,
    profit_factor: f64,
}

impl CandidateCycle {
    /// Build a cycle from an ordered closed walk.
    pub fn new(edges: Vec<CycleEdge>, profit_factor: f64) -> Self {
        Self {
            edges,
            profit_factor,
        }
    }

    pub fn edges(&self) -> &[CycleEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Profit per unit of starting asset, e.g. 0.004 for +0.4%.
    pub fn profit_factor(&self) -> f64 {
        self.profit_factor
    }

    /// The nodes visited, in order, without repeating the closing node.
    pub fn walk(&self) -> Vec<Node> {
        self.edges.iter().map(|e| e.from.clone()).collect()
    }

    /// Whether the edge sequence forms a single closed walk.
    pub fn is_closed(&self) -> bool {
        if self.edges.is_empty() {
            return false;
        }
        let chained = self
            .edges
            .windows(2)
            .all(|pair| pair[0].to == pair[1].from);
        chained && self.edges[self.edges.len() - 1].to == self.edges[0].from
    }
}

impl fmt::Display for CandidateCycle {
    /// Renders as `a:BTC -> a:ETH -> b:ETH -> a:BTC (+0.4210%)`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for edge in &self.edges {
            write!(f, "{} -> ", edge.from)?;
        }
        if let Some(last) = self.edges.last() {
            write!(f, "{}", last.to)?;
        }
        write!(f, " ({:+.4}%)", self.profit_factor * 100.0)
    }
}

/// Downstream sizing outcome for a detected cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SizingOutcome {
    /// The sizing stage produced tradable order sizes; execution was
    /// simulated only.
    SimulatedExecution { estimated_profit_fiat: f64 },
    /// No order sizes satisfied depth and balance limits.
    NoWorkableSolution,
}

/// One entry of the supervisor's append-only opportunity history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpportunityRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Ordered node walk; the closing hop back to the first node is implied.
    pub walk: Vec<Node>,
    pub profit_factor: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sizing: Option<SizingOutcome>,
}

impl OpportunityRecord {
    pub fn new(cycle: &CandidateCycle, sizing: Option<SizingOutcome>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            walk: cycle.walk(),
            profit_factor: cycle.profit_factor(),
            sizing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Asset, VenueId};

    fn node(venue: &str, asset: &str) -> Node {
        Node::new(VenueId::new(venue), Asset::new(asset))
    }

    fn edge(from: Node, to: Node, kind: EdgeKind) -> CycleEdge {
        CycleEdge { from, to, kind }
    }

    fn triangle() -> CandidateCycle {
        CandidateCycle::new(
            vec![
                edge(node("a", "BTC"), node("a", "ETH"), EdgeKind::Trade),
                edge(node("a", "ETH"), node("b", "ETH"), EdgeKind::Transfer),
                edge(node("b", "ETH"), node("a", "BTC"), EdgeKind::Trade),
            ],
            0.01,
        )
    }

    #[test]
    fn closed_walk_is_detected() {
        assert!(triangle().is_closed());
    }

    #[test]
    fn open_walk_is_not_closed() {
        let cycle = CandidateCycle::new(
            vec![
                edge(node("a", "BTC"), node("a", "ETH"), EdgeKind::Trade),
                edge(node("a", "ETH"), node("b", "ETH"), EdgeKind::Transfer),
            ],
            0.01,
        );
        assert!(!cycle.is_closed());
    }

    #[test]
    fn empty_cycle_is_not_closed() {
        assert!(!CandidateCycle::new(vec![], 0.0).is_closed());
    }

    #[test]
    fn walk_lists_nodes_in_order() {
        let walk = triangle().walk();
        assert_eq!(walk.len(), 3);
        assert_eq!(walk[0], node("a", "BTC"));
        assert_eq!(walk[1], node("a", "ETH"));
        assert_eq!(walk[2], node("b", "ETH"));
    }

    #[test]
    fn record_captures_walk_and_profit() {
        let cycle = triangle();
        let record = OpportunityRecord::new(&cycle, Some(SizingOutcome::NoWorkableSolution));
        assert_eq!(record.walk, cycle.walk());
        assert_eq!(record.profit_factor, 0.01);
        assert!(record.sizing.is_some());
    }
}
