//! Graph nodes and the node universe.
//!
//! A node is a tradable unit: one asset held on one venue. The universe
//! assigns every retained node a stable dense index so that per-iteration
//! matrices can be stored as flat arrays. The index mapping is rebuilt only
//! when the universe itself is rebuilt (once per run, at initialization).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::{Asset, VenueId};

/// A (venue, asset) pair - the unit of exchange in the opportunity graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Node {
    venue: VenueId,
    asset: Asset,
}

impl Node {
    pub fn new(venue: VenueId, asset: Asset) -> Self {
        Self { venue, asset }
    }

    pub fn venue(&self) -> &VenueId {
        &self.venue
    }

    pub fn asset(&self) -> &Asset {
        &self.asset
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.venue, self.asset)
    }
}

/// The set of retained nodes with a dense index in both directions.
#[derive(Debug, Default, Clone)]
pub struct Universe {
    nodes: Vec<Node>,
    index: HashMap<Node, usize>,
}

impl Universe {
    /// Build a universe from a node set.
    ///
    /// Nodes are deduplicated and sorted so that index assignment is
    /// deterministic across runs with the same inputs.
    pub fn from_nodes(mut nodes: Vec<Node>) -> Self {
        nodes.sort();
        nodes.dedup();
        let index = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.clone(), i))
            .collect();
        Self { nodes, index }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Node for a dense index. Panics on out-of-range input; indices are
    /// only produced by this universe.
    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    pub fn index_of(&self, node: &Node) -> Option<usize> {
        self.index.get(node).copied()
    }

    pub fn contains(&self, node: &Node) -> bool {
        self.index.contains_key(node)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &Node)> {
        self.nodes.iter().enumerate()
    }

    /// Indices of every node holding the given asset, across venues.
    pub fn nodes_for_asset<'a>(&'a self, asset: &'a Asset) -> impl Iterator<Item = usize> + 'a {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, n)| n.asset() == asset)
            .map(|(i, _)| i)
    }

    /// The distinct asset symbols present in the universe.
    pub fn assets(&self) -> Vec<Asset> {
        let mut assets: Vec<Asset> = self.nodes.iter().map(|n| n.asset().clone()).collect();
        assets.sort();
        assets.dedup();
        assets
    }
}
