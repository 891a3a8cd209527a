//! Cycle reconstruction from a solved edge selection.
//!
//! Flow balance admits solutions made of several disjoint cycles. The
//! selection is decomposed into closed walks and only the most profitable
//! component is reported, so callers always receive one well-ordered
//! cycle. The reported walk starts at the highest-ranked preferred node it
//! contains, falling back to the lowest node index for determinism.

use std::collections::{HashMap, HashSet};

use tracing::warn;

use crate::domain::{CandidateCycle, CycleEdge, Universe};

use super::EdgeVar;

/// Decompose `selected` into closed walks and return the best one as a
/// cycle, with profit factor `exp(log_sum) - 1` of that component alone.
pub(crate) fn best_cycle(
    selected: &[usize],
    edges: &[EdgeVar],
    objective: &[f64],
    preferred: &[usize],
    universe: &Universe,
) -> Option<CandidateCycle> {
    // Degree constraints guarantee at most one selected out-edge per node.
    let mut successor: HashMap<usize, usize> = HashMap::new();
    for &edge_id in selected {
        if successor.insert(edges[edge_id].from, edge_id).is_some() {
            warn!(
                node = %universe.node(edges[edge_id].from),
                "Node has two selected out-edges; selection is malformed"
            );
            return None;
        }
    }

    let mut visited: HashSet<usize> = HashSet::new();
    let mut components: Vec<Vec<usize>> = Vec::new();

    for &first in selected {
        let start = edges[first].from;
        if visited.contains(&start) {
            continue;
        }

        let mut walk = Vec::new();
        let mut current = start;
        let closed = loop {
            let Some(&edge_id) = successor.get(&current) else {
                break false;
            };
            if !visited.insert(current) {
                break false;
            }
            walk.push(edge_id);
            current = edges[edge_id].to;
            if current == start {
                break true;
            }
        };

        if closed {
            components.push(walk);
        } else if !walk.is_empty() {
            warn!(edges = walk.len(), "Discarding non-closed component");
        }
    }

    let (best, log_sum) = components
        .into_iter()
        .map(|component| {
            let log_sum: f64 = component.iter().map(|&e| objective[e]).sum();
            (component, log_sum)
        })
        .max_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
        })?;

    let walk_nodes: Vec<usize> = best.iter().map(|&e| edges[e].from).collect();
    let start_position = preferred
        .iter()
        .find_map(|p| walk_nodes.iter().position(|n| n == p))
        .unwrap_or_else(|| {
            walk_nodes
                .iter()
                .enumerate()
                .min_by_key(|(_, &node)| node)
                .map(|(position, _)| position)
                .unwrap_or(0)
        });

    let cycle_edges: Vec<CycleEdge> = best[start_position..]
        .iter()
        .chain(best[..start_position].iter())
        .map(|&e| CycleEdge {
            from: universe.node(edges[e].from).clone(),
            to: universe.node(edges[e].to).clone(),
            kind: edges[e].kind,
        })
        .collect();

    Some(CandidateCycle::new(cycle_edges, log_sum.exp() - 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Asset, EdgeKind, Node, VenueId};

    fn universe(n: usize) -> Universe {
        // Single venue, assets A0..An, indexed alphabetically.
        let nodes = (0..n)
            .map(|i| Node::new(VenueId::new("v"), Asset::new(format!("A{i}"))))
            .collect();
        Universe::from_nodes(nodes)
    }

    fn trade(from: usize, to: usize) -> EdgeVar {
        EdgeVar {
            from,
            to,
            kind: EdgeKind::Trade,
        }
    }

    #[test]
    fn single_cycle_is_ordered_and_closed() {
        let universe = universe(3);
        let edges = vec![trade(0, 1), trade(1, 2), trade(2, 0)];
        let objective = vec![0.01, 0.02, 0.03];

        let cycle = best_cycle(&[0, 1, 2], &edges, &objective, &[], &universe).unwrap();

        assert!(cycle.is_closed());
        assert_eq!(cycle.len(), 3);
        assert!((cycle.profit_factor() - (0.06f64.exp() - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn most_profitable_component_wins() {
        let universe = universe(4);
        // Two disjoint 2-cycles: 0<->1 (log sum 0.02) and 2<->3 (log sum 0.10).
        let edges = vec![trade(0, 1), trade(1, 0), trade(2, 3), trade(3, 2)];
        let objective = vec![0.01, 0.01, 0.04, 0.06];

        let cycle = best_cycle(&[0, 1, 2, 3], &edges, &objective, &[], &universe).unwrap();

        assert_eq!(cycle.len(), 2);
        let walk = cycle.walk();
        assert_eq!(walk[0], *universe.node(2));
        assert!((cycle.profit_factor() - (0.10f64.exp() - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn walk_starts_at_preferred_node_when_present() {
        let universe = universe(3);
        let edges = vec![trade(0, 1), trade(1, 2), trade(2, 0)];
        let objective = vec![0.01; 3];

        let cycle = best_cycle(&[0, 1, 2], &edges, &objective, &[2, 0], &universe).unwrap();

        assert_eq!(cycle.walk()[0], *universe.node(2));
        assert!(cycle.is_closed());
    }

    #[test]
    fn open_chain_yields_nothing() {
        let universe = universe(3);
        // 0 -> 1 -> 2 never returns to 0.
        let edges = vec![trade(0, 1), trade(1, 2)];
        let objective = vec![0.01; 2];

        assert!(best_cycle(&[0, 1], &edges, &objective, &[], &universe).is_none());
    }

    #[test]
    fn duplicate_out_edges_are_rejected() {
        let universe = universe(3);
        let edges = vec![trade(0, 1), trade(0, 2)];
        let objective = vec![0.01; 2];

        assert!(best_cycle(&[0, 1], &edges, &objective, &[], &universe).is_none());
    }
}
