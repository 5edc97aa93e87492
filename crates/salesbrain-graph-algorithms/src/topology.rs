//! Graph topology analysis algorithms
//!
//! Topological ordering (Kahn) and forward reachability over a `GraphView`.

use super::common::{GraphView, NodeId};
use std::collections::{HashSet, VecDeque};

/// Returned by [`topological_sort`] when the graph is not a DAG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError {
    /// Nodes that could not be ordered (every cycle lies within this set)
    pub remaining: Vec<NodeId>,
}

/// Kahn's algorithm.
///
/// Every edge `u -> v` places `u` before `v`. Ties are broken by dense index,
/// so the order is deterministic for a given view.
pub fn topological_sort(view: &GraphView) -> Result<Vec<NodeId>, CycleError> {
    let n = view.node_count;
    let mut in_degree: Vec<usize> = (0..n).map(|idx| view.in_degree(idx)).collect();
    let mut queue: VecDeque<usize> = (0..n).filter(|&idx| in_degree[idx] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(idx) = queue.pop_front() {
        order.push(view.index_to_node[idx]);
        for &next in view.successors(idx) {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() == n {
        Ok(order)
    } else {
        let ordered: HashSet<NodeId> = order.iter().copied().collect();
        let remaining = view
            .index_to_node
            .iter()
            .copied()
            .filter(|id| !ordered.contains(id))
            .collect();
        Err(CycleError { remaining })
    }
}

/// All nodes reachable from `seeds` (seeds included), following edge direction.
pub fn reachable_from(view: &GraphView, seeds: &[NodeId]) -> HashSet<NodeId> {
    let mut seen = vec![false; view.node_count];
    let mut stack: Vec<usize> = seeds
        .iter()
        .filter_map(|id| view.node_to_index.get(id).copied())
        .collect();
    let mut reached = HashSet::new();

    while let Some(idx) = stack.pop() {
        if seen[idx] {
            continue;
        }
        seen[idx] = true;
        reached.insert(view.index_to_node[idx]);
        for &next in view.successors(idx) {
            if !seen[next] {
                stack.push(next);
            }
        }
    }

    reached
}
