//! Dense projections of typed sub-graphs onto `GraphView`
//!
//! The topology algorithms work on integer ids; `DenseGraph` keeps the mapping
//! from those ids back to the domain keys (step ids, criterion ids, node ids).

use indexmap::IndexSet;
use salesbrain_graph_algorithms::{bfs, reachable_from, topological_sort, GraphView};
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct DenseGraph<T: Clone + Eq + Hash> {
    items: IndexSet<T>,
    view: GraphView,
}

impl<T: Clone + Eq + Hash> DenseGraph<T> {
    /// Build from a node set and `(from, to)` edges; edge endpoints are added
    /// to the node set if missing.
    pub fn build(
        nodes: impl IntoIterator<Item = T>,
        edges: impl IntoIterator<Item = (T, T)>,
    ) -> Self {
        let mut items: IndexSet<T> = nodes.into_iter().collect();
        let mut dense_edges = Vec::new();
        for (from, to) in edges {
            let (f, _) = items.insert_full(from);
            let (t, _) = items.insert_full(to);
            dense_edges.push((f as u64, t as u64));
        }
        let ids: Vec<u64> = (0..items.len() as u64).collect();
        let view = GraphView::from_edges(&ids, &dense_edges);
        DenseGraph { items, view }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn dense(&self, item: &T) -> Option<u64> {
        self.items.get_index_of(item).map(|idx| idx as u64)
    }

    fn item(&self, dense: u64) -> Option<&T> {
        self.items.get_index(dense as usize)
    }

    /// Shortest path `from ..= to` following edge direction
    pub fn path(&self, from: &T, to: &T) -> Option<Vec<T>> {
        let result = bfs(&self.view, self.dense(from)?, self.dense(to)?)?;
        result
            .path
            .into_iter()
            .map(|idx| self.item(idx).cloned())
            .collect()
    }

    /// Every edge `u -> v` puts `u` first. On a cycle, returns the members
    /// that could not be ordered.
    pub fn topological_order(&self) -> Result<Vec<T>, Vec<T>> {
        let resolve = |ids: Vec<u64>| -> Vec<T> {
            ids.into_iter()
                .filter_map(|idx| self.item(idx).cloned())
                .collect()
        };
        topological_sort(&self.view)
            .map(resolve)
            .map_err(|cycle| resolve(cycle.remaining))
    }

    /// Forward closure of `seeds` (seeds included), in dense (insertion) order
    pub fn reachable_from(&self, seeds: &[T]) -> Vec<T> {
        let dense: Vec<u64> = seeds.iter().filter_map(|s| self.dense(s)).collect();
        let reached = reachable_from(&self.view, &dense);
        let mut ordered: Vec<u64> = reached.into_iter().collect();
        ordered.sort_unstable();
        ordered
            .into_iter()
            .filter_map(|idx| self.item(idx).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_maps_back_to_keys() {
        let graph = DenseGraph::build(
            vec!["a", "b", "c"],
            vec![("a", "b"), ("b", "c")],
        );
        assert_eq!(graph.path(&"a", &"c"), Some(vec!["a", "b", "c"]));
        assert_eq!(graph.path(&"c", &"a"), None);
        assert_eq!(graph.path(&"a", &"zzz"), None);
    }

    #[test]
    fn test_edge_endpoints_join_node_set() {
        let graph = DenseGraph::build(Vec::<&str>::new(), vec![("x", "y")]);
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.topological_order(), Ok(vec!["x", "y"]));
    }

    #[test]
    fn test_topological_order_reports_cycle() {
        let graph = DenseGraph::build(vec!["a", "b"], vec![("a", "b"), ("b", "a")]);
        assert_eq!(graph.topological_order(), Err(vec!["a", "b"]));
    }

    #[test]
    fn test_reachable_from_in_insertion_order() {
        let graph = DenseGraph::build(
            vec!["a", "b", "c", "d"],
            vec![("c", "a"), ("a", "b")],
        );
        assert_eq!(graph.reachable_from(&["c"]), vec!["a", "b", "c"]);
    }
}
