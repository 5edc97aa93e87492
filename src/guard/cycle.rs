//! Cycle detection for step and criterion dependencies
//!
//! For every proposed edge `A depends_on B` the guard searches forward from
//! `B` through existing, proposed and inheritance-expanded edges. If `A` is
//! reachable the whole batch is rejected with the offending path.

use super::materialize::{CriterionGraph, DependencyEdge, ProposedEdge, Via};
use crate::graph::{
    CriterionId, DenseGraph, Direction, EdgeKind, GraphStore, NodeId, NodeKind, StepId,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Which dependency layer a cycle was found in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyGraph {
    Step,
    Criterion,
}

impl fmt::Display for DependencyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DependencyGraph::Step => "step",
            DependencyGraph::Criterion => "criterion",
        })
    }
}

/// A rejected dependency change.
///
/// `path` starts and ends at the same node. Hops that exist only through
/// actor inheritance show the actor between the two criteria.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Dependency cycle in {graph} graph: {}", render_path(.path))]
pub struct CycleDetected {
    pub graph: DependencyGraph,
    pub path: Vec<NodeId>,
}

fn render_path(path: &[NodeId]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Validates dependency changes against the committed graph
pub struct CycleGuard<'a> {
    store: &'a GraphStore,
}

impl<'a> CycleGuard<'a> {
    pub fn new(store: &'a GraphStore) -> Self {
        CycleGuard { store }
    }

    fn step_edges(&self) -> Vec<(StepId, StepId)> {
        self.store
            .ids_of_kind(NodeKind::Step)
            .into_iter()
            .flat_map(|node| {
                self.store
                    .neighbors(node, EdgeKind::StepDependsOn, Direction::Outgoing)
                    .into_iter()
                    .filter_map(move |to| Some((StepId::from_node(node)?, StepId::from_node(to)?)))
            })
            .collect()
    }

    /// Check that `step depends_on prerequisite` keeps the step graph acyclic
    pub fn check_step_dependency(
        &self,
        step: &StepId,
        prerequisite: &StepId,
    ) -> Result<(), CycleDetected> {
        if step == prerequisite {
            return Err(CycleDetected {
                graph: DependencyGraph::Step,
                path: vec![step.node(), step.node()],
            });
        }

        let mut edges = self.step_edges();
        edges.push((step.clone(), prerequisite.clone()));
        let graph = DenseGraph::build(std::iter::empty(), edges);

        match graph.path(prerequisite, step) {
            Some(back) => {
                let mut path = vec![step.node()];
                path.extend(back.iter().map(|s| s.node()));
                debug!(step = %step, prerequisite = %prerequisite, "step dependency rejected");
                Err(CycleDetected {
                    graph: DependencyGraph::Step,
                    path,
                })
            }
            None => Ok(()),
        }
    }

    /// Check a batch of criterion-layer changes as one unit.
    ///
    /// Returns the materialized edges the batch introduces (direct and
    /// expanded) when the result stays acyclic.
    pub fn check_criterion_edges(
        &self,
        proposed: &[ProposedEdge],
    ) -> Result<Vec<DependencyEdge>, CycleDetected> {
        let mut overlay = CriterionGraph::materialize(self.store);
        let mut introduced = Vec::new();
        for change in proposed {
            introduced.extend(overlay.apply(change));
        }

        // Self-dependency needs no search
        if let Some(edge) = introduced.iter().find(|e| e.from == e.to) {
            return Err(CycleDetected {
                graph: DependencyGraph::Criterion,
                path: annotate(&overlay, &[edge.from.clone(), edge.to.clone()]),
            });
        }

        let all_edges = overlay.edges();
        let graph = DenseGraph::build(
            overlay.criteria().cloned(),
            all_edges.iter().map(|e| (e.from.clone(), e.to.clone())),
        );

        for edge in &introduced {
            if let Some(back) = graph.path(&edge.to, &edge.from) {
                let mut cycle = vec![edge.from.clone()];
                cycle.extend(back);
                debug!(
                    from = %edge.from,
                    to = %edge.to,
                    hops = cycle.len() - 1,
                    "criterion dependency rejected"
                );
                return Err(CycleDetected {
                    graph: DependencyGraph::Criterion,
                    path: annotate(&overlay, &cycle),
                });
            }
        }

        Ok(introduced)
    }

    /// Verify both layers of a fully loaded graph (used when importing)
    pub fn verify(&self) -> Result<(), CycleDetected> {
        let steps = DenseGraph::build(std::iter::empty(), self.step_edges());
        if let Err(members) = steps.topological_order() {
            return Err(self.explain(DependencyGraph::Step, &steps, members));
        }

        let overlay = CriterionGraph::materialize(self.store);
        let criteria = DenseGraph::build(
            overlay.criteria().cloned(),
            overlay.edges().into_iter().map(|e| (e.from, e.to)),
        );
        if let Err(members) = criteria.topological_order() {
            let path = self.explain_path(&criteria, &members);
            return Err(CycleDetected {
                graph: DependencyGraph::Criterion,
                path: annotate(&overlay, &path),
            });
        }
        Ok(())
    }

    fn explain(
        &self,
        graph: DependencyGraph,
        steps: &DenseGraph<StepId>,
        members: Vec<StepId>,
    ) -> CycleDetected {
        let path = self.explain_path(steps, &members);
        CycleDetected {
            graph,
            path: path.iter().map(|s| s.node()).collect(),
        }
    }

    /// Turn the unordered members of a failed sort into one concrete cycle
    fn explain_path<T>(&self, graph: &DenseGraph<T>, members: &[T]) -> Vec<T>
    where
        T: Clone + Eq + std::hash::Hash,
    {
        for start in members {
            for next in members {
                if next == start {
                    continue;
                }
                if let (Some(there), Some(back)) = (graph.path(start, next), graph.path(next, start)) {
                    let mut path = there;
                    path.extend(back.into_iter().skip(1));
                    return path;
                }
            }
        }
        members.to_vec()
    }
}

/// Render a criterion cycle, inserting the actor each inherited hop expands through
fn annotate(graph: &CriterionGraph, cycle: &[CriterionId]) -> Vec<NodeId> {
    let mut path = Vec::with_capacity(cycle.len() * 2);
    for (idx, criterion) in cycle.iter().enumerate() {
        if idx > 0 {
            let from = &cycle[idx - 1];
            let via = graph
                .dependencies(from)
                .into_iter()
                .find(|e| &e.to == criterion)
                .map(|e| e.via);
            if let Some(Via::Inherited(actor)) = via {
                path.push(actor.node());
            }
        }
        path.push(criterion.node());
    }
    path
}
