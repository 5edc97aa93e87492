//! The rollup DAG
//!
//! Edges point from an input to the node whose derived state reads it:
//! - dependency criterion -> dependent criterion (direct and inherited)
//! - criterion -> owning actor
//! - criterion of actor X -> signatory inheriting its evaluation basis from X
//! - actor -> step
//! - prerequisite step -> dependent step
//! - step -> process -> deal

use crate::graph::{
    ActorId, CriterionId, DenseGraph, Direction, EdgeKind, GraphStore, NodeId, NodeKind,
};
use crate::guard::{CriterionGraph, CycleDetected, DependencyGraph};
use indexmap::IndexSet;
use rustc_hash::{FxHashMap, FxHashSet};

#[derive(Debug, Clone)]
pub struct RollupPlan {
    graph: DenseGraph<NodeId>,
    /// Evaluation order over every node in the plan
    order: Vec<NodeId>,
    /// Inputs of each node, used to find nodes whose wiring changed
    inputs: FxHashMap<NodeId, IndexSet<NodeId>>,
}

impl RollupPlan {
    pub fn build(store: &GraphStore, criteria: &CriterionGraph) -> Result<Self, CycleDetected> {
        let mut nodes: Vec<NodeId> = Vec::new();
        let mut edges: Vec<(NodeId, NodeId)> = Vec::new();

        for kind in [
            NodeKind::Criterion,
            NodeKind::Actor,
            NodeKind::Step,
            NodeKind::Process,
            NodeKind::Deal,
        ] {
            nodes.extend(store.ids_of_kind(kind).into_iter().cloned());
        }

        for criterion in criteria.criteria() {
            for dep in criteria.dependencies(criterion) {
                edges.push((dep.to.node(), dep.from.node()));
            }
        }

        for actor in store.ids_of_kind(NodeKind::Actor) {
            for criterion in store.neighbors(actor, EdgeKind::OwnsCriterion, Direction::Outgoing) {
                edges.push((criterion.clone(), actor.clone()));
            }
            for source in store.neighbors(actor, EdgeKind::InheritsFrom, Direction::Outgoing) {
                for criterion in
                    store.neighbors(source, EdgeKind::OwnsCriterion, Direction::Outgoing)
                {
                    edges.push((criterion.clone(), actor.clone()));
                }
            }
        }

        for step in store.ids_of_kind(NodeKind::Step) {
            for actor in store.neighbors(step, EdgeKind::AssignsActor, Direction::Outgoing) {
                edges.push((actor.clone(), step.clone()));
            }
            for prerequisite in store.neighbors(step, EdgeKind::StepDependsOn, Direction::Outgoing)
            {
                edges.push((prerequisite.clone(), step.clone()));
            }
        }

        for process in store.ids_of_kind(NodeKind::Process) {
            for step in store.neighbors(process, EdgeKind::ContainsStep, Direction::Outgoing) {
                edges.push((step.clone(), process.clone()));
            }
            for deal in store.neighbors(process, EdgeKind::OwnsProcess, Direction::Incoming) {
                edges.push((process.clone(), deal.clone()));
            }
        }

        let mut inputs: FxHashMap<NodeId, IndexSet<NodeId>> = FxHashMap::default();
        for (from, to) in &edges {
            inputs.entry(to.clone()).or_default().insert(from.clone());
        }

        let graph = DenseGraph::build(nodes, edges);
        let order = graph.topological_order().map_err(|members| {
            // The cycle guard keeps both dependency layers acyclic; reaching
            // this means the store was loaded without it.
            let graph_kind = if members.iter().any(|n| n.kind() == NodeKind::Step) {
                DependencyGraph::Step
            } else {
                DependencyGraph::Criterion
            };
            CycleDetected {
                graph: graph_kind,
                path: members,
            }
        })?;

        Ok(RollupPlan {
            graph,
            order,
            inputs,
        })
    }

    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    pub fn inputs(&self, node: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.inputs.get(node).into_iter().flat_map(|set| set.iter())
    }

    /// Nodes that are new in `self` or whose inputs differ from `previous`
    pub fn rewired_since(&self, previous: &RollupPlan) -> Vec<NodeId> {
        let known: FxHashSet<&NodeId> = previous.order.iter().collect();
        let empty = IndexSet::new();
        self.order
            .iter()
            .filter(|node| {
                if !known.contains(node) {
                    return true;
                }
                let now = self.inputs.get(*node).unwrap_or(&empty);
                let before = previous.inputs.get(*node).unwrap_or(&empty);
                now.len() != before.len() || now.iter().any(|input| !before.contains(input))
            })
            .cloned()
            .collect()
    }

    /// Forward closure of `seeds`, in evaluation order
    pub fn affected(&self, seeds: &[NodeId]) -> Vec<NodeId> {
        let reached: FxHashSet<NodeId> = self.graph.reachable_from(seeds).into_iter().collect();
        self.order
            .iter()
            .filter(|node| reached.contains(*node))
            .cloned()
            .collect()
    }
}

/// Criteria a signatory is evaluated against beyond its own: everything owned
/// by the actors it inherits its evaluation basis from.
pub(crate) fn inherited_basis(store: &GraphStore, actor: &ActorId) -> Vec<CriterionId> {
    let mut basis: IndexSet<CriterionId> = IndexSet::new();
    for source in store.neighbors(&actor.node(), EdgeKind::InheritsFrom, Direction::Outgoing) {
        basis.extend(
            store
                .neighbors(source, EdgeKind::OwnsCriterion, Direction::Outgoing)
                .into_iter()
                .filter_map(CriterionId::from_node),
        );
    }
    basis.into_iter().collect()
}
