//! Materialized criterion dependency graph
//!
//! A criterion may depend on other criteria directly or on an actor. An actor
//! dependency expands to "every criterion that actor owns right now", so the
//! expansion is recomputed from the store's ownership edges every time it is
//! needed and never cached as a second source of truth.

use crate::graph::{ActorId, CriterionId, Direction, EdgeKind, GraphStore, NodeKind};
use indexmap::{IndexMap, IndexSet};

/// How a materialized dependency came to exist
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Via {
    Direct,
    /// Expanded from an actor dependency on this actor
    Inherited(ActorId),
}

/// One materialized edge: `from` depends on `to`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyEdge {
    pub from: CriterionId,
    pub to: CriterionId,
    pub via: Via,
}

/// A structural change to the criterion graph awaiting validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposedEdge {
    /// `criterion` depends on `target`
    DependsOn {
        criterion: CriterionId,
        target: CriterionId,
    },
    /// `criterion` depends on every criterion `actor` owns
    Inherits {
        criterion: CriterionId,
        actor: ActorId,
    },
    /// `criterion` (possibly new) joins `actor`'s criteria, re-expanding every
    /// inheritor of `actor`
    Owns {
        actor: ActorId,
        criterion: CriterionId,
    },
}

/// Base relations of the criterion layer; the materialized edges are derived
/// from these on demand.
#[derive(Debug, Clone, Default)]
pub struct CriterionGraph {
    criteria: IndexSet<CriterionId>,
    direct: IndexMap<CriterionId, IndexSet<CriterionId>>,
    inherits: IndexMap<CriterionId, IndexSet<ActorId>>,
    owned: IndexMap<ActorId, IndexSet<CriterionId>>,
}

impl CriterionGraph {
    /// Read the current criterion layer out of the store
    pub fn materialize(store: &GraphStore) -> Self {
        let mut graph = CriterionGraph::default();

        for node in store.ids_of_kind(NodeKind::Criterion) {
            let Some(criterion) = CriterionId::from_node(node) else {
                continue;
            };
            graph.criteria.insert(criterion.clone());

            let direct: IndexSet<CriterionId> = store
                .neighbors(node, EdgeKind::CriterionDependsOn, Direction::Outgoing)
                .into_iter()
                .filter_map(CriterionId::from_node)
                .collect();
            if !direct.is_empty() {
                graph.direct.insert(criterion.clone(), direct);
            }

            let inherits: IndexSet<ActorId> = store
                .neighbors(node, EdgeKind::InheritsFrom, Direction::Outgoing)
                .into_iter()
                .filter_map(ActorId::from_node)
                .collect();
            if !inherits.is_empty() {
                graph.inherits.insert(criterion, inherits);
            }
        }

        for node in store.ids_of_kind(NodeKind::Actor) {
            let Some(actor) = ActorId::from_node(node) else {
                continue;
            };
            let owned: IndexSet<CriterionId> = store
                .neighbors(node, EdgeKind::OwnsCriterion, Direction::Outgoing)
                .into_iter()
                .filter_map(CriterionId::from_node)
                .collect();
            if !owned.is_empty() {
                graph.owned.insert(actor, owned);
            }
        }

        graph
    }

    /// Apply a proposed change to the base relations and return the
    /// materialized edges it introduces.
    pub fn apply(&mut self, proposed: &ProposedEdge) -> Vec<DependencyEdge> {
        match proposed {
            ProposedEdge::DependsOn { criterion, target } => {
                self.criteria.insert(criterion.clone());
                self.criteria.insert(target.clone());
                self.direct
                    .entry(criterion.clone())
                    .or_default()
                    .insert(target.clone());
                vec![DependencyEdge {
                    from: criterion.clone(),
                    to: target.clone(),
                    via: Via::Direct,
                }]
            }
            ProposedEdge::Inherits { criterion, actor } => {
                self.criteria.insert(criterion.clone());
                self.inherits
                    .entry(criterion.clone())
                    .or_default()
                    .insert(actor.clone());
                self.owned_by(actor)
                    .map(|to| DependencyEdge {
                        from: criterion.clone(),
                        to: to.clone(),
                        via: Via::Inherited(actor.clone()),
                    })
                    .collect()
            }
            ProposedEdge::Owns { actor, criterion } => {
                self.criteria.insert(criterion.clone());
                self.owned
                    .entry(actor.clone())
                    .or_default()
                    .insert(criterion.clone());
                self.inheritors_of(actor)
                    .into_iter()
                    .map(|from| DependencyEdge {
                        from,
                        to: criterion.clone(),
                        via: Via::Inherited(actor.clone()),
                    })
                    .collect()
            }
        }
    }

    fn owned_by<'a>(&'a self, actor: &ActorId) -> impl Iterator<Item = &'a CriterionId> + 'a {
        self.owned.get(actor).into_iter().flat_map(|set| set.iter())
    }

    /// Criteria holding an actor dependency on `actor`
    pub fn inheritors_of(&self, actor: &ActorId) -> Vec<CriterionId> {
        self.inherits
            .iter()
            .filter(|(_, actors)| actors.contains(actor))
            .map(|(criterion, _)| criterion.clone())
            .collect()
    }

    pub fn criteria(&self) -> impl Iterator<Item = &CriterionId> {
        self.criteria.iter()
    }

    /// Expanded dependencies of `criterion`: direct first, then inherited,
    /// de-duplicated by target (a direct edge wins over an inherited one).
    pub fn dependencies(&self, criterion: &CriterionId) -> Vec<DependencyEdge> {
        let mut seen: IndexSet<CriterionId> = IndexSet::new();
        let mut edges = Vec::new();

        if let Some(direct) = self.direct.get(criterion) {
            for to in direct {
                if seen.insert(to.clone()) {
                    edges.push(DependencyEdge {
                        from: criterion.clone(),
                        to: to.clone(),
                        via: Via::Direct,
                    });
                }
            }
        }
        if let Some(actors) = self.inherits.get(criterion) {
            for actor in actors {
                for to in self.owned_by(actor) {
                    if seen.insert(to.clone()) {
                        edges.push(DependencyEdge {
                            from: criterion.clone(),
                            to: to.clone(),
                            via: Via::Inherited(actor.clone()),
                        });
                    }
                }
            }
        }
        edges
    }

    /// Every materialized edge in the graph
    pub fn edges(&self) -> Vec<DependencyEdge> {
        self.criteria
            .iter()
            .flat_map(|criterion| self.dependencies(criterion))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(id: &str) -> CriterionId {
        CriterionId::new(id)
    }

    fn a(id: &str) -> ActorId {
        ActorId::new(id)
    }

    #[test]
    fn test_inherits_expands_to_owned_criteria() {
        let mut graph = CriterionGraph::default();
        graph.apply(&ProposedEdge::Owns { actor: a("e"), criterion: c("c4") });
        graph.apply(&ProposedEdge::Owns { actor: a("e"), criterion: c("c5") });

        let derived = graph.apply(&ProposedEdge::Inherits { criterion: c("c3"), actor: a("e") });
        let targets: Vec<_> = derived.iter().map(|e| e.to.as_str()).collect();
        assert_eq!(targets, vec!["c4", "c5"]);
        assert!(derived.iter().all(|e| e.via == Via::Inherited(a("e"))));
    }

    #[test]
    fn test_new_owned_criterion_reexpands_inheritors() {
        let mut graph = CriterionGraph::default();
        graph.apply(&ProposedEdge::Inherits { criterion: c("c3"), actor: a("e") });
        assert!(graph.dependencies(&c("c3")).is_empty());

        let derived = graph.apply(&ProposedEdge::Owns { actor: a("e"), criterion: c("c9") });
        assert_eq!(
            derived,
            vec![DependencyEdge { from: c("c3"), to: c("c9"), via: Via::Inherited(a("e")) }]
        );
        assert_eq!(graph.dependencies(&c("c3")).len(), 1);
    }

    #[test]
    fn test_direct_edge_wins_over_inherited() {
        let mut graph = CriterionGraph::default();
        graph.apply(&ProposedEdge::Owns { actor: a("e"), criterion: c("c4") });
        graph.apply(&ProposedEdge::Inherits { criterion: c("c1"), actor: a("e") });
        graph.apply(&ProposedEdge::DependsOn { criterion: c("c1"), target: c("c4") });

        let deps = graph.dependencies(&c("c1"));
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].via, Via::Direct);
    }
}
