//! In-memory graph storage implementation
//!
//! Pure graph mutations over typed nodes and edges. No business validation
//! happens here; that is layered above in the rule validator and cycle guard.

use super::edge::{Edge, EdgeKind};
use super::node::{
    Actor, BuyingStep, Criterion, Deal, EngagementEvent, EvidenceArtifact, Node, Product, Timeline,
};
use super::types::{
    ActorId, CriterionId, Direction, EventId, EvidenceId, NodeId, NodeKind, ProductId, StepId,
    TimelineId,
};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Node {0} already exists")]
    DuplicateNode(NodeId),

    #[error("Edge {0} already exists")]
    DuplicateEdge(Edge),

    #[error("Unknown reference: node {0} does not exist")]
    UnknownReference(NodeId),

    #[error("Edge {0} not found")]
    EdgeNotFound(Edge),

    #[error("Invalid endpoints for {kind}: {from} -> {to}")]
    InvalidEndpoint {
        kind: EdgeKind,
        from: NodeId,
        to: NodeId,
    },

    #[error("Cannot remove {node}: still a dependency target of {}", join_ids(.dependents))]
    ReferentialIntegrity {
        node: NodeId,
        dependents: Vec<NodeId>,
    },
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

pub type GraphResult<T> = Result<T, GraphError>;

/// In-memory graph storage
///
/// Uses insertion-ordered maps so iteration (and therefore export) is deterministic:
/// - nodes: NodeId -> Node
/// - edges: set of (kind, from, to)
/// - outgoing / incoming: NodeId -> (EdgeKind, neighbor) adjacency lists
/// - kind_index: NodeKind -> NodeIds
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    /// Node storage
    nodes: IndexMap<NodeId, Node>,

    /// Edge table
    edges: IndexSet<Edge>,

    /// Outgoing edges for each node (adjacency list)
    outgoing: HashMap<NodeId, IndexSet<(EdgeKind, NodeId)>>,

    /// Incoming edges for each node (adjacency list)
    incoming: HashMap<NodeId, IndexSet<(EdgeKind, NodeId)>>,

    /// Kind index for fast lookups
    kind_index: HashMap<NodeKind, IndexSet<NodeId>>,
}

macro_rules! typed_accessors {
    ($($get:ident, $get_mut:ident, $id:ty, $variant:ident, $payload:ty;)*) => {
        $(
            pub fn $get(&self, id: &$id) -> Option<&$payload> {
                match self.nodes.get(&id.node()) {
                    Some(Node::$variant(payload)) => Some(payload),
                    _ => None,
                }
            }

            pub fn $get_mut(&mut self, id: &$id) -> Option<&mut $payload> {
                match self.nodes.get_mut(&id.node()) {
                    Some(Node::$variant(payload)) => Some(payload),
                    _ => None,
                }
            }
        )*
    };
}

impl GraphStore {
    /// Create a new empty graph store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; its identity comes from the payload
    pub fn add_node(&mut self, node: Node) -> GraphResult<NodeId> {
        let id = node.id();
        if self.nodes.contains_key(&id) {
            return Err(GraphError::DuplicateNode(id));
        }
        self.kind_index
            .entry(id.kind())
            .or_default()
            .insert(id.clone());
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Get a node by ID
    pub fn get(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get a mutable node by ID
    pub fn get_mut(&mut self, id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id)
    }

    /// Check if a node exists
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Remove a node and every edge touching it.
    ///
    /// Fails while incoming dependency edges still target the node.
    pub fn remove_node(&mut self, id: &NodeId) -> GraphResult<Node> {
        if !self.nodes.contains_key(id) {
            return Err(GraphError::UnknownReference(id.clone()));
        }

        let dependents = self.dependents(id);
        if !dependents.is_empty() {
            return Err(GraphError::ReferentialIntegrity {
                node: id.clone(),
                dependents,
            });
        }

        let incident: Vec<Edge> = self
            .adjacency(id, Direction::Outgoing)
            .map(|(kind, to)| Edge::new(kind, id.clone(), to.clone()))
            .chain(
                self.adjacency(id, Direction::Incoming)
                    .map(|(kind, from)| Edge::new(kind, from.clone(), id.clone())),
            )
            .collect();
        for edge in incident {
            self.unlink(&edge);
        }

        self.outgoing.remove(id);
        self.incoming.remove(id);
        if let Some(ids) = self.kind_index.get_mut(&id.kind()) {
            ids.shift_remove(id);
        }
        self.nodes
            .shift_remove(id)
            .ok_or_else(|| GraphError::UnknownReference(id.clone()))
    }

    /// Add a typed edge between two existing nodes
    pub fn add_edge(&mut self, kind: EdgeKind, from: NodeId, to: NodeId) -> GraphResult<()> {
        if !self.nodes.contains_key(&from) {
            return Err(GraphError::UnknownReference(from));
        }
        if !self.nodes.contains_key(&to) {
            return Err(GraphError::UnknownReference(to));
        }
        if !kind.allows(from.kind(), to.kind()) {
            return Err(GraphError::InvalidEndpoint { kind, from, to });
        }

        let edge = Edge::new(kind, from.clone(), to.clone());
        if self.edges.contains(&edge) {
            return Err(GraphError::DuplicateEdge(edge));
        }

        self.outgoing
            .entry(from.clone())
            .or_default()
            .insert((kind, to.clone()));
        self.incoming.entry(to).or_default().insert((kind, from));
        self.edges.insert(edge);
        Ok(())
    }

    /// Remove a typed edge
    pub fn remove_edge(&mut self, kind: EdgeKind, from: &NodeId, to: &NodeId) -> GraphResult<()> {
        let edge = Edge::new(kind, from.clone(), to.clone());
        if !self.edges.contains(&edge) {
            return Err(GraphError::EdgeNotFound(edge));
        }
        self.unlink(&edge);
        Ok(())
    }

    fn unlink(&mut self, edge: &Edge) {
        if let Some(out) = self.outgoing.get_mut(&edge.from) {
            out.shift_remove(&(edge.kind, edge.to.clone()));
        }
        if let Some(inc) = self.incoming.get_mut(&edge.to) {
            inc.shift_remove(&(edge.kind, edge.from.clone()));
        }
        self.edges.shift_remove(edge);
    }

    pub fn has_edge(&self, kind: EdgeKind, from: &NodeId, to: &NodeId) -> bool {
        self.outgoing
            .get(from)
            .map(|out| out.contains(&(kind, to.clone())))
            .unwrap_or(false)
    }

    fn adjacency(
        &self,
        node: &NodeId,
        direction: Direction,
    ) -> impl Iterator<Item = (EdgeKind, &NodeId)> + '_ {
        let list = match direction {
            Direction::Outgoing => self.outgoing.get(node),
            Direction::Incoming => self.incoming.get(node),
        };
        list.into_iter()
            .flat_map(|set| set.iter().map(|(kind, other)| (*kind, other)))
    }

    /// Neighbors of `node` across edges of `kind`, in insertion order
    pub fn neighbors(&self, node: &NodeId, kind: EdgeKind, direction: Direction) -> Vec<&NodeId> {
        self.adjacency(node, direction)
            .filter(|(k, _)| *k == kind)
            .map(|(_, other)| other)
            .collect()
    }

    /// Nodes whose dependency edges (step, criterion or inheritance) target `node`
    pub fn dependents(&self, node: &NodeId) -> Vec<NodeId> {
        let mut dependents: Vec<NodeId> = self
            .adjacency(node, Direction::Incoming)
            .filter(|(kind, _)| kind.is_dependency())
            .map(|(_, from)| from.clone())
            .collect();
        dependents.dedup();
        dependents
    }

    /// All nodes of a kind, in insertion order
    pub fn ids_of_kind(&self, kind: NodeKind) -> Vec<&NodeId> {
        self.kind_index
            .get(&kind)
            .map(|ids| ids.iter().collect())
            .unwrap_or_default()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Get total number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Get total number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Clear all data
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.outgoing.clear();
        self.incoming.clear();
        self.kind_index.clear();
    }

    /// The deal node; a deal's store holds exactly one
    pub fn deal(&self) -> Option<&Deal> {
        self.ids_of_kind(NodeKind::Deal)
            .first()
            .and_then(|id| match self.nodes.get(*id) {
                Some(Node::Deal(deal)) => Some(deal),
                _ => None,
            })
    }

    pub fn deal_mut(&mut self) -> Option<&mut Deal> {
        self.nodes.values_mut().find_map(|node| match node {
            Node::Deal(deal) => Some(deal),
            _ => None,
        })
    }

    typed_accessors! {
        step, step_mut, StepId, Step, BuyingStep;
        actor, actor_mut, ActorId, Actor, Actor;
        criterion, criterion_mut, CriterionId, Criterion, Criterion;
        product, product_mut, ProductId, Product, Product;
        timeline, timeline_mut, TimelineId, Timeline, Timeline;
        evidence, evidence_mut, EvidenceId, Evidence, EvidenceArtifact;
        event, event_mut, EventId, Event, EngagementEvent;
    }
}
