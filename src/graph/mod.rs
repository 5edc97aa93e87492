//! Buying-process graph store
//!
//! This module implements the entity/relationship model of a deal:
//! - Typed nodes (deal, process, steps, actors, criteria, products, timelines,
//!   evidence, engagement events)
//! - The 15 typed edge kinds, with endpoint rules
//! - In-memory storage with adjacency and kind indices
//! - Dense projections for the topology algorithms

pub mod edge;
pub mod node;
pub mod store;
pub mod types;
pub mod view;

// Re-export main types
pub use edge::{Edge, EdgeKind};
pub use node::{
    Actor, ActorRole, BuyingProcess, BuyingStep, Channel, Criterion, CriterionKind, Deal,
    DealOutcome, EngagementEvent, EvidenceArtifact, Node, Person, Product, Role, SignOff, Status,
    Timeline,
};
pub use store::{GraphError, GraphResult, GraphStore};
pub use types::{
    ActorId, CriterionId, DealId, Direction, EventId, EvidenceId, NodeId, NodeKind, ProcessId,
    ProductId, StepId, TimelineId,
};
pub use view::DenseGraph;
