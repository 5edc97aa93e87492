//! Core type definitions for the buying-process graph

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a node in the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Deal,
    Process,
    Step,
    Actor,
    Criterion,
    Product,
    Timeline,
    Evidence,
    Event,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Deal => "deal",
            NodeKind::Process => "process",
            NodeKind::Step => "step",
            NodeKind::Actor => "actor",
            NodeKind::Criterion => "criterion",
            NodeKind::Product => "product",
            NodeKind::Timeline => "timeline",
            NodeKind::Evidence => "evidence",
            NodeKind::Event => "event",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unique identifier for a node: identifiers are unique within their kind
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct NodeId {
    pub kind: NodeKind,
    pub key: String,
}

impl NodeId {
    pub fn new(kind: NodeKind, key: impl Into<String>) -> Self {
        NodeId { kind, key: key.into() }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.key)
    }
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident => $kind:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Graph address of this entity
            pub fn node(&self) -> NodeId {
                NodeId::new(NodeKind::$kind, self.0.clone())
            }

            /// Recover the typed id from a graph address of the right kind
            pub fn from_node(id: &NodeId) -> Option<Self> {
                (id.kind == NodeKind::$kind).then(|| $name(id.key.clone()))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<$name> for NodeId {
            fn from(id: $name) -> Self {
                NodeId::new(NodeKind::$kind, id.0)
            }
        }

        impl From<&$name> for NodeId {
            fn from(id: &$name) -> Self {
                id.node()
            }
        }
    };
}

entity_id!(
    /// Identifier of a deal
    DealId => Deal
);
entity_id!(
    /// Identifier of a deal's buying process
    ProcessId => Process
);
entity_id!(
    /// Identifier of a buying step
    StepId => Step
);
entity_id!(
    /// Identifier of an actor-role assignment
    ActorId => Actor
);
entity_id!(CriterionId => Criterion);
entity_id!(ProductId => Product);
entity_id!(TimelineId => Timeline);
entity_id!(EvidenceId => Evidence);
entity_id!(
    /// Identifier of an engagement event (call, email, meeting)
    EventId => Event
);

impl ProcessId {
    /// The process owned by `deal`
    pub fn for_deal(deal: &DealId) -> Self {
        ProcessId::new(format!("{}/process", deal.as_str()))
    }
}

impl TimelineId {
    /// The timeline attached to `owner`; each owner carries at most one
    pub fn for_owner(owner: &NodeId) -> Self {
        TimelineId::new(owner.to_string())
    }
}

impl EvidenceId {
    /// Fresh random id for artifacts submitted without one
    pub fn generate() -> Self {
        EvidenceId::new(uuid::Uuid::new_v4().to_string())
    }
}

/// Edge traversal direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Outgoing,
    Incoming,
}
