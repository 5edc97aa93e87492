//! Typed edges of the buying-process graph
//!
//! An edge is identified by `(kind, from, to)`; there are no parallel edges of
//! the same kind between the same pair of nodes.

use super::types::{NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The 15 relationship kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Deal -> Process
    OwnsProcess,
    /// Deal -> Product
    OffersProduct,
    /// Process -> Step
    ContainsStep,
    /// Step -> prerequisite Step
    StepDependsOn,
    /// Step -> Product
    StepProduct,
    /// Step -> Actor
    AssignsActor,
    /// Actor -> Criterion
    OwnsCriterion,
    /// Actor -> Actor (organizational lookup only)
    ReportsTo,
    /// Criterion -> Product
    CriterionProduct,
    /// Criterion -> Criterion
    CriterionDependsOn,
    /// Criterion -> Actor (depends on every criterion the actor owns), or
    /// Signatory Actor -> Actor (evaluation basis inherited from that actor)
    InheritsFrom,
    /// Step | Actor | Criterion -> Timeline
    HasTimeline,
    /// Step | Criterion -> Evidence
    HasEvidence,
    /// Actor -> Event
    ParticipatedIn,
    /// Evidence -> Event
    EvidencedBy,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 15] = [
        EdgeKind::OwnsProcess,
        EdgeKind::OffersProduct,
        EdgeKind::ContainsStep,
        EdgeKind::StepDependsOn,
        EdgeKind::StepProduct,
        EdgeKind::AssignsActor,
        EdgeKind::OwnsCriterion,
        EdgeKind::ReportsTo,
        EdgeKind::CriterionProduct,
        EdgeKind::CriterionDependsOn,
        EdgeKind::InheritsFrom,
        EdgeKind::HasTimeline,
        EdgeKind::HasEvidence,
        EdgeKind::ParticipatedIn,
        EdgeKind::EvidencedBy,
    ];

    /// Whether an edge of this kind may connect `from` to `to`
    pub fn allows(&self, from: NodeKind, to: NodeKind) -> bool {
        use NodeKind::*;
        match self {
            EdgeKind::OwnsProcess => from == Deal && to == Process,
            EdgeKind::OffersProduct => from == Deal && to == Product,
            EdgeKind::ContainsStep => from == Process && to == Step,
            EdgeKind::StepDependsOn => from == Step && to == Step,
            EdgeKind::StepProduct => from == Step && to == Product,
            EdgeKind::AssignsActor => from == Step && to == Actor,
            EdgeKind::OwnsCriterion => from == Actor && to == Criterion,
            EdgeKind::ReportsTo => from == Actor && to == Actor,
            EdgeKind::CriterionProduct => from == Criterion && to == Product,
            EdgeKind::CriterionDependsOn => from == Criterion && to == Criterion,
            EdgeKind::InheritsFrom => matches!(from, Criterion | Actor) && to == Actor,
            EdgeKind::HasTimeline => matches!(from, Step | Actor | Criterion) && to == Timeline,
            EdgeKind::HasEvidence => matches!(from, Step | Criterion) && to == Evidence,
            EdgeKind::ParticipatedIn => from == Actor && to == Event,
            EdgeKind::EvidencedBy => from == Evidence && to == Event,
        }
    }

    /// Dependency edges: subject to the cycle guard and referential integrity
    pub fn is_dependency(&self) -> bool {
        matches!(
            self,
            EdgeKind::StepDependsOn | EdgeKind::CriterionDependsOn | EdgeKind::InheritsFrom
        )
    }

    /// Ownership edges: the target's lifetime is bound to the source
    pub fn is_ownership(&self) -> bool {
        matches!(
            self,
            EdgeKind::OwnsProcess
                | EdgeKind::ContainsStep
                | EdgeKind::AssignsActor
                | EdgeKind::OwnsCriterion
                | EdgeKind::HasTimeline
                | EdgeKind::HasEvidence
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::OwnsProcess => "OWNS_PROCESS",
            EdgeKind::OffersProduct => "OFFERS_PRODUCT",
            EdgeKind::ContainsStep => "CONTAINS_STEP",
            EdgeKind::StepDependsOn => "STEP_DEPENDS_ON",
            EdgeKind::StepProduct => "STEP_PRODUCT",
            EdgeKind::AssignsActor => "ASSIGNS_ACTOR",
            EdgeKind::OwnsCriterion => "OWNS_CRITERION",
            EdgeKind::ReportsTo => "REPORTS_TO",
            EdgeKind::CriterionProduct => "CRITERION_PRODUCT",
            EdgeKind::CriterionDependsOn => "CRITERION_DEPENDS_ON",
            EdgeKind::InheritsFrom => "INHERITS_FROM",
            EdgeKind::HasTimeline => "HAS_TIMELINE",
            EdgeKind::HasEvidence => "HAS_EVIDENCE",
            EdgeKind::ParticipatedIn => "PARTICIPATED_IN",
            EdgeKind::EvidencedBy => "EVIDENCED_BY",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, typed edge; persisted as the `{kind, from, to}` edge table row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Edge {
    pub kind: EdgeKind,
    /// Source node (edge goes FROM this node)
    pub from: NodeId,
    /// Target node (edge goes TO this node)
    pub to: NodeId,
}

impl Edge {
    pub fn new(kind: EdgeKind, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        Edge {
            kind,
            from: from.into(),
            to: to.into(),
        }
    }

    /// Check if this edge touches `node` at either end
    pub fn touches(&self, node: &NodeId) -> bool {
        &self.from == node || &self.to == node
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -[{}]-> {}", self.from, self.kind, self.to)
    }
}
