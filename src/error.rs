//! Error types for the engine API
//!
//! Every error rejects exactly one mutation; committed state is never touched.

use crate::graph::{
    ActorId, CriterionId, DealId, GraphError, NodeId, ProductId, Role, StepId,
};
use crate::guard::CycleDetected;
use crate::rollup::Blocker;
use chrono::NaiveDate;
use thiserror::Error;

/// Structural rule violations found by the rule validator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{entity} is missing: {}", .missing.join(", "))]
    IncompleteEntity {
        entity: NodeId,
        missing: Vec<&'static str>,
    },

    #[error("Step {step} has no signatory")]
    MissingSignatory { step: StepId },

    #[error("{role} {actor} has no mandatory criterion or evaluation basis")]
    MissingCriterion { actor: ActorId, role: Role },

    #[error("{entity} is due {due}, after {limit_owner} which is due {limit}")]
    TimelineViolation {
        entity: NodeId,
        due: NaiveDate,
        limit_owner: NodeId,
        limit: NaiveDate,
    },

    #[error("Step {step} needs different actors for products {}; split the step", join(.products))]
    ActorMismatchAcrossProducts {
        step: StepId,
        products: Vec<ProductId>,
    },

    #[error("{entity} is tagged with product {product}, which its owner does not carry")]
    UntaggedProduct { entity: NodeId, product: ProductId },

    #[error("Influencer {actor} cannot own mandatory criterion {criterion}")]
    CriterionKindMismatch {
        actor: ActorId,
        criterion: CriterionId,
    },

    #[error("Actor {actor} is not a signatory")]
    NotSignatory { actor: ActorId },

    #[error("Signatory {actor} cannot inherit its evaluation basis from {source_actor}: {reason}")]
    InvalidInheritance {
        actor: ActorId,
        source_actor: ActorId,
        reason: &'static str,
    },
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors returned by the engine API
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    CycleDetected(#[from] CycleDetected),

    #[error("Graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("Signatory {signatory} has no evaluation basis to sign off against")]
    NoEvaluationBasis { signatory: ActorId },

    #[error("Step {step} cannot complete: {}", join(.blockers))]
    StepNotReady { step: StepId, blockers: Vec<Blocker> },

    #[error("Deal {0} not found")]
    DealNotFound(DealId),

    #[error("Deal {0} already exists")]
    DealExists(DealId),

    #[error("Deal {0} is closed lost")]
    DealClosed(DealId),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
