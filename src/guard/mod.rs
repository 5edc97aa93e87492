//! Cycle guard
//!
//! Keeps the step-dependency graph and the materialized criterion-dependency
//! graph (direct edges plus live actor-inheritance expansion) acyclic.

pub mod cycle;
pub mod materialize;

pub use cycle::{CycleDetected, CycleGuard, DependencyGraph};
pub use materialize::{CriterionGraph, DependencyEdge, ProposedEdge, Via};
