//! Rollup engine
//!
//! Derived completion state, bottom-up: criterion -> actor -> step ->
//! process -> deal.

pub mod engine;
pub mod plan;

pub use engine::{
    ActorRollup, Blocker, CriterionRollup, ProcessRollup, RollupEngine, RollupSnapshot,
    StepRollup, Transition,
};
pub use plan::RollupPlan;
