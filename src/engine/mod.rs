//! Deal engine
//!
//! The write path (staged mutation, rules, cycle guard, rollup cascade,
//! atomic swap), the read-side queries and the registry of live deals.

pub mod deal;
pub mod history;
pub mod query;
pub mod registry;
pub mod request;

pub use deal::DealEngine;
pub use history::{History, HistoryEntry, HistoryEvent};
pub use query::{ActorsByRole, BlockReason, BlockingLink};
pub use registry::{DealRegistry, SharedDeal};
pub use request::{CriterionAttributes, DependencyTarget, StepAttributes, TrackedEntity};
