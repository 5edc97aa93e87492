//! SalesBrain buying-process engine
//!
//! Models how a customer organization decides to buy, as a typed dependency
//! graph per deal, and keeps a derived rollup of completion state current
//! as the graph is edited.
//!
//! # Architecture
//!
//! - `graph`: typed nodes and edges of a deal, in-memory store
//! - `guard`: keeps step and criterion dependencies acyclic, including
//!   dependencies expanded through actor inheritance
//! - `rules`: structural write-time rules (usable steps, role rules,
//!   product consistency, timelines)
//! - `rollup`: criterion -> actor -> step -> process -> deal status, with
//!   incremental cascades
//! - `forecast`: the 10 forecast readiness dimensions
//! - `engine`: the staged write path, queries, history and the deal registry
//! - `persistence`: the snapshot exchanged with external storage
//!
//! ## Example Usage
//!
//! ```rust
//! use salesbrain::{DealEngine, EngineConfig, StepAttributes};
//! use salesbrain::graph::{DealOutcome, Person, Role, StepId};
//! use std::sync::Arc;
//!
//! let mut deal = DealEngine::new("acme", "Acme renewal", Arc::new(EngineConfig::default())).unwrap();
//! deal.add_product("analytics", "Analytics").unwrap();
//! deal.create_step("security", StepAttributes::named("Security review")).unwrap();
//! deal.assign_actor(&StepId::new("security"), "ciso", Person::new("Dana"), Role::Signatory)
//!     .unwrap();
//!
//! assert_eq!(deal.outcome(), DealOutcome::Open);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod graph;
pub mod guard;
pub mod persistence;
pub mod rollup;
pub mod rules;

// Re-export main types for convenience
pub use config::{ConfigError, ConfigResult, EngineConfig};
pub use engine::{
    ActorsByRole, BlockReason, BlockingLink, CriterionAttributes, DealEngine, DealRegistry,
    DependencyTarget, History, HistoryEntry, HistoryEvent, StepAttributes, TrackedEntity,
};
pub use error::{EngineError, EngineResult, ValidationError};
pub use forecast::{DimensionReport, ForecastDimension, ForecastEvaluator, Scorecard};
pub use graph::{GraphError, GraphResult, GraphStore};
pub use guard::{CycleDetected, CycleGuard, DependencyGraph};
pub use persistence::{GraphSnapshot, SnapshotError};
pub use rollup::{Blocker, RollupEngine, RollupSnapshot, Transition};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}
