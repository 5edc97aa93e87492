//! Persistence boundary
//!
//! Storage itself belongs to an external collaborator; this module defines
//! the snapshot it exchanges with the engine.

pub mod snapshot;

pub use snapshot::{GraphSnapshot, SnapshotError, SNAPSHOT_VERSION};
