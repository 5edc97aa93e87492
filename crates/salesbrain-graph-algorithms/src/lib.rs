pub mod common;
pub mod pathfinding;
pub mod topology;

pub use common::{GraphView, NodeId};
pub use pathfinding::{bfs, PathResult};
pub use topology::{reachable_from, topological_sort, CycleError};
