//! tracer3d-core: bidirectional A* search over 3-D scalar volumes.
//!
//! The geometric core of an interactive neurite tracer: given a read-only
//! volume and two voxel endpoints, finds a minimum-cost connected path, or
//! floods a cost-bounded frontier that can be persisted and resumed.

pub mod config;
pub mod coord;
pub mod cost;
pub mod engine;
pub mod error;
pub mod fill;
pub mod heuristic;
pub mod node;
pub mod queue;
pub mod volume;
pub mod voxel_map;

pub use config::{EngineConfig, SliceBackend};
pub use coord::{Bounds, Coord, PhysicalPath};
pub use cost::{CostOracle, InvertedIntensityCost, ReciprocalIntensityCost};
pub use engine::{BidirectionalEngine, CancelToken, ProgressReport, SearchEvent, UnidirectionalEngine};
pub use error::{TracerError, TracerResult};
pub use fill::{from_fill, read_from, to_fill, write_to, FillEntry, FillRecord};
pub use heuristic::{EuclideanHeuristic, HeuristicOracle, ZeroHeuristic};
pub use node::{NodeState, SearchNode};
pub use volume::{DenseVolume, VolumeAccessor};
pub use voxel_map::SparseVoxelMap;

/// Returns the crate version for linkage diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
