//! Developer tooling: read-only inspection of a running engine.
//!
//! # Invariants
//! - Inspection never mutates the engine.

mod inspector;

pub use inspector::{ChunkInfo, EngineInspector, EngineSummary, VoxelInfo};

pub fn crate_info() -> &'static str {
    "voxstream-tools v0.1.0"
}
