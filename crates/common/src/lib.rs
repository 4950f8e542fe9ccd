//! Shared types for the voxstream engine.
//!
//! # Invariants
//! - A `VoxelKey` is the single identity of a cell across scheduler, chunk
//!   index, and instance records.
//! - Chunk coordinates floor toward negative infinity.

mod types;

pub use types::{Bounds, ChunkCoord, LodLevel, ParseError, VoxelKey, VoxelState};

pub fn crate_info() -> &'static str {
    "voxstream-common v0.1.0"
}
