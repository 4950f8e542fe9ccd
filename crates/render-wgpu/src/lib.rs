//! wgpu instance backend for the voxel engine.
//!
//! Draws a ground grid and one instanced cube batch per (chunk, state, LOD)
//! pool. Frames are presented inside `draw`, so a frame the engine skips
//! leaves the last image on screen.
//!
//! # Invariants
//! - Pools mirror the engine's slot allocation; the backend never reorders slots.
//! - A pool's draw covers only its active range.

mod gpu;
mod shaders;

pub use gpu::WgpuBackend;
pub use shaders::{GRID_SHADER, VOXEL_SHADER};
