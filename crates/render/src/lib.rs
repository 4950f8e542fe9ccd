//! Rendering adapter: renderer-agnostic instance pools.
//!
//! # Invariants
//! - Backends mirror slot allocation; they never decide it.
//! - A released slot draws nothing until it is written again.
//!
//! `HeadlessBackend` implements the trait without a GPU and records every
//! call, so the engine can be driven and inspected in tests and CLI runs.

mod backend;
mod camera;
mod headless;

pub use backend::{
    HIDDEN_POSITION, Instance, InstanceBackend, PoolId, RenderView, lod_scale, state_color,
};
pub use camera::{OrbitCamera, Ray};
pub use headless::{HeadlessBackend, HeadlessCounters, HeadlessPool};

pub fn crate_info() -> &'static str {
    "voxstream-render v0.1.0"
}
