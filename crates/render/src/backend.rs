use glam::{Mat4, Vec3};
use voxstream_common::{ChunkCoord, LodLevel, VoxelKey, VoxelState};

/// World position hidden instances are parked at.
pub const HIDDEN_POSITION: Vec3 = Vec3::splat(1.0e7);

/// Identity of one GPU-resident instance pool: a (chunk, state, LOD) bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolId {
    pub chunk: ChunkCoord,
    pub state: VoxelState,
    pub lod: LodLevel,
}

impl PoolId {
    pub fn new(chunk: ChunkCoord, state: VoxelState, lod: LodLevel) -> Self {
        Self { chunk, state, lod }
    }
}

/// Per-instance data written into a pool slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instance {
    pub position: Vec3,
    pub scale: f32,
    pub color: [f32; 4],
}

impl Instance {
    /// Instance for a voxel in the given bucket.
    pub fn for_voxel(key: VoxelKey, state: VoxelState, lod: LodLevel) -> Self {
        Self {
            position: key.position(),
            scale: lod_scale(lod),
            color: state_color(state),
        }
    }

    /// Degenerate instance far outside the visible world.
    pub fn hidden() -> Self {
        Self {
            position: HIDDEN_POSITION,
            scale: 0.0,
            color: [0.0; 4],
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.scale == 0.0
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            glam::Quat::IDENTITY,
            self.position,
        )
    }
}

/// Display color per voxel state.
pub fn state_color(state: VoxelState) -> [f32; 4] {
    match state {
        VoxelState::Walkable => [0.25, 0.75, 0.35, 1.0],
        VoxelState::Passable => [0.35, 0.55, 0.9, 1.0],
        VoxelState::Wall => [0.55, 0.55, 0.6, 1.0],
        VoxelState::Unknown => [0.3, 0.3, 0.3, 1.0],
        VoxelState::CurrentPosition => [1.0, 0.8, 0.0, 1.0],
        VoxelState::CurrentTarget => [1.0, 0.2, 0.3, 1.0],
    }
}

/// Cube edge length per LOD; LOW shrinks to a point-like marker.
pub fn lod_scale(lod: LodLevel) -> f32 {
    match lod {
        LodLevel::High => 0.95,
        LodLevel::Medium => 0.8,
        LodLevel::Low => 0.45,
        LodLevel::Culled => 0.0,
    }
}

/// Camera snapshot handed to a backend for one draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderView {
    pub eye: Vec3,
    pub target: Vec3,
    pub view_proj: Mat4,
}

/// GPU-side instance storage and drawing.
///
/// The engine owns slot allocation; a backend only mirrors it. Every
/// method is infallible from the engine's point of view.
pub trait InstanceBackend {
    /// Allocate storage for a pool of `capacity` instances.
    fn create_pool(&mut self, pool: PoolId, capacity: u32);

    fn write_instance(&mut self, pool: PoolId, slot: u32, instance: &Instance);

    /// Hide a released slot so it draws nothing until reused.
    fn hide_instance(&mut self, pool: PoolId, slot: u32) {
        self.write_instance(pool, slot, &Instance::hidden());
    }

    /// Number of leading slots the draw covers.
    fn set_active_count(&mut self, pool: PoolId, count: u32);

    fn set_pool_visible(&mut self, pool: PoolId, visible: bool);

    /// Free the pool's storage.
    fn release_pool(&mut self, pool: PoolId);

    /// Free every pool.
    fn release_all(&mut self);

    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Draw every visible pool.
    fn draw(&mut self, view: &RenderView);
}
