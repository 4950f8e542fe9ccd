use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::backend::{Instance, InstanceBackend, PoolId, RenderView};

/// CPU mirror of one pool.
#[derive(Debug, Clone)]
pub struct HeadlessPool {
    pub capacity: u32,
    pub active_count: u32,
    pub visible: bool,
    pub instances: Vec<Option<Instance>>,
}

impl HeadlessPool {
    /// Slots inside the active range holding a drawable instance.
    pub fn drawn(&self) -> usize {
        self.instances
            .iter()
            .take(self.active_count as usize)
            .filter(|slot| slot.is_some_and(|inst| !inst.is_hidden()))
            .count()
    }
}

/// Call counters, for assertions and the CLI summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeadlessCounters {
    pub pools_created: u64,
    pub pools_released: u64,
    pub writes: u64,
    pub hides: u64,
    pub draws: u64,
}

/// Backend with no GPU: keeps every pool in memory and counts calls.
///
/// Stands in for the GPU in tests and headless runs.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    pools: BTreeMap<PoolId, HeadlessPool>,
    counters: HeadlessCounters,
    last_view: Option<RenderView>,
    size: (u32, u32),
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool(&self, id: PoolId) -> Option<&HeadlessPool> {
        self.pools.get(&id)
    }

    pub fn pools(&self) -> impl Iterator<Item = (&PoolId, &HeadlessPool)> {
        self.pools.iter()
    }

    pub fn pool_count(&self) -> usize {
        self.pools.len()
    }

    /// Instances a draw would emit right now.
    pub fn drawn_instances(&self) -> usize {
        self.pools
            .values()
            .filter(|pool| pool.visible)
            .map(HeadlessPool::drawn)
            .sum()
    }

    pub fn counters(&self) -> HeadlessCounters {
        self.counters
    }

    pub fn last_view(&self) -> Option<&RenderView> {
        self.last_view.as_ref()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Human-readable summary of pool contents.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "=== Headless backend (pools={}, drawn={}, draws={}) ===",
            self.pools.len(),
            self.drawn_instances(),
            self.counters.draws
        );
        if let Some(view) = &self.last_view {
            let _ = writeln!(
                out,
                "Camera: eye=({:.1}, {:.1}, {:.1}) target=({:.1}, {:.1}, {:.1})",
                view.eye.x, view.eye.y, view.eye.z, view.target.x, view.target.y, view.target.z
            );
        }
        for (id, pool) in &self.pools {
            let _ = writeln!(
                out,
                "  {} {:?}/{:?}: drawn={} active={} cap={}{}",
                id.chunk,
                id.state,
                id.lod,
                pool.drawn(),
                pool.active_count,
                pool.capacity,
                if pool.visible { "" } else { " (hidden)" }
            );
        }
        out
    }

    fn pool_mut(&mut self, id: PoolId) -> Option<&mut HeadlessPool> {
        let pool = self.pools.get_mut(&id);
        if pool.is_none() {
            tracing::warn!(?id, "headless backend: write to unknown pool");
        }
        pool
    }
}

impl InstanceBackend for HeadlessBackend {
    fn create_pool(&mut self, pool: PoolId, capacity: u32) {
        self.counters.pools_created += 1;
        self.pools.insert(
            pool,
            HeadlessPool {
                capacity,
                active_count: 0,
                visible: true,
                instances: Vec::new(),
            },
        );
    }

    fn write_instance(&mut self, pool: PoolId, slot: u32, instance: &Instance) {
        if instance.is_hidden() {
            self.counters.hides += 1;
        } else {
            self.counters.writes += 1;
        }
        if let Some(p) = self.pool_mut(pool) {
            let index = slot as usize;
            if p.instances.len() <= index {
                p.instances.resize(index + 1, None);
            }
            p.instances[index] = Some(*instance);
        }
    }

    fn set_active_count(&mut self, pool: PoolId, count: u32) {
        if let Some(p) = self.pool_mut(pool) {
            p.active_count = count;
        }
    }

    fn set_pool_visible(&mut self, pool: PoolId, visible: bool) {
        if let Some(p) = self.pool_mut(pool) {
            p.visible = visible;
        }
    }

    fn release_pool(&mut self, pool: PoolId) {
        if self.pools.remove(&pool).is_some() {
            self.counters.pools_released += 1;
        }
    }

    fn release_all(&mut self) {
        self.counters.pools_released += self.pools.len() as u64;
        self.pools.clear();
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    fn draw(&mut self, view: &RenderView) {
        self.counters.draws += 1;
        self.last_view = Some(*view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::OrbitCamera;
    use voxstream_common::{ChunkCoord, LodLevel, VoxelKey, VoxelState};

    fn id() -> PoolId {
        PoolId::new(ChunkCoord::new(0, 0, 0), VoxelState::Wall, LodLevel::High)
    }

    #[test]
    fn empty_backend_dump() {
        let backend = HeadlessBackend::new();
        let out = backend.dump();
        assert!(out.contains("pools=0"));
        assert!(out.contains("draws=0"));
    }

    #[test]
    fn drawn_counts_only_active_unhidden_slots() {
        let mut backend = HeadlessBackend::new();
        backend.create_pool(id(), 8);
        let inst = Instance::for_voxel(VoxelKey::new(1, 1, 1), VoxelState::Wall, LodLevel::High);
        backend.write_instance(id(), 0, &inst);
        backend.write_instance(id(), 1, &inst);
        backend.write_instance(id(), 2, &inst);
        backend.set_active_count(id(), 2);
        assert_eq!(backend.drawn_instances(), 2);

        backend.hide_instance(id(), 1);
        assert_eq!(backend.drawn_instances(), 1);
        assert_eq!(backend.counters().hides, 1);
        assert_eq!(backend.counters().writes, 3);

        backend.set_pool_visible(id(), false);
        assert_eq!(backend.drawn_instances(), 0);
        assert!(backend.dump().contains("(hidden)"));
    }

    #[test]
    fn release_forgets_pools() {
        let mut backend = HeadlessBackend::new();
        backend.create_pool(id(), 8);
        backend.release_pool(id());
        backend.release_pool(id());
        assert_eq!(backend.pool_count(), 0);
        assert_eq!(backend.counters().pools_released, 1);

        backend.create_pool(id(), 8);
        backend.release_all();
        assert_eq!(backend.counters().pools_released, 2);
    }

    #[test]
    fn draw_records_view() {
        let mut backend = HeadlessBackend::new();
        let cam = OrbitCamera::default();
        backend.draw(&cam.view());
        assert_eq!(backend.counters().draws, 1);
        assert_eq!(backend.last_view().map(|v| v.eye), Some(cam.position));
        assert!(backend.dump().contains("Camera: eye="));
    }
}
