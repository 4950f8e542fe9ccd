use std::collections::HashMap;

use voxstream_common::{Bounds, ChunkCoord, LodLevel, VoxelKey, VoxelState};
use voxstream_render::{Instance, InstanceBackend, PoolId, Ray, lod_scale};
use voxstream_stream::{Chunk, ChunkIndex, VoxelRecord};

use crate::config::{CapacityPolicy, ChunkConfig};
use crate::error::EngineError;

/// What a single upsert/delete did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// New record in a fresh slot.
    Inserted,
    /// Same bucket; transform rewritten in place.
    Refreshed,
    /// State, LOD, or chunk changed: old slot released, new slot acquired.
    Rebucketed,
    /// Record deleted.
    Removed,
    /// Classified beyond the culling distance; no record kept.
    Culled,
    /// Bucket at capacity; voxel dropped.
    Rejected,
    /// Deletion of a key that had no record.
    Absent,
}

/// Lifetime slot counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounters {
    pub acquires: u64,
    pub releases: u64,
    pub rejections: u64,
}

/// Live voxel records plus the chunk index owning their slots.
///
/// Every mutation is mirrored into the instance backend in the same call.
pub struct VoxelStore {
    index: ChunkIndex,
    records: HashMap<VoxelKey, VoxelRecord>,
    policy: CapacityPolicy,
    counters: StoreCounters,
}

fn pool_of(record: &VoxelRecord) -> PoolId {
    PoolId::new(record.chunk, record.state, record.lod)
}

impl VoxelStore {
    pub fn new(config: &ChunkConfig, policy: CapacityPolicy) -> Result<Self, EngineError> {
        let index = ChunkIndex::new(config.chunk_size, config.bucket_capacity).ok_or_else(|| {
            EngineError::InvalidConfig(format!(
                "chunk_size must be positive, got {}",
                config.chunk_size
            ))
        })?;
        Ok(Self {
            index,
            records: HashMap::new(),
            policy,
            counters: StoreCounters::default(),
        })
    }

    /// Upsert `key` into the (state, lod) bucket of its chunk, or delete it
    /// when `placement` is `None`. A culled placement deletes as well.
    pub fn apply<B: InstanceBackend>(
        &mut self,
        backend: &mut B,
        key: VoxelKey,
        placement: Option<(VoxelState, LodLevel)>,
    ) -> ApplyOutcome {
        let Some((state, lod)) = placement else {
            return match self.remove(backend, &key) {
                Some(_) => ApplyOutcome::Removed,
                None => ApplyOutcome::Absent,
            };
        };
        if !lod.is_rendered() {
            self.remove(backend, &key);
            return ApplyOutcome::Culled;
        }

        let chunk = self.index.coord_of(key);
        match self.records.get(&key).copied() {
            Some(record) if record.same_bucket(chunk, state, lod) => {
                let instance = Instance::for_voxel(key, state, lod);
                backend.write_instance(pool_of(&record), record.slot, &instance);
                ApplyOutcome::Refreshed
            }
            Some(_) => {
                self.remove(backend, &key);
                if self.insert(backend, key, chunk, state, lod) {
                    ApplyOutcome::Rebucketed
                } else {
                    ApplyOutcome::Rejected
                }
            }
            None => {
                if self.insert(backend, key, chunk, state, lod) {
                    ApplyOutcome::Inserted
                } else {
                    ApplyOutcome::Rejected
                }
            }
        }
    }

    fn insert<B: InstanceBackend>(
        &mut self,
        backend: &mut B,
        key: VoxelKey,
        coord: ChunkCoord,
        state: VoxelState,
        lod: LodLevel,
    ) -> bool {
        let capacity = self.index.bucket_capacity();
        let chunk = self.index.get_or_create(coord);
        let Some(acquired) = chunk.acquire(state, lod, capacity) else {
            self.reject(key, state, lod);
            return false;
        };
        chunk.insert_key(key);

        let pool = PoolId::new(coord, state, lod);
        if acquired.pool_created {
            backend.create_pool(pool, capacity);
        }
        backend.write_instance(pool, acquired.slot, &Instance::for_voxel(key, state, lod));
        backend.set_active_count(pool, acquired.active_count);

        self.records.insert(
            key,
            VoxelRecord {
                key,
                state,
                lod,
                chunk: coord,
                slot: acquired.slot,
            },
        );
        self.counters.acquires += 1;
        tracing::trace!(%key, ?state, ?lod, slot = acquired.slot, "voxel placed");
        true
    }

    fn reject(&mut self, key: VoxelKey, state: VoxelState, lod: LodLevel) {
        match self.policy {
            CapacityPolicy::Drop => {
                tracing::trace!(%key, ?state, ?lod, "bucket full, voxel dropped");
            }
            CapacityPolicy::RejectAndCount => {
                self.counters.rejections += 1;
                tracing::warn!(
                    %key,
                    ?state,
                    ?lod,
                    rejections = self.counters.rejections,
                    "bucket full, voxel rejected"
                );
            }
        }
    }

    /// Release the record's slot, hide its instance, and forget it.
    pub fn remove<B: InstanceBackend>(&mut self, backend: &mut B, key: &VoxelKey) -> Option<VoxelRecord> {
        let record = self.records.remove(key)?;
        if let Some(chunk) = self.index.get_mut(record.chunk) {
            if chunk.release(record.state, record.lod, record.slot) {
                backend.hide_instance(pool_of(&record), record.slot);
                self.counters.releases += 1;
            }
            chunk.remove_key(key);
        }
        tracing::trace!(%key, slot = record.slot, "voxel released");
        Some(record)
    }

    /// Drop empty chunks and free their pools. Returns how many went.
    pub fn prune_empty<B: InstanceBackend>(&mut self, backend: &mut B) -> usize {
        let removed = self.index.drain_empty();
        for chunk in &removed {
            release_chunk_pools(backend, chunk);
        }
        removed.len()
    }

    /// Apply a per-chunk visibility predicate, touching only pools whose
    /// chunk flipped.
    pub fn refresh_visibility<B, F>(&mut self, backend: &mut B, visible: F)
    where
        B: InstanceBackend,
        F: Fn(&Chunk) -> bool,
    {
        for chunk in self.index.iter_mut() {
            let wanted = visible(chunk);
            if chunk.set_visible(wanted) {
                for (state, lod, _) in chunk.pools() {
                    backend.set_pool_visible(PoolId::new(chunk.coord(), state, lod), wanted);
                }
            }
        }
    }

    /// Forget everything and free all backend storage.
    pub fn clear<B: InstanceBackend>(&mut self, backend: &mut B) {
        self.records.clear();
        self.index.clear();
        backend.release_all();
    }

    /// Nearest live voxel hit by `ray`, with its entry distance.
    pub fn pick(&self, ray: &Ray) -> Option<(VoxelKey, f32)> {
        let size = self.index.chunk_size();
        let mut best: Option<(VoxelKey, f32)> = None;
        for chunk in self.index.iter() {
            let Some(chunk_t) = ray.intersect(&chunk.coord().bounds(size)) else {
                continue;
            };
            if best.is_some_and(|(_, t)| chunk_t > t) {
                continue;
            }
            for key in chunk.keys() {
                let Some(record) = self.records.get(key) else {
                    continue;
                };
                let half = lod_scale(record.lod) * 0.5;
                if let Some(t) = ray.intersect(&Bounds::around(key.position(), half)) {
                    if best.is_none_or(|(_, best_t)| t < best_t) {
                        best = Some((*key, t));
                    }
                }
            }
        }
        best
    }

    pub fn record(&self, key: &VoxelKey) -> Option<&VoxelRecord> {
        self.records.get(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &VoxelRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn chunks(&self) -> &ChunkIndex {
        &self.index
    }

    pub fn counters(&self) -> StoreCounters {
        self.counters
    }

    /// Every record sits in its chunk, and no bucket hands a slot to two keys.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        let mut seen = std::collections::HashSet::new();
        for record in self.records() {
            let chunk = self.index.get(record.chunk).expect("owning chunk exists");
            assert!(chunk.contains(&record.key));
            let pool = chunk.pool(record.state, record.lod).expect("bucket exists");
            assert!(pool.is_live(record.slot));
            assert!(
                seen.insert((record.chunk, record.state, record.lod, record.slot)),
                "slot aliased in bucket"
            );
        }
        assert_eq!(self.index.total_voxels(), self.len());
    }
}

fn release_chunk_pools<B: InstanceBackend>(backend: &mut B, chunk: &Chunk) {
    for (state, lod, _) in chunk.pools() {
        backend.release_pool(PoolId::new(chunk.coord(), state, lod));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use voxstream_render::HeadlessBackend;

    fn store() -> VoxelStore {
        VoxelStore::new(&ChunkConfig::default(), CapacityPolicy::Drop).unwrap()
    }

    #[test]
    fn insert_refresh_remove() {
        let mut backend = HeadlessBackend::new();
        let mut store = store();
        let key = VoxelKey::new(3, 4, 5);
        let placement = Some((VoxelState::Wall, LodLevel::High));

        assert_eq!(store.apply(&mut backend, key, placement), ApplyOutcome::Inserted);
        assert_eq!(store.apply(&mut backend, key, placement), ApplyOutcome::Refreshed);
        assert_eq!(store.len(), 1);
        assert_eq!(backend.drawn_instances(), 1);
        store.assert_consistent();

        assert_eq!(store.apply(&mut backend, key, None), ApplyOutcome::Removed);
        assert_eq!(store.apply(&mut backend, key, None), ApplyOutcome::Absent);
        assert_eq!(backend.drawn_instances(), 0);
        assert_eq!(store.counters().acquires, 1);
        assert_eq!(store.counters().releases, 1);
    }

    #[test]
    fn state_change_moves_bucket() {
        let mut backend = HeadlessBackend::new();
        let mut store = store();
        let key = VoxelKey::new(0, 0, 0);
        store.apply(&mut backend, key, Some((VoxelState::Unknown, LodLevel::High)));
        let outcome = store.apply(&mut backend, key, Some((VoxelState::Walkable, LodLevel::High)));

        assert_eq!(outcome, ApplyOutcome::Rebucketed);
        let record = store.record(&key).unwrap();
        assert_eq!(record.state, VoxelState::Walkable);
        let chunk = store.chunks().get(record.chunk).unwrap();
        assert_eq!(chunk.pool(VoxelState::Unknown, LodLevel::High).unwrap().live_count(), 0);
        assert_eq!(chunk.pool(VoxelState::Walkable, LodLevel::High).unwrap().live_count(), 1);
        assert_eq!(backend.drawn_instances(), 1);
        store.assert_consistent();
    }

    #[test]
    fn culled_placement_deletes() {
        let mut backend = HeadlessBackend::new();
        let mut store = store();
        let key = VoxelKey::new(1, 1, 1);
        store.apply(&mut backend, key, Some((VoxelState::Wall, LodLevel::Low)));
        assert_eq!(
            store.apply(&mut backend, key, Some((VoxelState::Wall, LodLevel::Culled))),
            ApplyOutcome::Culled
        );
        assert!(store.record(&key).is_none());
        assert_eq!(
            store.apply(&mut backend, VoxelKey::new(2, 2, 2), Some((VoxelState::Wall, LodLevel::Culled))),
            ApplyOutcome::Culled
        );
        assert!(store.is_empty());
    }

    #[test]
    fn full_bucket_rejects_and_counts() {
        let mut backend = HeadlessBackend::new();
        let config = ChunkConfig {
            bucket_capacity: Some(2),
            ..ChunkConfig::default()
        };
        let mut store = VoxelStore::new(&config, CapacityPolicy::RejectAndCount).unwrap();
        let placement = Some((VoxelState::Wall, LodLevel::High));
        for x in 0..2 {
            assert_eq!(
                store.apply(&mut backend, VoxelKey::new(x, 0, 0), placement),
                ApplyOutcome::Inserted
            );
        }
        assert_eq!(
            store.apply(&mut backend, VoxelKey::new(5, 0, 0), placement),
            ApplyOutcome::Rejected
        );
        assert_eq!(store.len(), 2);
        assert_eq!(store.counters().rejections, 1);
        assert!(store.record(&VoxelKey::new(5, 0, 0)).is_none());
        store.assert_consistent();
    }

    #[test]
    fn drop_policy_does_not_count() {
        let mut backend = HeadlessBackend::new();
        let config = ChunkConfig {
            bucket_capacity: Some(1),
            ..ChunkConfig::default()
        };
        let mut store = VoxelStore::new(&config, CapacityPolicy::Drop).unwrap();
        let placement = Some((VoxelState::Wall, LodLevel::High));
        store.apply(&mut backend, VoxelKey::new(0, 0, 0), placement);
        assert_eq!(
            store.apply(&mut backend, VoxelKey::new(1, 0, 0), placement),
            ApplyOutcome::Rejected
        );
        assert_eq!(store.counters().rejections, 0);
    }

    #[test]
    fn released_slots_are_reused() {
        let mut backend = HeadlessBackend::new();
        let mut store = store();
        let placement = Some((VoxelState::Passable, LodLevel::Medium));
        let a = VoxelKey::new(0, 0, 0);
        let b = VoxelKey::new(1, 0, 0);
        store.apply(&mut backend, a, placement);
        let slot_a = store.record(&a).unwrap().slot;
        store.apply(&mut backend, a, None);
        store.apply(&mut backend, b, placement);
        assert_eq!(store.record(&b).unwrap().slot, slot_a);
        let record = store.record(&b).unwrap();
        let pool = backend.pool(pool_of(record)).unwrap();
        assert_eq!(pool.active_count, 1);
    }

    #[test]
    fn prune_releases_empty_chunk_pools() {
        let mut backend = HeadlessBackend::new();
        let mut store = store();
        let key = VoxelKey::new(-1, -1, -1);
        store.apply(&mut backend, key, Some((VoxelState::Wall, LodLevel::High)));
        assert_eq!(store.chunks().len(), 1);
        assert_eq!(backend.pool_count(), 1);

        store.apply(&mut backend, key, None);
        assert_eq!(store.prune_empty(&mut backend), 1);
        assert!(store.chunks().is_empty());
        assert_eq!(backend.pool_count(), 0);
    }

    #[test]
    fn visibility_touches_only_flipped_chunks() {
        let mut backend = HeadlessBackend::new();
        let mut store = store();
        store.apply(&mut backend, VoxelKey::new(0, 0, 0), Some((VoxelState::Wall, LodLevel::High)));
        store.apply(&mut backend, VoxelKey::new(40, 0, 0), Some((VoxelState::Wall, LodLevel::High)));

        store.refresh_visibility(&mut backend, |chunk| chunk.coord().x == 0);
        assert_eq!(backend.drawn_instances(), 1);
        store.refresh_visibility(&mut backend, |_| true);
        assert_eq!(backend.drawn_instances(), 2);
    }

    #[test]
    fn pick_returns_nearest_voxel() {
        let mut backend = HeadlessBackend::new();
        let mut store = store();
        let placement = Some((VoxelState::Wall, LodLevel::High));
        for x in [5, 10, 30] {
            store.apply(&mut backend, VoxelKey::new(x, 0, 0), placement);
        }
        let ray = Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::X);
        let (key, t) = store.pick(&ray).expect("ray hits the row");
        assert_eq!(key, VoxelKey::new(5, 0, 0));
        assert!((t - 14.525).abs() < 1e-3);

        let miss = Ray::new(Vec3::new(-10.0, 5.0, 0.0), Vec3::X);
        assert!(store.pick(&miss).is_none());
    }

    #[test]
    fn clear_releases_everything() {
        let mut backend = HeadlessBackend::new();
        let mut store = store();
        store.apply(&mut backend, VoxelKey::new(0, 0, 0), Some((VoxelState::Wall, LodLevel::High)));
        store.clear(&mut backend);
        assert!(store.is_empty());
        assert!(store.chunks().is_empty());
        assert_eq!(backend.pool_count(), 0);
    }
}
