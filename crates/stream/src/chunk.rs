use std::collections::{HashMap, HashSet};

use voxstream_common::{ChunkCoord, LodLevel, VoxelKey, VoxelState};

use crate::slots::SlotPool;

/// Where a live voxel's instance sits: owning chunk, bucket, and slot.
///
/// A plain value referencing the chunk by coordinate; the chunk owns the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelRecord {
    pub key: VoxelKey,
    pub state: VoxelState,
    pub lod: LodLevel,
    pub chunk: ChunkCoord,
    pub slot: u32,
}

impl VoxelRecord {
    /// Same chunk and bucket as the given placement.
    pub fn same_bucket(&self, chunk: ChunkCoord, state: VoxelState, lod: LodLevel) -> bool {
        self.chunk == chunk && self.state == state && self.lod == lod
    }
}

/// Result of a successful slot acquisition inside a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acquired {
    pub slot: u32,
    /// The bucket's pool did not exist before this call.
    pub pool_created: bool,
    /// Active range of the pool after the call.
    pub active_count: u32,
}

type PoolTable = [[Option<SlotPool>; 3]; VoxelState::COUNT];

/// Fixed-size cubic region owning one slot pool per (state, LOD) bucket.
/// Pools are created on first use.
#[derive(Debug)]
pub struct Chunk {
    coord: ChunkCoord,
    keys: HashSet<VoxelKey>,
    pools: PoolTable,
    visible: bool,
}

impl Chunk {
    fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            keys: HashSet::new(),
            pools: PoolTable::default(),
            visible: true,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Number of live voxels owned by this chunk.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &VoxelKey) -> bool {
        self.keys.contains(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &VoxelKey> {
        self.keys.iter()
    }

    pub fn insert_key(&mut self, key: VoxelKey) -> bool {
        self.keys.insert(key)
    }

    pub fn remove_key(&mut self, key: &VoxelKey) -> bool {
        self.keys.remove(key)
    }

    pub fn pool(&self, state: VoxelState, lod: LodLevel) -> Option<&SlotPool> {
        let lod_index = lod.index()?;
        self.pools[state.index()][lod_index].as_ref()
    }

    /// Existing pools with their bucket.
    pub fn pools(&self) -> impl Iterator<Item = (VoxelState, LodLevel, &SlotPool)> {
        VoxelState::ALL.into_iter().flat_map(move |state| {
            LodLevel::RENDERED.into_iter().filter_map(move |lod| {
                self.pool(state, lod).map(|pool| (state, lod, pool))
            })
        })
    }

    /// Acquire a slot in the (state, lod) bucket. `None` if `lod` is culled
    /// or the bucket is at capacity.
    pub fn acquire(&mut self, state: VoxelState, lod: LodLevel, capacity: u32) -> Option<Acquired> {
        let lod_index = lod.index()?;
        let entry = &mut self.pools[state.index()][lod_index];
        let pool_created = entry.is_none();
        let pool = entry.get_or_insert_with(|| SlotPool::new(capacity));
        let slot = pool.acquire()?;
        Some(Acquired {
            slot,
            pool_created,
            active_count: pool.active_count(),
        })
    }

    /// Release a slot back to its bucket's free-list.
    pub fn release(&mut self, state: VoxelState, lod: LodLevel, slot: u32) -> bool {
        let Some(lod_index) = lod.index() else {
            return false;
        };
        self.pools[state.index()][lod_index]
            .as_mut()
            .is_some_and(|pool| pool.release(slot))
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Returns `true` if the flag changed.
    pub fn set_visible(&mut self, visible: bool) -> bool {
        let changed = self.visible != visible;
        self.visible = visible;
        changed
    }
}

/// Spatial index partitioning voxel space into cubes of `chunk_size`.
///
/// Chunks are created lazily on first insertion and must be removed as soon
/// as they hold no voxels. At most one chunk exists per coordinate.
pub struct ChunkIndex {
    chunk_size: i32,
    bucket_capacity: u32,
    chunks: HashMap<ChunkCoord, Chunk>,
}

impl ChunkIndex {
    /// Create an index. Bucket capacity defaults to `chunk_size^3`.
    /// Returns `None` unless `chunk_size` is positive.
    pub fn new(chunk_size: i32, bucket_capacity: Option<u32>) -> Option<Self> {
        if chunk_size <= 0 {
            return None;
        }
        let cube = (chunk_size as u32).saturating_pow(3);
        Some(Self {
            chunk_size,
            bucket_capacity: bucket_capacity.unwrap_or(cube),
            chunks: HashMap::new(),
        })
    }

    pub fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    pub fn bucket_capacity(&self) -> u32 {
        self.bucket_capacity
    }

    pub fn coord_of(&self, key: VoxelKey) -> ChunkCoord {
        ChunkCoord::containing(key, self.chunk_size)
    }

    pub fn get_or_create(&mut self, coord: ChunkCoord) -> &mut Chunk {
        self.chunks.entry(coord).or_insert_with(|| {
            tracing::debug!(%coord, "creating chunk");
            Chunk::new(coord)
        })
    }

    pub fn get(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn get_mut(&mut self, coord: ChunkCoord) -> Option<&mut Chunk> {
        self.chunks.get_mut(&coord)
    }

    /// Remove the chunk if it holds no voxels, handing it back so the caller
    /// can release its GPU pools.
    pub fn remove_if_empty(&mut self, coord: ChunkCoord) -> Option<Chunk> {
        if !self.chunks.get(&coord).is_some_and(Chunk::is_empty) {
            return None;
        }
        tracing::debug!(%coord, "removing empty chunk");
        self.chunks.remove(&coord)
    }

    /// Remove every empty chunk.
    pub fn drain_empty(&mut self) -> Vec<Chunk> {
        let empty: Vec<ChunkCoord> = self
            .chunks
            .iter()
            .filter(|(_, chunk)| chunk.is_empty())
            .map(|(coord, _)| *coord)
            .collect();
        empty
            .into_iter()
            .filter_map(|coord| self.remove_if_empty(coord))
            .collect()
    }

    /// Remove every chunk regardless of content.
    pub fn clear(&mut self) -> Vec<Chunk> {
        self.chunks.drain().map(|(_, chunk)| chunk).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Chunk> {
        self.chunks.values_mut()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Live voxels across all chunks.
    pub fn total_voxels(&self) -> usize {
        self.chunks.values().map(Chunk::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coord_of_floors_negatives() {
        let index = ChunkIndex::new(16, None).unwrap();
        assert_eq!(index.coord_of(VoxelKey::new(10, 0, 10)), ChunkCoord::new(0, 0, 0));
        assert_eq!(index.coord_of(VoxelKey::new(20, 0, -5)), ChunkCoord::new(1, 0, -1));
        assert_eq!(index.coord_of(VoxelKey::new(-16, -1, 0)), ChunkCoord::new(-1, -1, 0));
    }

    #[test]
    fn non_positive_chunk_size_is_refused() {
        assert!(ChunkIndex::new(0, None).is_none());
        assert!(ChunkIndex::new(-8, Some(4)).is_none());
    }

    #[test]
    fn default_bucket_capacity_is_chunk_volume() {
        assert_eq!(ChunkIndex::new(16, None).unwrap().bucket_capacity(), 4096);
        assert_eq!(ChunkIndex::new(16, Some(8)).unwrap().bucket_capacity(), 8);
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let mut index = ChunkIndex::new(16, None).unwrap();
        let coord = ChunkCoord::new(1, 2, 3);
        index.get_or_create(coord).insert_key(VoxelKey::new(16, 32, 48));
        index.get_or_create(coord);
        assert_eq!(index.len(), 1);
        assert_eq!(index.total_voxels(), 1);
    }

    #[test]
    fn remove_if_empty_keeps_occupied_chunks() {
        let mut index = ChunkIndex::new(16, None).unwrap();
        let coord = ChunkCoord::new(0, 0, 0);
        let key = VoxelKey::new(1, 1, 1);
        index.get_or_create(coord).insert_key(key);

        assert!(index.remove_if_empty(coord).is_none());
        assert_eq!(index.len(), 1);

        index.get_mut(coord).unwrap().remove_key(&key);
        let removed = index.remove_if_empty(coord).expect("chunk is empty");
        assert_eq!(removed.coord(), coord);
        assert!(index.is_empty());
        assert!(index.remove_if_empty(coord).is_none());
    }

    #[test]
    fn drain_empty_prunes_only_empty_chunks() {
        let mut index = ChunkIndex::new(4, None).unwrap();
        index.get_or_create(ChunkCoord::new(0, 0, 0)).insert_key(VoxelKey::new(0, 0, 0));
        index.get_or_create(ChunkCoord::new(1, 0, 0));
        index.get_or_create(ChunkCoord::new(2, 0, 0));

        let drained = index.drain_empty();
        assert_eq!(drained.len(), 2);
        assert_eq!(index.len(), 1);
        assert!(index.get(ChunkCoord::new(0, 0, 0)).is_some());
    }

    #[test]
    fn buckets_allocate_independently() {
        let mut index = ChunkIndex::new(16, Some(2)).unwrap();
        let chunk = index.get_or_create(ChunkCoord::new(0, 0, 0));

        let first = chunk.acquire(VoxelState::Wall, LodLevel::High, 2).unwrap();
        assert!(first.pool_created);
        assert_eq!(first.slot, 0);

        let other = chunk.acquire(VoxelState::Wall, LodLevel::Medium, 2).unwrap();
        assert!(other.pool_created);
        assert_eq!(other.slot, 0);

        let second = chunk.acquire(VoxelState::Wall, LodLevel::High, 2).unwrap();
        assert!(!second.pool_created);
        assert_eq!(second.active_count, 2);

        assert!(chunk.acquire(VoxelState::Wall, LodLevel::High, 2).is_none());
        assert!(chunk.acquire(VoxelState::Wall, LodLevel::Culled, 2).is_none());
        assert_eq!(chunk.pools().count(), 2);
    }

    #[test]
    fn release_returns_slot_to_its_bucket() {
        let mut index = ChunkIndex::new(16, None).unwrap();
        let chunk = index.get_or_create(ChunkCoord::new(0, 0, 0));
        let acquired = chunk.acquire(VoxelState::Walkable, LodLevel::Low, 8).unwrap();

        assert!(!chunk.release(VoxelState::Wall, LodLevel::Low, acquired.slot));
        assert!(chunk.release(VoxelState::Walkable, LodLevel::Low, acquired.slot));
        let pool = chunk.pool(VoxelState::Walkable, LodLevel::Low).unwrap();
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn record_bucket_comparison() {
        let record = VoxelRecord {
            key: VoxelKey::new(0, 0, 0),
            state: VoxelState::Wall,
            lod: LodLevel::High,
            chunk: ChunkCoord::new(0, 0, 0),
            slot: 3,
        };
        assert!(record.same_bucket(ChunkCoord::new(0, 0, 0), VoxelState::Wall, LodLevel::High));
        assert!(!record.same_bucket(ChunkCoord::new(0, 0, 0), VoxelState::Wall, LodLevel::Low));
        assert!(!record.same_bucket(ChunkCoord::new(1, 0, 0), VoxelState::Wall, LodLevel::High));
    }
}
