//! Streaming core: spatial chunk index, slot pools, LOD, update scheduling.
//!
//! # Invariants
//! - A voxel key lives in at most one (chunk, state, LOD, slot) placement.
//! - No slot is held by two live voxels in the same bucket.
//! - Queue draining never exceeds its frame budget by more than one item.
//! - Critical voxels are never culled or evicted.

mod chunk;
mod housekeeping;
mod lod;
mod queue;
mod slots;

pub use chunk::{Acquired, Chunk, ChunkIndex, VoxelRecord};
pub use housekeeping::{Housekeeping, HousekeepingConfig, ceiling_candidates, stale_candidates};
pub use lod::{LodClassifier, LodConfig};
pub use queue::{
    DrainOutcome, DrainTimer, Enqueued, PendingUpdate, QueueStats, SchedulerConfig, UpdateQueue,
};
pub use slots::SlotPool;

pub fn crate_info() -> &'static str {
    "voxstream-stream v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("stream"));
    }
}
