//! Synthetic feed: an explorer wandering a procedurally walled floor.
//!
//! Every step reveals the cells around the explorer and publishes the whole
//! accumulated map as one snapshot, the way a live mapping feed does.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use voxstream_common::{VoxelKey, VoxelState};
use voxstream_engine::{ChangeSet, FeedHandle};

const DIRECTIONS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

fn hash(x: i32, z: i32, seed: u64) -> u64 {
    let mut h = seed ^ (x as u32 as u64) ^ ((z as u32 as u64) << 32);
    h = (h ^ (h >> 33)).wrapping_mul(0xff51_afd7_ed55_8ccd);
    h = (h ^ (h >> 33)).wrapping_mul(0xc4ce_b9fe_1a85_ec53);
    h ^ (h >> 33)
}

/// Floor state at a column. Roughly one cell in six is a wall.
fn floor_state(x: i32, z: i32, seed: u64) -> VoxelState {
    match hash(x, z, seed) % 12 {
        0 | 1 => VoxelState::Wall,
        2 => VoxelState::Passable,
        _ => VoxelState::Walkable,
    }
}

pub struct Explorer {
    seed: u64,
    reveal_radius: i32,
    position: (i32, i32),
    heading: usize,
    steps: u64,
    map: ChangeSet,
}

impl Explorer {
    pub fn new(seed: u64, reveal_radius: i32) -> Self {
        Self {
            seed,
            reveal_radius,
            position: (0, 0),
            heading: 0,
            steps: 0,
            map: ChangeSet::new(),
        }
    }

    pub fn position(&self) -> VoxelKey {
        VoxelKey::new(self.position.0, 0, self.position.1)
    }

    /// Advance one cell and return the snapshot to publish.
    pub fn step(&mut self) -> ChangeSet {
        self.walk();
        self.reveal();
        self.steps += 1;

        let mut snapshot = self.map.clone();
        snapshot.insert(self.position(), VoxelState::CurrentPosition);
        let (dx, dz) = DIRECTIONS[self.heading];
        let ahead = VoxelKey::new(self.position.0 + dx * 4, 0, self.position.1 + dz * 4);
        if self.map.get(&ahead) == Some(&VoxelState::Walkable) {
            snapshot.insert(ahead, VoxelState::CurrentTarget);
        }
        snapshot
    }

    fn walk(&mut self) {
        let r = hash(self.steps as i32, self.heading as i32, self.seed);
        if r % 8 == 0 {
            self.heading = (r >> 8) as usize % DIRECTIONS.len();
        }
        for turn in 0..DIRECTIONS.len() {
            let heading = (self.heading + turn) % DIRECTIONS.len();
            let (dx, dz) = DIRECTIONS[heading];
            let next = (self.position.0 + dx, self.position.1 + dz);
            if floor_state(next.0, next.1, self.seed) != VoxelState::Wall {
                self.heading = heading;
                self.position = next;
                return;
            }
        }
    }

    fn reveal(&mut self) {
        let r = self.reveal_radius;
        let (px, pz) = self.position;
        for x in px - r..=px + r {
            for z in pz - r..=pz + r {
                let state = floor_state(x, z, self.seed);
                self.map.insert(VoxelKey::new(x, 0, z), state);
                if state == VoxelState::Wall {
                    self.map.insert(VoxelKey::new(x, 1, z), VoxelState::Wall);
                }
            }
        }
        // The explorer's start cell can hash to a wall; it stood there.
        self.map.insert(self.position(), VoxelState::Walkable);
    }
}

/// Background thread publishing explorer snapshots at a fixed interval.
pub struct ExplorerFeed {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ExplorerFeed {
    pub fn spawn(handle: FeedHandle, seed: u64, interval: Duration) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let thread = std::thread::Builder::new()
            .name("explorer-feed".into())
            .spawn(move || {
                let mut explorer = Explorer::new(seed, 6);
                while !flag.load(Ordering::Relaxed) {
                    if !handle.apply_changes(explorer.step()) {
                        tracing::info!("engine gone, explorer feed stopping");
                        break;
                    }
                    std::thread::sleep(interval);
                }
            });
        let thread = match thread {
            Ok(thread) => Some(thread),
            Err(e) => {
                tracing::error!("failed to start explorer feed: {e}");
                None
            }
        };
        Self { stop, thread }
    }
}

impl Drop for ExplorerFeed {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
