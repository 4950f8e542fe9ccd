//! Synthetic snapshots for headless runs.

use voxstream_common::{VoxelKey, VoxelState};
use voxstream_engine::ChangeSet;

const FILL_STATES: [VoxelState; 4] = [
    VoxelState::Walkable,
    VoxelState::Passable,
    VoxelState::Wall,
    VoxelState::Unknown,
];

/// splitmix64, enough for reproducible coordinates.
pub struct Rng(u64);

impl Rng {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    pub fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform in `-extent..=extent`.
    pub fn coord(&mut self, extent: i32) -> i32 {
        let span = (extent as u64) * 2 + 1;
        (self.next_u64() % span) as i32 - extent
    }
}

/// `count` distinct voxels inside a cube of half-size `extent`, plus a
/// current position at the origin.
pub fn random_snapshot(rng: &mut Rng, count: usize, extent: i32) -> ChangeSet {
    let cells = ((extent as usize) * 2 + 1).pow(3);
    let count = count.min(cells.saturating_sub(1));
    let origin = VoxelKey::new(0, 0, 0);
    let mut changes = ChangeSet::with_capacity(count + 1);
    changes.insert(origin, VoxelState::CurrentPosition);
    while changes.len() < count + 1 {
        let key = VoxelKey::new(rng.coord(extent), rng.coord(extent), rng.coord(extent));
        if key == origin {
            continue;
        }
        let state = FILL_STATES[(rng.next_u64() % FILL_STATES.len() as u64) as usize];
        changes.insert(key, state);
    }
    changes
}

/// Copy of `changes` with roughly `percent` of the fill voxels given a new
/// state and the current position moved to `position`.
pub fn churn(changes: &ChangeSet, rng: &mut Rng, percent: u64, position: VoxelKey) -> ChangeSet {
    let mut next: ChangeSet = changes
        .iter()
        .filter(|(_, state)| !state.is_critical())
        .map(|(&key, &state)| {
            if rng.next_u64() % 100 < percent {
                let shifted = FILL_STATES[(state.index() + 1) % FILL_STATES.len()];
                (key, shifted)
            } else {
                (key, state)
            }
        })
        .collect();
    next.insert(position, VoxelState::CurrentPosition);
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_has_requested_size_and_one_position() {
        let mut rng = Rng::new(42);
        let changes = random_snapshot(&mut rng, 5000, 40);
        assert_eq!(changes.len(), 5001);
        let positions = changes
            .values()
            .filter(|s| **s == VoxelState::CurrentPosition)
            .count();
        assert_eq!(positions, 1);
        assert!(changes.keys().all(|k| k.x.abs() <= 40 && k.y.abs() <= 40 && k.z.abs() <= 40));
    }

    #[test]
    fn snapshot_is_reproducible() {
        let a = random_snapshot(&mut Rng::new(7), 100, 10);
        let b = random_snapshot(&mut Rng::new(7), 100, 10);
        assert_eq!(a, b);
    }

    #[test]
    fn small_cube_caps_count() {
        let changes = random_snapshot(&mut Rng::new(1), 1000, 1);
        assert_eq!(changes.len(), 27);
    }

    #[test]
    fn churn_moves_the_current_position() {
        let mut rng = Rng::new(3);
        let changes = random_snapshot(&mut rng, 200, 10);
        let moved_to = VoxelKey::new(11, 0, 0);
        let next = churn(&changes, &mut rng, 50, moved_to);
        assert_eq!(next[&moved_to], VoxelState::CurrentPosition);
        assert_ne!(next.get(&VoxelKey::new(0, 0, 0)), Some(&VoxelState::CurrentPosition));
        assert_eq!(next.len(), changes.len());
    }
}
