use std::time::{Duration, Instant};

use glam::Vec3;
use serde::{Deserialize, Serialize};
use voxstream_common::{VoxelKey, VoxelState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HousekeepingConfig {
    /// Minimum time between two runs of the same pass, in milliseconds.
    pub interval_ms: u64,
    /// Cleanup threshold as a multiple of the culling distance.
    pub cleanup_factor: f32,
    /// Global live-voxel ceiling.
    pub max_voxels: usize,
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            cleanup_factor: 1.5,
            max_voxels: 50_000,
        }
    }
}

/// Time gates for the staleness and ceiling passes. Each gate opens on its
/// first check and then at most once per interval.
#[derive(Debug, Clone)]
pub struct Housekeeping {
    interval: Duration,
    last_stale: Option<Instant>,
    last_ceiling: Option<Instant>,
}

impl Housekeeping {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_stale: None,
            last_ceiling: None,
        }
    }

    /// Returns `true` and restarts the gate if the staleness pass is due.
    pub fn stale_due(&mut self, now: Instant) -> bool {
        Self::gate(&mut self.last_stale, self.interval, now)
    }

    /// Returns `true` and restarts the gate if the ceiling pass is due.
    pub fn ceiling_due(&mut self, now: Instant) -> bool {
        Self::gate(&mut self.last_ceiling, self.interval, now)
    }

    fn gate(last: &mut Option<Instant>, interval: Duration, now: Instant) -> bool {
        let due = last.is_none_or(|t| now.saturating_duration_since(t) >= interval);
        if due {
            *last = Some(now);
        }
        due
    }
}

/// Non-critical voxels farther from the camera than `threshold`.
pub fn stale_candidates<I>(voxels: I, camera: Vec3, threshold: f32) -> Vec<VoxelKey>
where
    I: IntoIterator<Item = (VoxelKey, VoxelState)>,
{
    voxels
        .into_iter()
        .filter(|(key, state)| !state.is_critical() && key.position().distance(camera) > threshold)
        .map(|(key, _)| key)
        .collect()
}

/// Non-critical voxels to evict, farthest first, so that at most
/// `max_voxels` remain. Critical voxels count toward the total but are
/// never selected.
pub fn ceiling_candidates<I>(voxels: I, camera: Vec3, max_voxels: usize) -> Vec<VoxelKey>
where
    I: IntoIterator<Item = (VoxelKey, VoxelState)>,
{
    let mut total = 0usize;
    let mut ranked: Vec<(f32, VoxelKey)> = Vec::new();
    for (key, state) in voxels {
        total += 1;
        if !state.is_critical() {
            ranked.push((key.position().distance_squared(camera), key));
        }
    }
    if total <= max_voxels {
        return Vec::new();
    }
    let excess = total - max_voxels;
    ranked.sort_unstable_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    ranked.into_iter().take(excess).map(|(_, key)| key).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voxel(x: i32, state: VoxelState) -> (VoxelKey, VoxelState) {
        (VoxelKey::new(x, 0, 0), state)
    }

    #[test]
    fn gates_open_once_per_interval() {
        let start = Instant::now();
        let mut hk = Housekeeping::new(Duration::from_secs(5));
        assert!(hk.stale_due(start));
        assert!(!hk.stale_due(start + Duration::from_secs(1)));
        assert!(hk.stale_due(start + Duration::from_secs(5)));

        // Independent gate
        assert!(hk.ceiling_due(start + Duration::from_secs(1)));
        assert!(!hk.ceiling_due(start + Duration::from_secs(2)));
    }

    #[test]
    fn stale_candidates_skip_critical_and_near() {
        let voxels = vec![
            voxel(10, VoxelState::Wall),
            voxel(300, VoxelState::Wall),
            voxel(400, VoxelState::CurrentPosition),
            voxel(500, VoxelState::CurrentTarget),
        ];
        let stale = stale_candidates(voxels, Vec3::ZERO, 225.0);
        assert_eq!(stale, vec![VoxelKey::new(300, 0, 0)]);
    }

    #[test]
    fn ceiling_noop_under_limit() {
        let voxels = vec![voxel(1, VoxelState::Wall), voxel(2, VoxelState::Wall)];
        assert!(ceiling_candidates(voxels, Vec3::ZERO, 2).is_empty());
    }

    #[test]
    fn ceiling_evicts_farthest_first() {
        let voxels = vec![
            voxel(5, VoxelState::Wall),
            voxel(50, VoxelState::Walkable),
            voxel(20, VoxelState::Wall),
            voxel(-40, VoxelState::Passable),
        ];
        let evicted = ceiling_candidates(voxels, Vec3::ZERO, 2);
        assert_eq!(evicted, vec![VoxelKey::new(50, 0, 0), VoxelKey::new(-40, 0, 0)]);
    }

    #[test]
    fn ceiling_never_selects_critical() {
        let voxels = vec![
            voxel(1000, VoxelState::CurrentPosition),
            voxel(900, VoxelState::CurrentTarget),
            voxel(5, VoxelState::Wall),
            voxel(6, VoxelState::Wall),
        ];
        let evicted = ceiling_candidates(voxels, Vec3::ZERO, 2);
        assert_eq!(evicted.len(), 2);
        assert!(evicted.contains(&VoxelKey::new(5, 0, 0)));
        assert!(evicted.contains(&VoxelKey::new(6, 0, 0)));

        // Not enough non-critical voxels to reach the ceiling: evict what we can.
        let crowded = vec![
            voxel(1000, VoxelState::CurrentPosition),
            voxel(900, VoxelState::CurrentTarget),
            voxel(5, VoxelState::Wall),
        ];
        assert_eq!(ceiling_candidates(crowded, Vec3::ZERO, 1), vec![VoxelKey::new(5, 0, 0)]);
    }
}
