//! Distance-based level-of-detail classification.
//!
//! Three ascending thresholds split camera distance into bands:
//! - HIGH: closer than `high_distance`
//! - MEDIUM: closer than `medium_distance`
//! - LOW: closer than `culling_distance`
//! - CULLED: beyond `culling_distance` (LOW instead when culling is disabled)
//!
//! Critical states ignore distance and always classify HIGH.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use voxstream_common::{LodLevel, VoxelState};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodConfig {
    pub high_distance: f32,
    pub medium_distance: f32,
    pub culling_enabled: bool,
    pub culling_distance: f32,
    /// Lower bound accepted by runtime culling-distance changes.
    pub min_culling_distance: f32,
}

impl Default for LodConfig {
    fn default() -> Self {
        Self {
            high_distance: 40.0,
            medium_distance: 90.0,
            culling_enabled: true,
            culling_distance: 150.0,
            min_culling_distance: 100.0,
        }
    }
}

impl LodConfig {
    /// Thresholds are finite, positive, and strictly ascending.
    pub fn is_consistent(&self) -> bool {
        let finite = [
            self.high_distance,
            self.medium_distance,
            self.culling_distance,
            self.min_culling_distance,
        ]
        .iter()
        .all(|d| d.is_finite());
        finite
            && self.high_distance > 0.0
            && self.high_distance < self.medium_distance
            && self.medium_distance < self.min_culling_distance
            && self.min_culling_distance <= self.culling_distance
    }
}

#[derive(Debug, Clone)]
pub struct LodClassifier {
    config: LodConfig,
}

impl LodClassifier {
    pub fn new(config: LodConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LodConfig {
        &self.config
    }

    pub fn classify(&self, state: VoxelState, position: Vec3, camera: Vec3) -> LodLevel {
        if state.is_critical() {
            return LodLevel::High;
        }
        self.classify_distance(position.distance(camera))
    }

    pub fn classify_distance(&self, distance: f32) -> LodLevel {
        if distance < self.config.high_distance {
            LodLevel::High
        } else if distance < self.config.medium_distance {
            LodLevel::Medium
        } else if !self.config.culling_enabled || distance < self.config.culling_distance {
            LodLevel::Low
        } else {
            LodLevel::Culled
        }
    }

    pub fn culling_enabled(&self) -> bool {
        self.config.culling_enabled
    }

    pub fn set_culling_enabled(&mut self, enabled: bool) {
        self.config.culling_enabled = enabled;
    }

    pub fn culling_distance(&self) -> f32 {
        self.config.culling_distance
    }

    /// Accepts finite distances at or above the configured minimum.
    /// Returns `false` and keeps the old value otherwise.
    pub fn set_culling_distance(&mut self, distance: f32) -> bool {
        if !distance.is_finite() || distance < self.config.min_culling_distance {
            return false;
        }
        self.config.culling_distance = distance;
        true
    }

    /// Distance beyond which non-critical voxels are evicted outright.
    pub fn cleanup_distance(&self, factor: f32) -> f32 {
        self.config.culling_distance * factor
    }
}

impl Default for LodClassifier {
    fn default() -> Self {
        Self::new(LodConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(distance: f32) -> Vec3 {
        Vec3::new(distance, 0.0, 0.0)
    }

    #[test]
    fn bands_follow_thresholds() {
        let lod = LodClassifier::default();
        let cam = Vec3::ZERO;
        assert_eq!(lod.classify(VoxelState::Wall, at(10.0), cam), LodLevel::High);
        assert_eq!(lod.classify(VoxelState::Wall, at(40.0), cam), LodLevel::Medium);
        assert_eq!(lod.classify(VoxelState::Wall, at(89.9), cam), LodLevel::Medium);
        assert_eq!(lod.classify(VoxelState::Wall, at(120.0), cam), LodLevel::Low);
        assert_eq!(lod.classify(VoxelState::Wall, at(150.0), cam), LodLevel::Culled);
    }

    #[test]
    fn critical_states_are_always_high() {
        let lod = LodClassifier::default();
        for state in [VoxelState::CurrentPosition, VoxelState::CurrentTarget] {
            assert_eq!(lod.classify(state, at(10_000.0), Vec3::ZERO), LodLevel::High);
        }
    }

    #[test]
    fn disabling_culling_keeps_far_voxels_low() {
        let mut lod = LodClassifier::default();
        lod.set_culling_enabled(false);
        assert_eq!(lod.classify_distance(5_000.0), LodLevel::Low);
    }

    #[test]
    fn culling_distance_respects_minimum() {
        let mut lod = LodClassifier::default();
        assert!(!lod.set_culling_distance(50.0));
        assert!(!lod.set_culling_distance(f32::NAN));
        assert_eq!(lod.culling_distance(), 150.0);

        assert!(lod.set_culling_distance(300.0));
        assert_eq!(lod.classify_distance(200.0), LodLevel::Low);
        assert_eq!(lod.cleanup_distance(1.5), 450.0);
    }

    #[test]
    fn config_consistency() {
        assert!(LodConfig::default().is_consistent());
        let inverted = LodConfig {
            high_distance: 100.0,
            medium_distance: 50.0,
            ..LodConfig::default()
        };
        assert!(!inverted.is_consistent());
        let below_min = LodConfig {
            culling_distance: 60.0,
            ..LodConfig::default()
        };
        assert!(!below_min.is_consistent());
    }
}
