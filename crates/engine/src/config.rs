use glam::Vec3;
use serde::{Deserialize, Serialize};
use voxstream_stream::{HousekeepingConfig, LodConfig, SchedulerConfig};

use crate::error::EngineError;

/// Spatial partitioning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkConfig {
    /// Chunk edge length in voxels.
    pub chunk_size: i32,
    /// Slots per (chunk, state, LOD) bucket. Defaults to `chunk_size^3`.
    pub bucket_capacity: Option<u32>,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 16,
            bucket_capacity: None,
        }
    }
}

/// What happens to a voxel whose bucket is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityPolicy {
    /// Drop silently.
    #[default]
    Drop,
    /// Drop, count, and log a warning.
    RejectAndCount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowConfig {
    /// Follow the current-position voxel at startup.
    pub enabled: bool,
    /// Fraction of the remaining distance covered per frame.
    pub smoothing: f32,
    /// Movement below this is treated as converged.
    pub epsilon: f32,
    /// Eye offset from the followed target.
    pub default_offset: Vec3,
}

impl Default for FollowConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smoothing: 0.1,
            epsilon: 0.01,
            default_offset: Vec3::new(20.0, 25.0, 20.0),
        }
    }
}

/// Top-level engine configuration, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chunk: ChunkConfig,
    pub lod: LodConfig,
    pub scheduler: SchedulerConfig,
    pub housekeeping: HousekeepingConfig,
    pub follow: FollowConfig,
    pub capacity_policy: CapacityPolicy,
    /// Camera travel that triggers re-classification of known voxels.
    pub lod_refresh_distance: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk: ChunkConfig::default(),
            lod: LodConfig::default(),
            scheduler: SchedulerConfig::default(),
            housekeeping: HousekeepingConfig::default(),
            follow: FollowConfig::default(),
            capacity_policy: CapacityPolicy::default(),
            lod_refresh_distance: 8.0,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        let fail = |msg: &str| Err(EngineError::InvalidConfig(msg.to_string()));
        if self.chunk.chunk_size <= 0 {
            return fail("chunk.chunk_size must be positive");
        }
        if self.chunk.bucket_capacity == Some(0) {
            return fail("chunk.bucket_capacity must be positive");
        }
        if !self.lod.is_consistent() {
            return fail("lod thresholds must be finite, positive, and ascending");
        }
        if self.scheduler.frame_budget_ms == 0 {
            return fail("scheduler.frame_budget_ms must be positive");
        }
        if self.scheduler.max_items_per_frame == Some(0) {
            return fail("scheduler.max_items_per_frame must be positive when set");
        }
        if self.scheduler.max_queue_len == 0 || self.scheduler.overflow_evict_batch == 0 {
            return fail("scheduler queue bounds must be positive");
        }
        if self.housekeeping.max_voxels == 0 {
            return fail("housekeeping.max_voxels must be positive");
        }
        if !self.housekeeping.cleanup_factor.is_finite() || self.housekeeping.cleanup_factor < 1.0 {
            return fail("housekeeping.cleanup_factor must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.follow.smoothing) || self.follow.smoothing == 0.0 {
            return fail("follow.smoothing must be in (0, 1]");
        }
        if !self.follow.epsilon.is_finite() || self.follow.epsilon <= 0.0 {
            return fail("follow.epsilon must be positive");
        }
        if !self.follow.default_offset.is_finite() || self.follow.default_offset.length() < 1e-3 {
            return fail("follow.default_offset must be a finite, non-zero vector");
        }
        if !self.lod_refresh_distance.is_finite() || self.lod_refresh_distance < 0.0 {
            return fail("lod_refresh_distance must be finite and non-negative");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunk.chunk_size, 16);
        assert_eq!(config.lod_refresh_distance, 8.0);
        assert_eq!(config.housekeeping.max_voxels, 50_000);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "chunk": { "chunk_size": 8 }, "capacity_policy": "reject_and_count" }"#,
        )
        .unwrap();
        assert_eq!(config.chunk.chunk_size, 8);
        assert_eq!(config.capacity_policy, CapacityPolicy::RejectAndCount);
        assert_eq!(config.scheduler.frame_budget_ms, 14);
        assert_eq!(config.lod_refresh_distance, 8.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = EngineConfig::default();
        config.chunk.chunk_size = 0;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));

        let mut config = EngineConfig::default();
        config.lod.medium_distance = 10.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.follow.smoothing = 0.0;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.housekeeping.cleanup_factor = f32::NAN;
        assert!(config.validate().is_err());
    }
}
