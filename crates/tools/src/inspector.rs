use glam::Vec3;
use voxstream_common::{Bounds, ChunkCoord, LodLevel, VoxelKey, VoxelState};
use voxstream_engine::Engine;
use voxstream_render::InstanceBackend;

/// Engine inspector for status panels and developer tooling.
///
/// Derives the statistics a UI shows from the engine's live records.
pub struct EngineInspector;

impl EngineInspector {
    /// Produce a summary of the engine state.
    pub fn summary<B: InstanceBackend>(engine: &Engine<B>) -> EngineSummary {
        let mut per_state = [0usize; VoxelState::COUNT];
        let mut per_lod = [0usize; LodLevel::RENDERED.len()];
        let mut bounds = Bounds::empty();
        for record in engine.records() {
            per_state[record.state.index()] += 1;
            if let Some(i) = record.lod.index() {
                per_lod[i] += 1;
            }
            bounds.include(record.key.position());
        }
        EngineSummary {
            live_voxels: engine.live_count(),
            known_voxels: engine.known_count(),
            chunks: engine.chunks().len(),
            pending: engine.pending(),
            per_state,
            per_lod,
            bounds,
            current_position: engine.current_position(),
            current_target: engine.current_target(),
        }
    }

    /// Details of one live voxel.
    pub fn inspect_voxel<B: InstanceBackend>(engine: &Engine<B>, key: VoxelKey) -> Option<VoxelInfo> {
        engine.record(&key).map(|record| VoxelInfo {
            key,
            state: record.state,
            lod: record.lod,
            chunk: record.chunk,
            slot: record.slot,
            distance: key.position().distance(engine.camera().position),
        })
    }

    /// Every chunk, sorted by coordinate.
    pub fn list_chunks<B: InstanceBackend>(engine: &Engine<B>) -> Vec<ChunkInfo> {
        let mut chunks: Vec<ChunkInfo> = engine
            .chunks()
            .iter()
            .map(|chunk| ChunkInfo {
                coord: chunk.coord(),
                voxels: chunk.len(),
                pools: chunk.pools().count(),
                visible: chunk.is_visible(),
            })
            .collect();
        chunks.sort_by_key(|c| c.coord);
        chunks
    }
}

/// Summary of engine state for the inspector.
#[derive(Debug, Clone)]
pub struct EngineSummary {
    pub live_voxels: usize,
    pub known_voxels: usize,
    pub chunks: usize,
    pub pending: usize,
    /// Live voxels per state, indexed by `VoxelState::index`.
    pub per_state: [usize; VoxelState::COUNT],
    /// Live voxels per rendered LOD, indexed by `LodLevel::index`.
    pub per_lod: [usize; LodLevel::RENDERED.len()],
    /// Bounds over live voxel centers; empty when nothing is live.
    pub bounds: Bounds,
    pub current_position: Option<VoxelKey>,
    pub current_target: Option<VoxelKey>,
}

impl EngineSummary {
    pub fn count(&self, state: VoxelState) -> usize {
        self.per_state[state.index()]
    }

    pub fn count_lod(&self, lod: LodLevel) -> usize {
        lod.index().map_or(0, |i| self.per_lod[i])
    }
}

impl std::fmt::Display for EngineSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Engine: voxels={} known={} chunks={} pending={}",
            self.live_voxels, self.known_voxels, self.chunks, self.pending
        )?;
        for state in VoxelState::ALL {
            let n = self.count(state);
            if n > 0 {
                write!(f, " {}={}", state.label(), n)?;
            }
        }
        write!(
            f,
            " lod=[{} {} {}]",
            self.per_lod[0], self.per_lod[1], self.per_lod[2]
        )?;
        if !self.bounds.is_empty() {
            let (min, max) = (self.bounds.min, self.bounds.max);
            write!(
                f,
                " bounds=({:.0}, {:.0}, {:.0})..({:.0}, {:.0}, {:.0})",
                min.x, min.y, min.z, max.x, max.y, max.z
            )?;
        }
        if let Some(key) = self.current_position {
            write!(f, " at={key}")?;
        }
        Ok(())
    }
}

/// Detailed info about a single live voxel.
#[derive(Debug, Clone)]
pub struct VoxelInfo {
    pub key: VoxelKey,
    pub state: VoxelState,
    pub lod: LodLevel,
    pub chunk: ChunkCoord,
    pub slot: u32,
    /// Distance from the camera eye.
    pub distance: f32,
}

impl VoxelInfo {
    pub fn position(&self) -> Vec3 {
        self.key.position()
    }
}

impl std::fmt::Display for VoxelInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Voxel [{}] {} {:?} chunk={} slot={} dist={:.1}",
            self.key,
            self.state.label(),
            self.lod,
            self.chunk,
            self.slot,
            self.distance
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkInfo {
    pub coord: ChunkCoord,
    pub voxels: usize,
    pub pools: usize,
    pub visible: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use voxstream_engine::{ChangeSet, EngineConfig};
    use voxstream_render::HeadlessBackend;

    fn engine() -> Engine<HeadlessBackend> {
        let mut config = EngineConfig::default();
        config.follow.enabled = false;
        Engine::new(config, HeadlessBackend::new()).unwrap()
    }

    fn fill(engine: &mut Engine<HeadlessBackend>, entries: &[(VoxelKey, VoxelState)]) {
        let changes: ChangeSet = entries.iter().copied().collect();
        engine.apply_changes(&changes);
        while engine.pending() > 0 {
            engine.tick(Instant::now());
        }
    }

    #[test]
    fn summary_empty_engine() {
        let engine = engine();
        let summary = EngineInspector::summary(&engine);
        assert_eq!(summary.live_voxels, 0);
        assert_eq!(summary.chunks, 0);
        assert!(summary.bounds.is_empty());
        assert!(format!("{summary}").contains("voxels=0"));
    }

    #[test]
    fn summary_counts_states_and_lods() {
        let mut engine = engine();
        engine.camera_mut().position = Vec3::ZERO;
        fill(
            &mut engine,
            &[
                (VoxelKey::new(1, 0, 0), VoxelState::Wall),
                (VoxelKey::new(2, 0, 0), VoxelState::Wall),
                (VoxelKey::new(60, 0, 0), VoxelState::Walkable),
                (VoxelKey::new(-100, 0, 0), VoxelState::Passable),
                (VoxelKey::new(0, 3, 0), VoxelState::CurrentPosition),
            ],
        );

        let summary = EngineInspector::summary(&engine);
        assert_eq!(summary.live_voxels, 5);
        assert_eq!(summary.count(VoxelState::Wall), 2);
        assert_eq!(summary.count(VoxelState::CurrentPosition), 1);
        assert_eq!(summary.count_lod(LodLevel::High), 3);
        assert_eq!(summary.count_lod(LodLevel::Medium), 1);
        assert_eq!(summary.count_lod(LodLevel::Low), 1);
        assert_eq!(summary.count_lod(LodLevel::Culled), 0);
        assert_eq!(summary.bounds.min, Vec3::new(-100.0, 0.0, 0.0));
        assert_eq!(summary.bounds.max, Vec3::new(60.0, 3.0, 0.0));
        assert_eq!(summary.current_position, Some(VoxelKey::new(0, 3, 0)));

        let line = format!("{summary}");
        assert!(line.contains("WALL=2"));
        assert!(line.contains("at=0,3,0"));
    }

    #[test]
    fn inspect_voxel_found_and_missing() {
        let mut engine = engine();
        engine.camera_mut().position = Vec3::ZERO;
        let key = VoxelKey::new(3, 4, 0);
        fill(&mut engine, &[(key, VoxelState::Passable)]);

        let info = EngineInspector::inspect_voxel(&engine, key).unwrap();
        assert_eq!(info.state, VoxelState::Passable);
        assert_eq!(info.lod, LodLevel::High);
        assert_eq!(info.chunk, ChunkCoord::new(0, 0, 0));
        assert!((info.distance - 5.0).abs() < 1e-4);
        assert!(format!("{info}").contains("3,4,0"));

        assert!(EngineInspector::inspect_voxel(&engine, VoxelKey::new(9, 9, 9)).is_none());
    }

    #[test]
    fn list_chunks_sorted() {
        let mut engine = engine();
        fill(
            &mut engine,
            &[
                (VoxelKey::new(17, 0, 0), VoxelState::Wall),
                (VoxelKey::new(-1, 0, 0), VoxelState::Wall),
                (VoxelKey::new(0, 0, 0), VoxelState::Walkable),
            ],
        );
        let chunks = EngineInspector::list_chunks(&engine);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].coord, ChunkCoord::new(-1, 0, 0));
        assert!(chunks.iter().all(|c| c.visible && c.voxels == 1 && c.pools == 1));
    }
}
