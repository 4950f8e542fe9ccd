use std::time::Duration;

/// What one `tick` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// A draw was issued this frame.
    pub rendered: bool,
    /// The follow controller moved the camera.
    pub camera_moved: bool,
    /// Queue entries applied.
    pub processed: usize,
    /// Queue entries left for later frames.
    pub pending: usize,
    /// Voxels removed by housekeeping.
    pub evicted: usize,
}

/// Snapshot of engine counters for logs and UIs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineStats {
    pub live_voxels: usize,
    pub known_voxels: usize,
    pub chunks: usize,
    pub pending: usize,
    pub processed: u64,
    pub coalesced: u64,
    pub overflow_evicted: u64,
    pub applied_immediately: u64,
    pub slot_acquires: u64,
    pub slot_releases: u64,
    pub capacity_rejections: u64,
    pub evicted_stale: u64,
    pub evicted_ceiling: u64,
    pub frames_rendered: u64,
    pub frames_skipped: u64,
    pub drain_avg: Duration,
    pub drain_max: Duration,
}

impl EngineStats {
    /// One-line summary, used for window titles and CLI output.
    pub fn summary(&self) -> String {
        format!(
            "voxels={} chunks={} pending={} drain_avg={:.2}ms frames={}/{}",
            self.live_voxels,
            self.chunks,
            self.pending,
            self.drain_avg.as_secs_f64() * 1000.0,
            self.frames_rendered,
            self.frames_rendered + self.frames_skipped,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_mentions_counts() {
        let stats = EngineStats {
            live_voxels: 12,
            chunks: 3,
            frames_rendered: 2,
            frames_skipped: 8,
            drain_avg: Duration::from_micros(1500),
            ..EngineStats::default()
        };
        let line = stats.summary();
        assert!(line.contains("voxels=12"));
        assert!(line.contains("chunks=3"));
        assert!(line.contains("drain_avg=1.50ms"));
        assert!(line.contains("frames=2/10"));
    }
}
