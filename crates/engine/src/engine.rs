use std::collections::HashMap;
use std::time::{Duration, Instant};

use glam::{Vec2, Vec3};
use voxstream_common::{Bounds, VoxelKey, VoxelState};
use voxstream_render::{InstanceBackend, OrbitCamera};
use voxstream_stream::{
    ChunkIndex, DrainTimer, Housekeeping, LodClassifier, PendingUpdate, QueueStats, UpdateQueue,
    VoxelRecord, ceiling_candidates, stale_candidates,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::feed::{ChangeSet, FeedHandle, FeedReceiver};
use crate::follow::{CameraSettings, FollowController};
use crate::stats::{EngineStats, FrameReport};
use crate::voxels::{ApplyOutcome, VoxelStore};

/// Framing distance as a multiple of the box's largest dimension.
const CENTER_PADDING: f32 = 1.5;

/// Drain durations kept for the rolling average.
const DRAIN_WINDOW: usize = 120;

type PickListener = Box<dyn FnMut(Vec3)>;

/// State touched by per-voxel application, split out so the queue can
/// borrow it while draining.
struct Scene<B: InstanceBackend> {
    backend: B,
    store: VoxelStore,
    classifier: LodClassifier,
    camera: OrbitCamera,
    follow: FollowController,
    current_position: Option<VoxelKey>,
    current_target: Option<VoxelKey>,
}

impl<B: InstanceBackend> Scene<B> {
    fn apply(&mut self, key: VoxelKey, update: PendingUpdate) -> ApplyOutcome {
        let placement = update.map(|state| {
            let lod = self.classifier.classify(state, key.position(), self.camera.position);
            (state, lod)
        });
        let outcome = self.store.apply(&mut self.backend, key, placement);
        self.track(key, update);
        outcome
    }

    fn track(&mut self, key: VoxelKey, update: PendingUpdate) {
        if self.current_position == Some(key) && update != Some(VoxelState::CurrentPosition) {
            self.current_position = None;
        }
        if self.current_target == Some(key) && update != Some(VoxelState::CurrentTarget) {
            self.current_target = None;
        }
        match update {
            Some(VoxelState::CurrentPosition) => {
                self.current_position = Some(key);
                self.follow.set_target(key.position());
            }
            Some(VoxelState::CurrentTarget) => self.current_target = Some(key),
            _ => {}
        }
    }

    /// Live record matches `state` at the LOD the camera implies now.
    fn is_settled(&self, key: VoxelKey, state: VoxelState) -> bool {
        let lod = self.classifier.classify(state, key.position(), self.camera.position);
        match self.store.record(&key) {
            Some(record) => record.state == state && record.lod == lod,
            None => !lod.is_rendered(),
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    applied_immediately: u64,
    evicted_stale: u64,
    evicted_ceiling: u64,
    frames_rendered: u64,
    frames_skipped: u64,
}

/// Streaming voxel render engine.
///
/// Single-threaded: every mutation happens inside `apply_changes`, `tick`,
/// or a setter on the owning thread. Other threads feed snapshots through
/// a [`FeedHandle`]. After [`Engine::dispose`] every entry point is a no-op.
pub struct Engine<B: InstanceBackend> {
    config: EngineConfig,
    scene: Scene<B>,
    queue: UpdateQueue,
    housekeeping: Housekeeping,
    /// State map from the latest snapshot, minus ceiling evictions.
    known: HashMap<VoxelKey, VoxelState>,
    /// Camera position used by the last LOD sweep.
    lod_anchor: Vec3,
    lod_sweep_pending: bool,
    needs_render: bool,
    pick_listener: Option<PickListener>,
    feed: Option<(FeedHandle, FeedReceiver)>,
    drain_timer: DrainTimer,
    counters: Counters,
    disposed: bool,
}

impl<B: InstanceBackend> Engine<B> {
    pub fn new(config: EngineConfig, backend: B) -> Result<Self, EngineError> {
        config.validate()?;

        let follow = FollowController::new(&config.follow);
        let camera = OrbitCamera {
            position: follow.default_offset(),
            target: Vec3::ZERO,
            ..OrbitCamera::default()
        };
        let lod_anchor = camera.position;
        tracing::info!(
            chunk_size = config.chunk.chunk_size,
            max_voxels = config.housekeeping.max_voxels,
            budget_ms = config.scheduler.frame_budget_ms,
            "engine created"
        );

        Ok(Self {
            scene: Scene {
                backend,
                store: VoxelStore::new(&config.chunk, config.capacity_policy)?,
                classifier: LodClassifier::new(config.lod.clone()),
                camera,
                follow,
                current_position: None,
                current_target: None,
            },
            queue: UpdateQueue::new(config.scheduler.clone()),
            housekeeping: Housekeeping::new(Duration::from_millis(config.housekeeping.interval_ms)),
            known: HashMap::new(),
            lod_anchor,
            lod_sweep_pending: false,
            needs_render: true,
            pick_listener: None,
            feed: Some(FeedReceiver::channel()),
            drain_timer: DrainTimer::new(DRAIN_WINDOW),
            counters: Counters::default(),
            disposed: false,
            config,
        })
    }

    /// Sync the engine to a complete snapshot.
    ///
    /// Known keys missing from `changes` are deleted. Keys whose live
    /// record already matches are skipped. Updates touching a critical
    /// state apply immediately; everything else is queued.
    pub fn apply_changes(&mut self, changes: &ChangeSet) {
        if self.disposed {
            return;
        }
        let _span = tracing::debug_span!("apply_changes", incoming = changes.len()).entered();

        let departed: Vec<VoxelKey> = self
            .known
            .keys()
            .filter(|key| !changes.contains_key(key))
            .copied()
            .collect();
        let immediate_before = self.counters.applied_immediately;
        for key in &departed {
            self.known.remove(key);
            if self.scene.store.record(key).is_some() {
                self.submit(*key, None);
            } else {
                self.queue.cancel(key);
                // A critical insert dropped for capacity still left its key tracked.
                self.scene.track(*key, None);
            }
        }

        let mut submitted = 0usize;
        for (&key, &state) in changes {
            self.known.insert(key, state);
            if self.scene.is_settled(key, state) {
                self.queue.cancel(&key);
                continue;
            }
            self.submit(key, Some(state));
            submitted += 1;
        }

        if self.counters.applied_immediately > immediate_before {
            self.scene.store.prune_empty(&mut self.scene.backend);
        }

        tracing::debug!(
            departed = departed.len(),
            submitted,
            pending = self.queue.len(),
            "snapshot applied"
        );
    }

    /// Route one update: critical states bypass the queue.
    fn submit(&mut self, key: VoxelKey, update: PendingUpdate) {
        let entering = update.is_some_and(|state| state.is_critical());
        let leaving = self
            .scene
            .store
            .record(&key)
            .is_some_and(|record| record.state.is_critical());
        if entering || leaving {
            self.queue.cancel(&key);
            self.scene.apply(key, update);
            self.counters.applied_immediately += 1;
            self.needs_render = true;
        } else {
            self.queue.enqueue(key, update);
        }
    }

    /// Run one frame: feed intake, follow, LOD sweep, budgeted drain,
    /// housekeeping, visibility, then a draw if anything changed.
    pub fn tick(&mut self, now: Instant) -> FrameReport {
        if self.disposed {
            return FrameReport::default();
        }
        let _span = tracing::info_span!("engine_tick").entered();

        let latest = self.feed.as_ref().and_then(|(_, rx)| rx.latest());
        if let Some(changes) = latest {
            self.apply_changes(&changes);
        }

        let camera_moved = self.scene.follow.update(&mut self.scene.camera);
        if camera_moved {
            self.needs_render = true;
        }

        self.sweep_lod_if_moved();

        let budget = self.config.scheduler.frame_budget();
        let max_items = self.config.scheduler.max_items_per_frame;
        let scene = &mut self.scene;
        let outcome = self.queue.drain(budget, max_items, |key, update| {
            scene.apply(key, update);
        });
        if outcome.any_processed() {
            self.drain_timer.record(outcome.elapsed);
            self.scene.store.prune_empty(&mut self.scene.backend);
        }
        if outcome.any_processed() || outcome.has_remaining() {
            self.needs_render = true;
        }

        let evicted = self.run_housekeeping(now);
        if evicted > 0 {
            self.needs_render = true;
        }

        self.refresh_visibility();

        let rendered = self.needs_render;
        if rendered {
            self.scene.backend.draw(&self.scene.camera.view());
            self.needs_render = false;
            self.counters.frames_rendered += 1;
        } else {
            self.counters.frames_skipped += 1;
        }

        FrameReport {
            rendered,
            camera_moved,
            processed: outcome.processed,
            pending: outcome.remaining,
            evicted,
        }
    }

    /// Re-queue known voxels whose LOD changed since the camera last
    /// moved far enough.
    fn sweep_lod_if_moved(&mut self) {
        let camera = self.scene.camera.position;
        if !self.lod_sweep_pending
            && camera.distance(self.lod_anchor) < self.config.lod_refresh_distance
        {
            return;
        }
        self.lod_anchor = camera;
        self.lod_sweep_pending = false;

        let mut requeued = 0usize;
        for (&key, &state) in &self.known {
            if state.is_critical() || self.scene.is_settled(key, state) {
                continue;
            }
            self.queue.enqueue(key, Some(state));
            requeued += 1;
        }
        tracing::debug!(requeued, known = self.known.len(), "lod sweep");
    }

    fn run_housekeeping(&mut self, now: Instant) -> usize {
        let camera = self.scene.camera.position;
        let mut evicted = 0usize;

        if self.scene.classifier.culling_enabled() && self.housekeeping.stale_due(now) {
            let threshold = self
                .scene
                .classifier
                .cleanup_distance(self.config.housekeeping.cleanup_factor);
            let stale = stale_candidates(live_pairs(&self.scene.store), camera, threshold);
            for key in &stale {
                self.scene.store.remove(&mut self.scene.backend, key);
            }
            if !stale.is_empty() {
                tracing::debug!(evicted = stale.len(), threshold, "stale voxels evicted");
            }
            self.counters.evicted_stale += stale.len() as u64;
            evicted += stale.len();
        }

        if self.housekeeping.ceiling_due(now) {
            let max = self.config.housekeeping.max_voxels;
            let excess = ceiling_candidates(live_pairs(&self.scene.store), camera, max);
            for key in &excess {
                self.scene.store.remove(&mut self.scene.backend, key);
                self.known.remove(key);
            }
            if !excess.is_empty() {
                tracing::debug!(evicted = excess.len(), max, "voxel ceiling enforced");
            }
            self.counters.evicted_ceiling += excess.len() as u64;
            evicted += excess.len();
        }

        if evicted > 0 {
            self.scene.store.prune_empty(&mut self.scene.backend);
        }
        evicted
    }

    /// Hide whole chunks lying entirely past the culling distance. Chunks
    /// holding a critical voxel stay visible.
    fn refresh_visibility(&mut self) {
        let classifier = &self.scene.classifier;
        let camera = self.scene.camera.position;
        let culling = classifier.culling_enabled().then(|| classifier.culling_distance());
        let chunk_size = self.scene.store.chunks().chunk_size();
        self.scene
            .store
            .refresh_visibility(&mut self.scene.backend, |chunk| {
                let Some(limit) = culling else {
                    return true;
                };
                let bounds = chunk.coord().bounds(chunk_size);
                let nearest = camera.clamp(bounds.min, bounds.max);
                nearest.distance(camera) <= limit
                    || chunk
                        .pools()
                        .any(|(state, _, pool)| state.is_critical() && pool.live_count() > 0)
            });
    }

    /// Frame `bounds` with padding proportional to its largest dimension.
    /// Returns `false` and does nothing when no voxel is live.
    pub fn request_center_on(&mut self, bounds: Bounds) -> bool {
        if self.disposed || self.scene.store.is_empty() || bounds.is_empty() {
            return false;
        }
        let camera = &mut self.scene.camera;
        let center = bounds.center();
        let distance = (bounds.largest_dimension() * CENTER_PADDING)
            .clamp(camera.min_distance, camera.max_distance);
        let direction = self.scene.follow.default_offset().normalize_or(Vec3::ONE.normalize());
        camera.target = center;
        camera.position = center + direction * distance;
        self.needs_render = true;
        tracing::debug!(?center, distance, "camera centered");
        true
    }

    pub fn set_culling_enabled(&mut self, enabled: bool) {
        if self.disposed || self.scene.classifier.culling_enabled() == enabled {
            return;
        }
        self.scene.classifier.set_culling_enabled(enabled);
        self.lod_sweep_pending = true;
        self.needs_render = true;
        tracing::debug!(enabled, "culling toggled");
    }

    pub fn set_culling_distance(&mut self, distance: f32) -> Result<(), EngineError> {
        if self.disposed {
            return Ok(());
        }
        if !self.scene.classifier.set_culling_distance(distance) {
            return Err(EngineError::InvalidCullingDistance {
                requested: distance,
                minimum: self.scene.classifier.config().min_culling_distance,
            });
        }
        self.lod_sweep_pending = true;
        self.needs_render = true;
        tracing::debug!(distance, "culling distance changed");
        Ok(())
    }

    pub fn set_camera_following(&mut self, enabled: bool) {
        if self.disposed {
            return;
        }
        self.scene.follow.set_enabled(enabled);
        self.needs_render = true;
    }

    pub fn reset_camera_to_default(&mut self) {
        if self.disposed {
            return;
        }
        self.scene.follow.reset_to_default(&mut self.scene.camera);
        self.needs_render = true;
    }

    pub fn camera_settings(&self) -> CameraSettings {
        self.scene.follow.settings()
    }

    pub fn camera(&self) -> &OrbitCamera {
        &self.scene.camera
    }

    /// Mutable camera for user input. Marks the frame dirty; the follow
    /// controller notices the move on the next tick.
    pub fn camera_mut(&mut self) -> &mut OrbitCamera {
        self.needs_render = true;
        &mut self.scene.camera
    }

    /// Ask for a draw on the next tick.
    pub fn request_render(&mut self) {
        if !self.disposed {
            self.needs_render = true;
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.disposed || width == 0 || height == 0 {
            return;
        }
        self.scene.camera.aspect = width as f32 / height as f32;
        self.scene.backend.resize(width, height);
        self.needs_render = true;
    }

    pub fn set_pick_listener<F>(&mut self, listener: F)
    where
        F: FnMut(Vec3) + 'static,
    {
        if !self.disposed {
            self.pick_listener = Some(Box::new(listener));
        }
    }

    /// Hit-test a screen point. On a hit, report the voxel's world position
    /// to the pick listener and pivot the camera onto it.
    pub fn pick(&mut self, screen: Vec2, viewport: Vec2) -> Option<Vec3> {
        if self.disposed {
            return None;
        }
        let ray = self.scene.camera.screen_ray(screen, viewport);
        let (key, _) = self.scene.store.pick(&ray)?;
        let hit = key.position();
        if let Some(listener) = self.pick_listener.as_mut() {
            listener(hit);
        }
        self.scene.camera.target = hit;
        self.needs_render = true;
        tracing::debug!(%key, "voxel picked");
        Some(hit)
    }

    /// Cloneable sender for snapshots from other threads. Disconnected
    /// after disposal.
    pub fn feed_handle(&self) -> FeedHandle {
        match &self.feed {
            Some((handle, _)) => handle.clone(),
            None => FeedHandle::detached(),
        }
    }

    /// Tear down: drop queued work, free every backend pool, detach
    /// listeners and the feed. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        let dropped = self.queue.clear();
        let live = self.scene.store.len();
        self.scene.store.clear(&mut self.scene.backend);
        self.known.clear();
        self.scene.current_position = None;
        self.scene.current_target = None;
        self.pick_listener = None;
        self.feed = None;
        self.needs_render = false;
        tracing::info!(dropped, live, "engine disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn culling_enabled(&self) -> bool {
        self.scene.classifier.culling_enabled()
    }

    pub fn culling_distance(&self) -> f32 {
        self.scene.classifier.culling_distance()
    }

    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    pub fn record(&self, key: &VoxelKey) -> Option<&VoxelRecord> {
        self.scene.store.record(key)
    }

    pub fn records(&self) -> impl Iterator<Item = &VoxelRecord> {
        self.scene.store.records()
    }

    pub fn live_count(&self) -> usize {
        self.scene.store.len()
    }

    pub fn chunks(&self) -> &ChunkIndex {
        self.scene.store.chunks()
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    pub fn queue_stats(&self) -> &QueueStats {
        self.queue.stats()
    }

    pub fn known_count(&self) -> usize {
        self.known.len()
    }

    pub fn current_position(&self) -> Option<VoxelKey> {
        self.scene.current_position
    }

    pub fn current_target(&self) -> Option<VoxelKey> {
        self.scene.current_target
    }

    pub fn follow_target(&self) -> Option<Vec3> {
        self.scene.follow.target()
    }

    pub fn drain_timer(&self) -> &DrainTimer {
        &self.drain_timer
    }

    pub fn backend(&self) -> &B {
        &self.scene.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.scene.backend
    }

    pub fn stats(&self) -> EngineStats {
        let queue = self.queue.stats();
        let slots = self.scene.store.counters();
        EngineStats {
            live_voxels: self.scene.store.len(),
            known_voxels: self.known.len(),
            chunks: self.scene.store.chunks().len(),
            pending: self.queue.len(),
            processed: queue.processed,
            coalesced: queue.coalesced,
            overflow_evicted: queue.overflow_evicted,
            applied_immediately: self.counters.applied_immediately,
            slot_acquires: slots.acquires,
            slot_releases: slots.releases,
            capacity_rejections: slots.rejections,
            evicted_stale: self.counters.evicted_stale,
            evicted_ceiling: self.counters.evicted_ceiling,
            frames_rendered: self.counters.frames_rendered,
            frames_skipped: self.counters.frames_skipped,
            drain_avg: self.drain_timer.average(),
            drain_max: self.drain_timer.max(),
        }
    }
}

impl<B: InstanceBackend> Drop for Engine<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn live_pairs(store: &VoxelStore) -> impl Iterator<Item = (VoxelKey, VoxelState)> + '_ {
    store.records().map(|record| (record.key, record.state))
}
