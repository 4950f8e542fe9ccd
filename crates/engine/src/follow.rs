use glam::Vec3;
use voxstream_render::OrbitCamera;

use crate::config::FollowConfig;

/// Tolerance for deciding that someone other than the follower moved the
/// camera between two frames.
const EXTERNAL_MOVE_TOLERANCE: f32 = 1e-4;

/// Follow mode, as reported to UIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraSettings {
    pub following: bool,
    pub user_controlled: bool,
}

/// Eases the camera toward the current-position voxel.
///
/// While nobody else touches the camera, eye and target converge on
/// `target + offset` and `target`. Once an external move is seen, the
/// user's orbit offset is kept and only the pivot keeps sliding toward the
/// followed point. `reset_to_default` snaps back and clears user control.
#[derive(Debug, Clone)]
pub struct FollowController {
    enabled: bool,
    smoothing: f32,
    epsilon: f32,
    default_offset: Vec3,
    target: Option<Vec3>,
    user_controlled: bool,
    last_written: Option<(Vec3, Vec3)>,
}

impl FollowController {
    pub fn new(config: &FollowConfig) -> Self {
        Self {
            enabled: config.enabled,
            smoothing: config.smoothing,
            epsilon: config.epsilon,
            default_offset: config.default_offset,
            target: None,
            user_controlled: false,
            last_written: None,
        }
    }

    pub fn set_target(&mut self, target: Vec3) {
        self.target = Some(target);
    }

    pub fn target(&self) -> Option<Vec3> {
        self.target
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled != enabled {
            tracing::debug!(enabled, "camera follow toggled");
        }
        self.enabled = enabled;
    }

    pub fn user_controlled(&self) -> bool {
        self.user_controlled
    }

    pub fn default_offset(&self) -> Vec3 {
        self.default_offset
    }

    pub fn settings(&self) -> CameraSettings {
        CameraSettings {
            following: self.enabled,
            user_controlled: self.user_controlled,
        }
    }

    /// Advance one frame. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut OrbitCamera) -> bool {
        self.detect_external_move(camera);

        let moved = match self.target {
            Some(target) if self.enabled => {
                let (eye, pivot) = if self.user_controlled {
                    let pivot = camera.target.lerp(target, self.smoothing);
                    (pivot + camera.offset(), pivot)
                } else {
                    (
                        camera.position.lerp(target + self.default_offset, self.smoothing),
                        camera.target.lerp(target, self.smoothing),
                    )
                };
                let step = eye.distance(camera.position).max(pivot.distance(camera.target));
                if step >= self.epsilon {
                    camera.position = eye;
                    camera.target = pivot;
                    true
                } else {
                    false
                }
            }
            _ => false,
        };

        self.last_written = Some((camera.position, camera.target));
        moved
    }

    /// Snap to the default offset around the followed point and drop user
    /// control. Returns whether the camera moved.
    pub fn reset_to_default(&mut self, camera: &mut OrbitCamera) -> bool {
        self.user_controlled = false;
        let moved = match self.target {
            Some(target) => {
                camera.position = target + self.default_offset;
                camera.target = target;
                true
            }
            None => false,
        };
        self.last_written = Some((camera.position, camera.target));
        moved
    }

    fn detect_external_move(&mut self, camera: &OrbitCamera) {
        let Some((position, target)) = self.last_written else {
            return;
        };
        let moved = !position.abs_diff_eq(camera.position, EXTERNAL_MOVE_TOLERANCE)
            || !target.abs_diff_eq(camera.target, EXTERNAL_MOVE_TOLERANCE);
        if moved && !self.user_controlled {
            tracing::debug!("external camera move, keeping user offset");
            self.user_controlled = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> FollowController {
        FollowController::new(&FollowConfig::default())
    }

    fn run(follow: &mut FollowController, camera: &mut OrbitCamera, frames: usize) -> usize {
        (0..frames).filter(|_| follow.update(camera)).count()
    }

    #[test]
    fn idle_without_target() {
        let mut follow = controller();
        let mut camera = OrbitCamera::default();
        assert!(!follow.update(&mut camera));
        assert_eq!(camera, OrbitCamera::default());
    }

    #[test]
    fn converges_and_stops_moving() {
        let mut follow = controller();
        let mut camera = OrbitCamera::default();
        let goal = Vec3::new(10.0, 0.0, -5.0);
        follow.set_target(goal);

        assert!(follow.update(&mut camera));
        let moved = run(&mut follow, &mut camera, 500);
        assert!(moved < 500);
        assert!(camera.target.distance(goal) < 0.2);
        assert!(camera.position.distance(goal + follow.default_offset()) < 0.2);
        assert!(!follow.update(&mut camera));
        assert!(!follow.user_controlled());
    }

    #[test]
    fn disabled_follow_leaves_camera_alone() {
        let mut follow = controller();
        follow.set_enabled(false);
        follow.set_target(Vec3::new(50.0, 0.0, 0.0));
        let mut camera = OrbitCamera::default();
        assert!(!follow.update(&mut camera));
        assert_eq!(camera.target, Vec3::ZERO);
        assert_eq!(follow.target(), Some(Vec3::new(50.0, 0.0, 0.0)));
    }

    #[test]
    fn external_move_keeps_user_offset() {
        let mut follow = controller();
        let mut camera = OrbitCamera::default();
        follow.set_target(Vec3::ZERO);
        follow.update(&mut camera);

        camera.orbit(200.0, 0.0);
        let user_offset = camera.offset();
        follow.set_target(Vec3::new(30.0, 0.0, 0.0));
        assert!(follow.update(&mut camera));
        assert!(follow.user_controlled());
        assert!(camera.offset().abs_diff_eq(user_offset, 1e-3));

        run(&mut follow, &mut camera, 500);
        assert!(camera.target.distance(Vec3::new(30.0, 0.0, 0.0)) < 0.2);
        assert!(camera.offset().abs_diff_eq(user_offset, 1e-3));
    }

    #[test]
    fn reset_snaps_and_clears_user_control() {
        let mut follow = controller();
        let mut camera = OrbitCamera::default();
        follow.update(&mut camera);
        camera.pan(40.0, 0.0);
        follow.update(&mut camera);
        assert!(follow.user_controlled());

        assert!(!follow.reset_to_default(&mut camera));
        assert!(!follow.user_controlled());

        let goal = Vec3::new(4.0, 5.0, 6.0);
        follow.set_target(goal);
        assert!(follow.reset_to_default(&mut camera));
        assert_eq!(camera.target, goal);
        assert_eq!(camera.position, goal + follow.default_offset());
        assert!(!follow.update(&mut camera));
        assert!(!follow.user_controlled());
    }
}
