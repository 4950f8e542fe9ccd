use glam::{Mat4, Vec2, Vec3, Vec4};
use voxstream_common::Bounds;

use crate::backend::RenderView;

/// Orbit camera: an eye position looking at a pivot target.
///
/// Camera motion lives outside the streaming core; the engine only reads
/// and writes `position`/`target`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub sensitivity: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(20.0, 25.0, 20.0),
            target: Vec3::ZERO,
            fov: 60.0_f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 2000.0,
            min_distance: 2.0,
            max_distance: 800.0,
            sensitivity: 0.005,
        }
    }
}

impl OrbitCamera {
    /// Eye position relative to the target.
    pub fn offset(&self) -> Vec3 {
        self.position - self.target
    }

    pub fn distance(&self) -> f32 {
        self.offset().length()
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Z)
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize_or(Vec3::X)
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward())
    }

    /// Rotate the eye around the target by pixel deltas.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        let offset = self.offset();
        let radius = offset.length().max(f32::EPSILON);
        let mut yaw = offset.z.atan2(offset.x);
        let mut pitch = (offset.y / radius).clamp(-1.0, 1.0).asin();
        yaw += dx * self.sensitivity;
        pitch = (pitch + dy * self.sensitivity).clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
        let rotated = Vec3::new(
            radius * pitch.cos() * yaw.cos(),
            radius * pitch.sin(),
            radius * pitch.cos() * yaw.sin(),
        );
        self.position = self.target + rotated;
    }

    /// Scale the eye distance by `factor`, clamped to the distance limits.
    pub fn zoom(&mut self, factor: f32) {
        let offset = self.offset();
        let distance = (offset.length() * factor).clamp(self.min_distance, self.max_distance);
        self.position = self.target + offset.normalize_or(Vec3::Y) * distance;
    }

    /// Slide eye and target together in the view plane.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        let scale = self.distance() * self.sensitivity * 0.2;
        let delta = (self.up() * dy - self.right() * dx) * scale;
        self.position += delta;
        self.target += delta;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn view(&self) -> RenderView {
        RenderView {
            eye: self.position,
            target: self.target,
            view_proj: self.view_projection(),
        }
    }

    /// World-space ray through a pixel; `screen` is measured from the
    /// top-left corner of a `viewport`-sized surface.
    pub fn screen_ray(&self, screen: Vec2, viewport: Vec2) -> Ray {
        let ndc = Vec2::new(
            2.0 * screen.x / viewport.x.max(1.0) - 1.0,
            1.0 - 2.0 * screen.y / viewport.y.max(1.0),
        );
        let inv = self.view_projection().inverse();
        let unproject = |depth: f32| {
            let p = inv * Vec4::new(ndc.x, ndc.y, depth, 1.0);
            p.truncate() / p.w
        };
        let near = unproject(0.0);
        let far = unproject(1.0);
        Ray::new(near, (far - near).normalize_or(self.forward()))
    }
}

/// A ray with precomputed inverse direction for slab tests.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    inv_direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            inv_direction: direction.recip(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Entry distance into `bounds` (slab method), or `None` on a miss.
    pub fn intersect(&self, bounds: &Bounds) -> Option<f32> {
        let t1 = (bounds.min - self.origin) * self.inv_direction;
        let t2 = (bounds.max - self.origin) * self.inv_direction;
        let t_near = t1.min(t2).max_element();
        let t_far = t1.max(t2).min_element();
        (t_near <= t_far && t_far >= 0.0).then_some(t_near.max(0.0))
    }
}
