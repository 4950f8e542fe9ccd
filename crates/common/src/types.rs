use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Errors from parsing keys and state labels at the feed boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed voxel key {0:?}, expected \"x,y,z\"")]
    MalformedKey(String),
    #[error("unknown voxel state label {0:?}")]
    UnknownState(String),
}

/// Identity of a voxel: its integer cell coordinates.
///
/// The canonical string form is `"x,y,z"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelKey {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// World-space center of the cell.
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x as f32, self.y as f32, self.z as f32)
    }

    pub fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

impl fmt::Display for VoxelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.x, self.y, self.z)
    }
}

impl FromStr for VoxelKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(',').map(|p| p.trim().parse::<i32>());
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(x)), Some(Ok(y)), Some(Ok(z)), None) => Ok(Self::new(x, y, z)),
            _ => Err(ParseError::MalformedKey(s.to_string())),
        }
    }
}

/// Semantic state of a voxel as reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoxelState {
    Walkable,
    Passable,
    Wall,
    Unknown,
    CurrentPosition,
    CurrentTarget,
}

impl VoxelState {
    pub const COUNT: usize = 6;

    pub const ALL: [VoxelState; Self::COUNT] = [
        VoxelState::Walkable,
        VoxelState::Passable,
        VoxelState::Wall,
        VoxelState::Unknown,
        VoxelState::CurrentPosition,
        VoxelState::CurrentTarget,
    ];

    /// Dense index into per-state tables.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Critical states always render at full detail and are never evicted.
    pub fn is_critical(self) -> bool {
        matches!(self, VoxelState::CurrentPosition | VoxelState::CurrentTarget)
    }

    pub fn label(self) -> &'static str {
        match self {
            VoxelState::Walkable => "WALKABLE",
            VoxelState::Passable => "PASSABLE",
            VoxelState::Wall => "WALL",
            VoxelState::Unknown => "UNKNOWN",
            VoxelState::CurrentPosition => "CURRENT_POSITION",
            VoxelState::CurrentTarget => "CURRENT_TARGET",
        }
    }
}

impl fmt::Display for VoxelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VoxelState {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|state| state.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseError::UnknownState(s.to_string()))
    }
}

/// Discrete rendering fidelity tier chosen by distance from the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LodLevel {
    High,
    Medium,
    Low,
    /// Not rendered at all.
    Culled,
}

impl LodLevel {
    /// Levels that own instance pools.
    pub const RENDERED: [LodLevel; 3] = [LodLevel::High, LodLevel::Medium, LodLevel::Low];

    /// Dense index for rendered levels; `None` for `Culled`.
    pub fn index(self) -> Option<usize> {
        match self {
            LodLevel::High => Some(0),
            LodLevel::Medium => Some(1),
            LodLevel::Low => Some(2),
            LodLevel::Culled => None,
        }
    }

    pub fn is_rendered(self) -> bool {
        self != LodLevel::Culled
    }
}

/// Coordinate of a fixed-size cubic chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing `key` for the given chunk size. Floors negative
    /// coordinates (`-1 / 16` lands in chunk `-1`, not `0`).
    pub fn containing(key: VoxelKey, chunk_size: i32) -> Self {
        Self {
            x: key.x.div_euclid(chunk_size),
            y: key.y.div_euclid(chunk_size),
            z: key.z.div_euclid(chunk_size),
        }
    }

    /// Lowest voxel coordinate inside the chunk.
    pub fn origin(&self, chunk_size: i32) -> IVec3 {
        IVec3::new(self.x, self.y, self.z) * chunk_size
    }

    /// World-space box enclosing every unit voxel the chunk can hold.
    pub fn bounds(&self, chunk_size: i32) -> Bounds {
        let min = self.origin(chunk_size).as_vec3() - Vec3::splat(0.5);
        Bounds::new(min, min + Vec3::splat(chunk_size as f32))
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{},{}]", self.x, self.y, self.z)
    }
}

/// Axis-aligned min/max per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

impl Bounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Inverted box that any `include` call replaces.
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    /// Box of half-extent `half` around `center`.
    pub fn around(center: Vec3, half: f32) -> Self {
        Self::new(center - Vec3::splat(half), center + Vec3::splat(half))
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn include(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn largest_dimension(&self) -> f32 {
        self.size().max_element()
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

impl FromIterator<Vec3> for Bounds {
    fn from_iter<I: IntoIterator<Item = Vec3>>(iter: I) -> Self {
        let mut bounds = Bounds::empty();
        for point in iter {
            bounds.include(point);
        }
        bounds
    }
}
