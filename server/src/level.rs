//! Level layouts referenced by phase configuration.

use serde::{Deserialize, Serialize};
use shared::{GroundSensorConfig, Vec3};

use crate::ground::{sample_ground, GroundHit, GroundQuery, RayHit};

/// Axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    /// Sphere-box overlap test.
    pub fn intersects_sphere(&self, center: Vec3, radius: f32) -> bool {
        let closest = Vec3::new(
            center.x.clamp(self.min.x, self.max.x),
            center.y.clamp(self.min.y, self.max.y),
            center.z.clamp(self.min.z, self.max.z),
        );
        closest.distance(center) <= radius
    }
}

/// A solid surface players can stand on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub bounds: Aabb,
    #[serde(default = "default_layer")]
    pub layer: u32,
}

fn default_layer() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelLayout {
    pub name: String,
    pub platforms: Vec<Platform>,
    pub spawn_points: Vec<Vec3>,
    /// Reaching this box counts as finishing the phase.
    #[serde(default)]
    pub finish_zone: Option<Aabb>,
    /// Falling below this height is a fall-out.
    pub kill_plane: f32,
}

impl LevelLayout {
    /// Spawn point for the `index`-th participant, cycling through the list.
    pub fn spawn_point(&self, index: usize) -> Vec3 {
        if self.spawn_points.is_empty() {
            return Vec3::new(0.0, 1.0, 0.0);
        }
        self.spawn_points[index % self.spawn_points.len()]
    }

    pub fn in_finish_zone(&self, position: Vec3) -> bool {
        self.finish_zone
            .map(|zone| zone.contains(position))
            .unwrap_or(false)
    }

    pub fn below_kill_plane(&self, position: Vec3) -> bool {
        position.y < self.kill_plane
    }

    /// True if a sphere touches any platform.
    pub fn touches_solid(&self, center: Vec3, radius: f32) -> bool {
        self.platforms
            .iter()
            .any(|p| p.bounds.intersects_sphere(center, radius))
    }

    /// Highest platform top under `origin` within `max_distance`.
    fn raycast_down(&self, origin: Vec3, max_distance: f32, layer_mask: u32) -> Option<RayHit> {
        self.platforms
            .iter()
            .filter(|p| p.layer & layer_mask != 0)
            .filter(|p| {
                origin.x >= p.bounds.min.x
                    && origin.x <= p.bounds.max.x
                    && origin.z >= p.bounds.min.z
                    && origin.z <= p.bounds.max.z
            })
            .map(|p| p.bounds.max.y)
            .filter(|top| *top <= origin.y && origin.y - *top <= max_distance)
            .fold(None, |best: Option<f32>, top| match best {
                Some(b) if b >= top => Some(b),
                _ => Some(top),
            })
            .map(|top| RayHit {
                point: Vec3::new(origin.x, top, origin.z),
                normal: Vec3::Y,
            })
    }
}

impl GroundQuery for LevelLayout {
    fn check_ground(&self, position: Vec3, sensor: &GroundSensorConfig) -> GroundHit {
        sample_ground(position, sensor, |origin, distance, mask| {
            self.raycast_down(origin, distance, mask)
        })
    }
}
