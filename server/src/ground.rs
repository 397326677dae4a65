//! Ground detection boundary.
//!
//! The movement controller only sees the [`GroundQuery`] trait. Any world
//! representation that can cast a downward ray gets the multi-ray circle
//! sampling of [`sample_ground`] for free.

use shared::{GroundSensorConfig, Vec3};
use std::f32::consts::{PI, TAU};

/// Lift applied to ray origins so a body resting exactly on a surface hits it.
const RAY_SKIN: f32 = 0.05;

/// Result of a ground check. `Default` is "airborne".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroundHit {
    pub is_grounded: bool,
    pub point: Vec3,
    pub normal: Vec3,
}

impl Default for GroundHit {
    fn default() -> Self {
        Self {
            is_grounded: false,
            point: Vec3::ZERO,
            normal: Vec3::Y,
        }
    }
}

/// A single downward ray contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Vec3,
    pub normal: Vec3,
}

/// Capability to answer "is this position standing on something".
pub trait GroundQuery {
    fn check_ground(&self, position: Vec3, sensor: &GroundSensorConfig) -> GroundHit;
}

/// Multi-ray ground check built on a downward raycast.
///
/// One ray is cast from the center and `ray_count` more from points on a
/// circle of `sensor.radius`. The body is grounded when the center ray hits,
/// or when ring rays hit and the widest run of missed ring rays spans a chord
/// no wider than `sensor.max_gap_width` (the body straddles a seam). The chord
/// is measured between the outermost missed sample points, so a single
/// missed ray measures as zero width.
pub fn sample_ground<F>(
    position: Vec3,
    sensor: &GroundSensorConfig,
    mut raycast_down: F,
) -> GroundHit
where
    F: FnMut(Vec3, f32, u32) -> Option<RayHit>,
{
    let lift = Vec3::new(0.0, RAY_SKIN, 0.0);
    let max_distance = sensor.distance + RAY_SKIN;

    if let Some(hit) = raycast_down(position + lift, max_distance, sensor.layer_mask) {
        return GroundHit {
            is_grounded: true,
            point: hit.point,
            normal: hit.normal,
        };
    }

    let rays = sensor.ray_count as usize;
    if rays == 0 {
        return GroundHit::default();
    }

    let step = TAU / rays as f32;
    let ring: Vec<Option<RayHit>> = (0..rays)
        .map(|i| {
            let angle = step * i as f32;
            let offset = Vec3::new(angle.cos(), 0.0, angle.sin()) * sensor.radius;
            raycast_down(position + offset + lift, max_distance, sensor.layer_mask)
        })
        .collect();

    let hits: Vec<&RayHit> = ring.iter().flatten().collect();
    if hits.is_empty() {
        return GroundHit::default();
    }

    let widest_gap = widest_miss_run(&ring);
    if widest_gap > 0 {
        let span = (step * (widest_gap - 1) as f32).min(PI);
        let chord = 2.0 * sensor.radius * (span / 2.0).sin();
        if chord > sensor.max_gap_width {
            return GroundHit::default();
        }
    }

    let count = hits.len() as f32;
    let point = hits
        .iter()
        .fold(Vec3::ZERO, |acc, hit| acc + hit.point)
        * (1.0 / count);
    let normal = hits
        .iter()
        .fold(Vec3::ZERO, |acc, hit| acc + hit.normal)
        .normalize_or_zero();

    GroundHit {
        is_grounded: true,
        point,
        normal: if normal == Vec3::ZERO { Vec3::Y } else { normal },
    }
}

/// Longest circular run of consecutive misses.
fn widest_miss_run(ring: &[Option<RayHit>]) -> usize {
    let n = ring.len();
    let mut widest = 0;
    let mut current = 0;
    // Walk the ring twice so runs wrapping past index 0 are measured whole.
    for i in 0..n * 2 {
        if ring[i % n].is_none() {
            current += 1;
            widest = widest.max(current.min(n));
        } else {
            current = 0;
        }
    }
    widest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor() -> GroundSensorConfig {
        GroundSensorConfig {
            radius: 0.5,
            distance: 0.2,
            ray_count: 8,
            max_gap_width: 0.4,
            layer_mask: 1,
        }
    }

    fn flat_hit(origin: Vec3) -> Option<RayHit> {
        Some(RayHit {
            point: Vec3::new(origin.x, 0.0, origin.z),
            normal: Vec3::Y,
        })
    }

    #[test]
    fn test_center_hit_is_grounded() {
        let hit = sample_ground(Vec3::ZERO, &sensor(), |origin, _, _| flat_hit(origin));
        assert!(hit.is_grounded);
        assert_eq!(hit.normal, Vec3::Y);
    }

    #[test]
    fn test_nothing_below_is_airborne() {
        let hit = sample_ground(Vec3::ZERO, &sensor(), |_, _, _| None);
        assert!(!hit.is_grounded);
    }

    #[test]
    fn test_narrow_seam_stays_grounded() {
        // A seam along the z axis, 0.1 wide: center and the two ring rays on it miss.
        let hit = sample_ground(Vec3::ZERO, &sensor(), |origin, _, _| {
            if origin.x.abs() < 0.05 {
                None
            } else {
                flat_hit(origin)
            }
        });
        assert!(hit.is_grounded);
    }

    #[test]
    fn test_ledge_is_airborne() {
        // Only the +x half has ground and the center is past the edge.
        let hit = sample_ground(Vec3::ZERO, &sensor(), |origin, _, _| {
            if origin.x > 0.1 {
                flat_hit(origin)
            } else {
                None
            }
        });
        assert!(!hit.is_grounded);
    }

    #[test]
    fn test_widest_miss_run_wraps() {
        let some = Some(RayHit {
            point: Vec3::ZERO,
            normal: Vec3::Y,
        });
        let ring = vec![None, some, some, None, None];
        assert_eq!(widest_miss_run(&ring), 3);
        assert_eq!(widest_miss_run(&[None, None]), 2);
    }
}
