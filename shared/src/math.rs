//! Vector helpers shared by the authority and observers.
//!
//! The world is Y-up. Two-dimensional movement input `(x, y)` maps onto the
//! horizontal plane as world `(x, z)`.

pub use glam::{Vec2, Vec3};
use std::f32::consts::{PI, TAU};

/// Lifts a movement input onto the horizontal plane.
pub fn input_to_plane(input: Vec2) -> Vec3 {
    Vec3::new(input.x, 0.0, input.y)
}

/// Horizontal (XZ) component with Y zeroed.
pub fn flatten(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Moves `current` toward `target` by at most `max_delta`, never overshooting.
pub fn move_towards(current: Vec3, target: Vec3, max_delta: f32) -> Vec3 {
    let diff = target - current;
    let dist = diff.length();
    if dist <= max_delta || dist < 1e-6 {
        target
    } else {
        current + diff * (max_delta / dist)
    }
}

/// Unit direction on the horizontal plane for a yaw angle.
pub fn direction_from_yaw(yaw: f32) -> Vec3 {
    Vec3::new(yaw.sin(), 0.0, yaw.cos())
}

/// Yaw (radians around +Y) facing along a horizontal direction.
pub fn yaw_from_direction(direction: Vec3) -> f32 {
    direction.x.atan2(direction.z)
}

/// Wraps an angle into `(-PI, PI]`.
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Spherical interpolation between two yaw-only orientations.
///
/// Rotating about a single axis, slerp reduces to interpolating along the
/// shortest arc. `t` is clamped to `[0, 1]`.
pub fn slerp_yaw(current: f32, target: f32, t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    wrap_angle(current + wrap_angle(target - current) * t)
}
