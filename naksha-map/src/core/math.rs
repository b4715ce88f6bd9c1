//! Angle and surface-normal helpers.
//!
//! All angles are in radians. The map frame follows ROS REP-103:
//! X-forward, Y-left, Z-up.

use std::f32::consts::PI;

use nalgebra::Vector3;

/// Two times PI (full circle in radians).
pub const TWO_PI: f32 = 2.0 * PI;

/// Normalize angle to [-π, π).
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    let mut a = angle % TWO_PI;
    if a >= PI {
        a -= TWO_PI;
    } else if a < -PI {
        a += TWO_PI;
    }
    a
}

/// Wrapped absolute angle between two direction vectors, projected onto
/// the horizontal plane. Returns 0 for degenerate (vertical) directions.
#[inline]
pub fn yaw_between(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let yaw_a = a.y.atan2(a.x);
    let yaw_b = b.y.atan2(b.x);
    if a.x == 0.0 && a.y == 0.0 || b.x == 0.0 && b.y == 0.0 {
        return 0.0;
    }
    normalize_angle(yaw_b - yaw_a).abs()
}

/// Pitch of a surface with unit normal `n`: rotation of the normal from
/// vertical about the map Y axis.
#[inline]
pub fn normal_pitch(n: &Vector3<f32>) -> f32 {
    n.x.atan2(n.z)
}

/// Roll of a surface with unit normal `n`: rotation of the normal from
/// vertical about the map X axis.
#[inline]
pub fn normal_roll(n: &Vector3<f32>) -> f32 {
    n.y.atan2(n.z)
}

/// True if all three components are finite.
#[inline]
pub fn is_finite(v: &Vector3<f32>) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_angle() {
        assert!((normalize_angle(0.0)).abs() < 1e-6);
        assert!((normalize_angle(3.0 * PI).abs() - PI) < 1e-5);
        assert!((normalize_angle(PI / 2.0) - PI / 2.0).abs() < 1e-6);
        assert!((normalize_angle(-5.0 * PI / 2.0) + PI / 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_yaw_between() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 1.0, 0.0);
        assert!((yaw_between(&x, &y) - PI / 2.0).abs() < 1e-6);
        assert!((yaw_between(&x, &x)).abs() < 1e-6);

        // Wrap across the -π/π boundary.
        let a = Vector3::new(-1.0, -0.01, 0.0);
        let b = Vector3::new(-1.0, 0.01, 0.0);
        assert!(yaw_between(&a, &b) < 0.1);
    }

    #[test]
    fn test_vertical_normal_is_flat() {
        let up = Vector3::new(0.0, 0.0, 1.0);
        assert!((normal_pitch(&up)).abs() < 1e-6);
        assert!((normal_roll(&up)).abs() < 1e-6);
    }

    #[test]
    fn test_tilted_normal() {
        // Normal tilted 45 degrees toward +x.
        let n = Vector3::new(1.0, 0.0, 1.0).normalize();
        assert!((normal_pitch(&n) - PI / 4.0).abs() < 1e-6);
        assert!((normal_roll(&n)).abs() < 1e-6);
    }
}
