//! Poses and planned paths in the map frame.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

/// A stamped 6-DoF pose in the map frame.
#[derive(Clone, Copy, Debug)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub orientation: UnitQuaternion<f32>,
}

impl Pose {
    /// Pose at `position` with identity orientation.
    pub fn from_position(position: Vector3<f32>) -> Self {
        Self {
            position,
            orientation: UnitQuaternion::identity(),
        }
    }

    /// Pose at `position` oriented so that the x-axis points along
    /// `direction` and the z-axis follows the surface `normal`, flipped to
    /// have non-negative world z. The y-axis closes the right-handed frame.
    ///
    /// Falls back to identity orientation for degenerate inputs.
    pub fn from_segment(position: Vector3<f32>, direction: Vector3<f32>, normal: Vector3<f32>) -> Self {
        let x = match direction.try_normalize(1e-6) {
            Some(x) => x,
            None => return Self::from_position(position),
        };
        let mut z = if normal.norm_squared() > 1e-12 {
            normal
        } else {
            Vector3::new(0.0, 0.0, 1.0)
        };
        // Map z points upward.
        if z.z < 0.0 {
            z = -z;
        }
        let y = match z.cross(&x).try_normalize(1e-6) {
            Some(y) => y,
            None => return Self::from_position(position),
        };
        // Re-orthogonalize z so the columns form a proper rotation.
        let z = x.cross(&y);
        let m = Matrix3::from_columns(&[x, y, z]);
        Self {
            position,
            orientation: UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(m)),
        }
    }
}

/// An ordered sequence of poses from the current robot pose to a goal.
#[derive(Clone, Debug, Default)]
pub struct PlannedPath {
    pub poses: Vec<Pose>,
}

impl PlannedPath {
    pub fn new() -> Self {
        Self { poses: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// Sum of segment lengths in meters.
    pub fn length(&self) -> f32 {
        self.poses
            .windows(2)
            .map(|w| (w[1].position - w[0].position).norm())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_segment_axes() {
        let pose = Pose::from_segment(
            Vector3::zeros(),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        );
        let x = pose.orientation * Vector3::x();
        let z = pose.orientation * Vector3::z();
        assert!((x - Vector3::new(1.0, 0.0, 0.0)).norm() < 1e-5);
        assert!((z - Vector3::new(0.0, 0.0, 1.0)).norm() < 1e-5);
    }

    #[test]
    fn test_from_segment_flips_downward_normal() {
        let pose = Pose::from_segment(
            Vector3::zeros(),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, -1.0),
        );
        let z = pose.orientation * Vector3::z();
        assert!(z.z > 0.9);
    }

    #[test]
    fn test_degenerate_direction_is_identity() {
        let pose = Pose::from_segment(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::zeros(),
            Vector3::new(0.0, 0.0, 1.0),
        );
        assert_eq!(pose.orientation, UnitQuaternion::identity());
    }

    #[test]
    fn test_path_length() {
        let mut path = PlannedPath::new();
        path.poses.push(Pose::from_position(Vector3::zeros()));
        path.poses.push(Pose::from_position(Vector3::new(1.0, 0.0, 0.0)));
        path.poses.push(Pose::from_position(Vector3::new(1.0, 2.0, 0.0)));
        assert!((path.length() - 3.0).abs() < 1e-6);
    }
}
