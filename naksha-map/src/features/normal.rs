//! Surface-normal estimation from neighborhood covariance.

use nalgebra::{Matrix3, SymmetricEigen, Vector3};

/// Estimate the surface normal of a neighborhood as the eigenvector of the
/// position covariance with the smallest eigenvalue, oriented so the
/// z-component is non-negative (map z points up).
///
/// Returns `None` for degenerate neighborhoods (fewer than three points or
/// a non-finite covariance).
pub fn estimate_normal(positions: &[Vector3<f32>]) -> Option<Vector3<f32>> {
    if positions.len() < 3 {
        return None;
    }

    let n = positions.len() as f32;
    let mut mean = Vector3::zeros();
    for p in positions {
        mean += p;
    }
    mean /= n;

    let mut cov = Matrix3::zeros();
    for p in positions {
        let d = p - mean;
        cov += d * d.transpose();
    }
    cov /= n;

    if !cov.iter().all(|x| x.is_finite()) {
        return None;
    }

    let eigen = SymmetricEigen::new(cov);
    let mut smallest = 0;
    for i in 1..3 {
        if eigen.eigenvalues[i] < eigen.eigenvalues[smallest] {
            smallest = i;
        }
    }
    let mut normal: Vector3<f32> = eigen.eigenvectors.column(smallest).into_owned();
    normal = normal.try_normalize(1e-9)?;
    if normal.z < 0.0 {
        normal = -normal;
    }
    Some(normal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_plane_normal_is_up() {
        let mut positions = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                positions.push(Vector3::new(i as f32 * 0.1, j as f32 * 0.1, 0.0));
            }
        }
        let normal = estimate_normal(&positions).unwrap();
        assert!(normal.z > 0.999);
    }

    #[test]
    fn test_tilted_plane_normal() {
        // Plane z = x: normal is (-1, 0, 1) / sqrt(2), flipped to z > 0.
        let mut positions = Vec::new();
        for i in 0..4 {
            for j in 0..4 {
                let x = i as f32 * 0.1;
                positions.push(Vector3::new(x, j as f32 * 0.1, x));
            }
        }
        let normal = estimate_normal(&positions).unwrap();
        let expected = Vector3::new(-1.0, 0.0, 1.0).normalize();
        assert!((normal - expected).norm() < 1e-4);
    }

    #[test]
    fn test_degenerate_neighborhood() {
        let positions = vec![Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)];
        assert!(estimate_normal(&positions).is_none());
    }

    #[test]
    fn test_collinear_points_have_some_perpendicular_normal() {
        let positions: Vec<_> = (0..5)
            .map(|i| Vector3::new(i as f32 * 0.1, 0.0, 0.0))
            .collect();
        let normal = estimate_normal(&positions).unwrap();
        assert!(normal.x.abs() < 1e-4);
    }
}
