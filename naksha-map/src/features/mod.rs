//! Per-point feature computation and traversability labeling.
//!
//! For each dirty point the engine estimates a surface normal from the
//! neighborhood covariance, summarizes the ground-offset distribution,
//! counts clearance-box occupancy, and derives the label bits. Labels are
//! deterministic given the point set and a parameter snapshot; the engine
//! never mutates the map itself, it returns updates for the store to apply.

mod normal;

pub use normal::estimate_normal;

use nalgebra::Vector3;

use crate::config::LabelConfig;
use crate::core::math::{normal_pitch, normal_roll};
use crate::core::{MapPoint, PointFlags};
use crate::map::PointIndex;

/// Result of a feature pass over one point.
#[derive(Clone, Debug)]
pub struct FeatureUpdate {
    pub normal: Vector3<f32>,
    pub num_normal_pts: u16,
    pub ground_diff_min: f32,
    pub ground_diff_max: f32,
    pub ground_diff_std: f32,
    pub ground_abs_diff_mean: f32,
    pub num_obstacle_pts: u16,
    pub flags: PointFlags,
}

impl FeatureUpdate {
    fn unknown(num_normal_pts: usize) -> Self {
        Self {
            normal: Vector3::zeros(),
            num_normal_pts: num_normal_pts as u16,
            ground_diff_min: 0.0,
            ground_diff_max: 0.0,
            ground_diff_std: 0.0,
            ground_abs_diff_mean: 0.0,
            num_obstacle_pts: 0,
            flags: PointFlags::UNKNOWN,
        }
    }
}

/// Compute features and the threshold-based label for point `v`.
///
/// Covers neighborhood statistics, the normal, ground-offset stats,
/// clearance occupancy, and the normal/threshold labels. The
/// obstacle-distance demotion and `num_edge_neighbors` maintenance depend on
/// other points' labels and are applied separately by the store.
pub fn compute_update(
    points: &[MapPoint],
    index: &PointIndex,
    v: usize,
    config: &LabelConfig,
) -> FeatureUpdate {
    let center = points[v].position;
    let neighbors: Vec<(usize, f32)> = index
        .within_capped(&center, config.neighborhood_radius, config.neighborhood_knn)
        .into_iter()
        .filter(|&(u, _)| u != v)
        .collect();

    // The normal is estimated from the tighter normal_radius subset.
    let normal_positions: Vec<Vector3<f32>> = neighbors
        .iter()
        .filter(|&&(_, dist)| dist <= config.normal_radius)
        .map(|&(u, _)| points[u].position)
        .collect();
    if normal_positions.len() < config.min_normal_pts {
        return FeatureUpdate::unknown(normal_positions.len());
    }

    let positions: Vec<Vector3<f32>> = neighbors
        .iter()
        .map(|&(u, _)| points[u].position)
        .collect();

    let normal = match estimate_normal(&normal_positions) {
        Some(n) => n,
        None => return FeatureUpdate::unknown(normal_positions.len()),
    };

    // Ground-offset distribution along the normal.
    let mut diff_min = f32::INFINITY;
    let mut diff_max = f32::NEG_INFINITY;
    let mut sum = 0.0f32;
    let mut sum_sq = 0.0f32;
    let mut sum_abs = 0.0f32;
    for p in &positions {
        let d = (p - center).dot(&normal);
        diff_min = diff_min.min(d);
        diff_max = diff_max.max(d);
        sum += d;
        sum_sq += d * d;
        sum_abs += d.abs();
    }
    let n = positions.len() as f32;
    let mean = sum / n;
    let var = (sum_sq / n - mean * mean).max(0.0);

    let num_obstacle_pts = count_clearance_points(points, index, v, &center, &normal, config);

    // Preliminary label from the normal tilt alone.
    let steep = normal_pitch(&normal).abs() > config.max_pitch
        || normal_roll(&normal).abs() > config.max_roll;

    let ground_diff_std = var.sqrt();
    let ground_abs_diff_mean = sum_abs / n;

    let mut flags = PointFlags::empty();
    if steep
        || num_obstacle_pts as usize >= config.min_points_obstacle
        || ground_diff_std > config.max_ground_diff_std
        || ground_abs_diff_mean > config.max_mean_abs_ground_diff
    {
        flags.insert(PointFlags::OBSTACLE);
    } else if is_edge(&center, &positions, config) {
        flags.insert(PointFlags::EDGE);
    } else {
        flags.insert(PointFlags::TRAVERSABLE);
    }

    FeatureUpdate {
        normal,
        num_normal_pts: normal_positions.len() as u16,
        ground_diff_min: diff_min,
        ground_diff_max: diff_max,
        ground_diff_std,
        ground_abs_diff_mean,
        num_obstacle_pts,
        flags,
    }
}

/// Count points inside the headroom box above `center`'s tangent plane:
/// normal offset within `[clearance_low, clearance_high]` and tangent
/// distance within `clearance_radius`.
fn count_clearance_points(
    points: &[MapPoint],
    index: &PointIndex,
    v: usize,
    center: &Vector3<f32>,
    normal: &Vector3<f32>,
    config: &LabelConfig,
) -> u16 {
    let reach = (config.clearance_radius * config.clearance_radius
        + config.clearance_high * config.clearance_high)
        .sqrt();
    let mut count = 0u16;
    for (u, _) in index.within(center, reach) {
        if u == v {
            continue;
        }
        let offset = points[u].position - center;
        let height = offset.dot(normal);
        if height < config.clearance_low || height > config.clearance_high {
            continue;
        }
        let lateral = offset - normal * height;
        if lateral.norm() <= config.clearance_radius {
            count += 1;
        }
    }
    count
}

/// A point is an edge when its neighborhood lies mostly to one side: the
/// horizontal centroid offset exceeds `edge_min_centroid_offset` times the
/// mean horizontal neighbor distance.
fn is_edge(center: &Vector3<f32>, neighbors: &[Vector3<f32>], config: &LabelConfig) -> bool {
    let mut centroid = Vector3::zeros();
    let mut mean_dist = 0.0f32;
    for p in neighbors {
        let mut offset = p - center;
        offset.z = 0.0;
        centroid += offset;
        mean_dist += offset.norm();
    }
    let n = neighbors.len() as f32;
    centroid /= n;
    mean_dist /= n;
    if mean_dist <= 0.0 {
        return false;
    }
    centroid.norm() >= config.edge_min_centroid_offset * mean_dist
}

/// True if any OBSTACLE point lies within `min_dist_to_obstacle` of `v`.
pub fn too_close_to_obstacle(
    points: &[MapPoint],
    index: &PointIndex,
    v: usize,
    config: &LabelConfig,
) -> bool {
    index
        .within(&points[v].position, config.min_dist_to_obstacle)
        .into_iter()
        .any(|(u, _)| u != v && points[u].flags.contains(PointFlags::OBSTACLE))
}

/// Count radius-neighbors of `v` that carry the EDGE flag.
pub fn count_edge_neighbors(
    points: &[MapPoint],
    index: &PointIndex,
    v: usize,
    radius: f32,
) -> u16 {
    index
        .within(&points[v].position, radius)
        .into_iter()
        .filter(|&(u, _)| u != v && points[u].flags.contains(PointFlags::EDGE))
        .count() as u16
}
