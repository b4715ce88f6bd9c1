//! Configuration for map maintenance, labeling, and planning.
//!
//! Defaults match field-tested values for a mid-size ground robot on
//! uneven terrain. All distances are meters, all angles radians.

use std::f32::consts::PI;

use nalgebra::Vector3;
use serde::Deserialize;

/// Map store: merge regularization and empty-space ray accounting.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Minimum distance between stored points; closer observations are
    /// merged into the existing point.
    pub points_min_dist: f32,

    /// Minimum cosine between a stored point's direction from the sensor
    /// origin and an incoming ray for the ray to count as passing through.
    pub min_empty_cos: f32,

    /// An incoming ray marks a stored point as passed-through only when the
    /// ray reaches at least `empty_ratio` times the point's distance.
    pub empty_ratio: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            points_min_dist: 0.2,
            min_empty_cos: 0.3,
            empty_ratio: 2.0,
        }
    }
}

/// Feature & label engine thresholds.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Neighborhood cap for feature computation.
    pub neighborhood_knn: usize,

    /// Neighborhood radius for feature computation and graph adjacency.
    pub neighborhood_radius: f32,

    /// Minimum neighbors for a valid normal estimate; below this the point
    /// stays UNKNOWN.
    pub min_normal_pts: usize,

    /// Radius used when estimating normals.
    pub normal_radius: f32,

    /// Maximum normal pitch from vertical before the point is an obstacle.
    pub max_pitch: f32,

    /// Maximum normal roll from vertical before the point is an obstacle.
    pub max_roll: f32,

    /// Bottom of the headroom clearance box above the tangent plane.
    pub clearance_low: f32,

    /// Top of the headroom clearance box.
    pub clearance_high: f32,

    /// Horizontal radius of the clearance box.
    pub clearance_radius: f32,

    /// Neighbors inside the clearance box before the point is an obstacle.
    pub min_points_obstacle: usize,

    /// Maximum ground-offset standard deviation for traversable points.
    pub max_ground_diff_std: f32,

    /// Maximum mean absolute ground offset for traversable points.
    pub max_mean_abs_ground_diff: f32,

    /// Horizontal neighborhood-centroid displacement marking an edge point.
    pub edge_min_centroid_offset: f32,

    /// Traversable points closer than this to an obstacle are demoted.
    pub min_dist_to_obstacle: f32,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            neighborhood_knn: 12,
            neighborhood_radius: 0.5,
            min_normal_pts: 9,
            normal_radius: 0.5,
            max_pitch: 30.0 * PI / 180.0,
            max_roll: 30.0 * PI / 180.0,
            clearance_low: 0.15,
            clearance_high: 0.8,
            clearance_radius: 0.6,
            min_points_obstacle: 3,
            max_ground_diff_std: 0.1,
            max_mean_abs_ground_diff: 0.1,
            edge_min_centroid_offset: 0.75,
            min_dist_to_obstacle: 0.7,
        }
    }
}

/// Graph view edge costs.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Nominal travel speed used to convert distance to time cost.
    pub max_speed: f32,

    /// Nominal turn rate used to convert heading change to time cost.
    pub max_angular_rate: f32,

    /// Weight of the distance term.
    pub distance_weight: f32,

    /// Weight of the distance-scaled roll/pitch penalty.
    pub pose_weight: f32,

    /// Weight of the turning term.
    pub turn_weight: f32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_speed: 1.0,
            max_angular_rate: 1.0,
            distance_weight: 1.06,
            pose_weight: 1.08,
            turn_weight: 0.24,
        }
    }
}

/// Axis-aligned world-frame box in which exploration reward is suppressed,
/// pushing goals away from the start region.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct StagingArea {
    pub min: [f32; 3],
    pub max: [f32; 3],
}

impl StagingArea {
    pub fn contains(&self, p: &Vector3<f32>) -> bool {
        p.x >= self.min[0]
            && p.x <= self.max[0]
            && p.y >= self.min[1]
            && p.y <= self.max[1]
            && p.z >= self.min[2]
            && p.z <= self.max[2]
    }
}

/// Planner: start selection, exploration reward shaping.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Minimum map size before planning is attempted.
    pub min_map_points: usize,

    /// Pick the start uniformly among traversable candidates instead of the
    /// closest one.
    pub random_start: bool,

    /// Observation distance below which a point counts as fully seen.
    pub min_vp_distance: f32,

    /// Observation distance above which a point counts as fully unseen.
    pub max_vp_distance: f32,

    /// Weight of self-only coverage against fleet-wide coverage.
    pub self_factor: f32,

    /// Minimum path cost for an exploration goal; filters out goals next to
    /// the robot.
    pub min_goal_path_cost: f32,

    /// Reward-suppression box around the staging area. Disabled when unset.
    pub staging_area: Option<StagingArea>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_map_points: 64,
            random_start: false,
            min_vp_distance: 1.5,
            max_vp_distance: 5.0,
            self_factor: 0.25,
            min_goal_path_cost: 1.0,
            staging_area: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let label = LabelConfig::default();
        assert!(label.min_normal_pts <= label.neighborhood_knn);
        assert!(label.clearance_low < label.clearance_high);

        let planner = PlannerConfig::default();
        assert!(planner.min_vp_distance < planner.max_vp_distance);
        assert!(planner.staging_area.is_none());
    }

    #[test]
    fn test_staging_area_contains() {
        let area = StagingArea {
            min: [-60.0, -30.0, -30.0],
            max: [0.0, 30.0, 30.0],
        };
        assert!(area.contains(&Vector3::new(-10.0, 0.0, 0.0)));
        assert!(!area.contains(&Vector3::new(5.0, 0.0, 0.0)));
        assert!(!area.contains(&Vector3::new(-10.0, 40.0, 0.0)));
    }
}
