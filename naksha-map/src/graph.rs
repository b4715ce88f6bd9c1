//! Graph view over the map store.
//!
//! The view owns no edges: vertices are point indices and out-edges are
//! derived on demand from a radius query, so the graph always reflects the
//! map state under the locks the caller holds. An edge exists between two
//! points within the neighborhood radius when both are traversable or edge
//! points; its cost approximates travel time with roll/pitch and turning
//! penalties.

use nalgebra::Vector3;

use crate::config::{GraphConfig, LabelConfig};
use crate::core::math::{normal_pitch, normal_roll, yaw_between};
use crate::core::MapPoint;
use crate::map::PointIndex;

/// Read-only graph adapter over the point array and spatial index.
pub struct GraphView<'a> {
    points: &'a [MapPoint],
    index: &'a PointIndex,
    label: &'a LabelConfig,
    config: &'a GraphConfig,
}

impl<'a> GraphView<'a> {
    pub fn new(
        points: &'a [MapPoint],
        index: &'a PointIndex,
        label: &'a LabelConfig,
        config: &'a GraphConfig,
    ) -> Self {
        Self {
            points,
            index,
            label,
            config,
        }
    }

    pub fn num_vertices(&self) -> usize {
        self.points.len()
    }

    /// Neighbor indices of `v` within the adjacency radius, excluding `v`.
    ///
    /// The neighbor list is snapshotted from the index before the caller
    /// iterates, so it stays valid for the whole relaxation step.
    pub fn out_neighbors(&self, v: usize) -> Vec<usize> {
        self.index
            .within(&self.points[v].position, self.label.neighborhood_radius)
            .into_iter()
            .filter(|&(u, _)| u != v)
            .map(|(u, _)| u)
            .collect()
    }

    /// Cost of traversing the edge `(v, u)`, having arrived at `v` along
    /// `prev_direction` (None at the search source).
    ///
    /// Returns `f32::INFINITY` for impassable edges, which prunes them from
    /// the search. Finite costs are strictly positive.
    pub fn edge_cost(&self, v: usize, u: usize, prev_direction: Option<&Vector3<f32>>) -> f32 {
        let from = &self.points[v];
        let to = &self.points[u];
        if !from.flags.passable() || !to.flags.passable() {
            return f32::INFINITY;
        }

        let delta = to.position - from.position;
        let distance = delta.norm();
        if distance <= 0.0 {
            return f32::INFINITY;
        }
        let distance_time = distance / self.config.max_speed;

        // Roll/pitch penalty of the target surface scales the distance term.
        let pose_cost = normal_roll(&to.normal).abs() / self.label.max_roll
            + normal_pitch(&to.normal).abs() / self.label.max_pitch;

        let turn_time = match prev_direction {
            Some(prev) => yaw_between(prev, &delta) / self.config.max_angular_rate,
            None => 0.0,
        };

        self.config.distance_weight * distance_time
            + self.config.pose_weight * distance_time * pose_cost
            + self.config.turn_weight * turn_time
    }

    /// Direction of the edge `(v, u)`.
    pub fn direction(&self, v: usize, u: usize) -> Vector3<f32> {
        self.points[u].position - self.points[v].position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PointFlags;

    fn make_points(positions: &[[f32; 3]], flags: PointFlags) -> (Vec<MapPoint>, PointIndex) {
        let mut points = Vec::new();
        let mut index = PointIndex::new();
        for p in positions {
            let pos = Vector3::new(p[0], p[1], p[2]);
            let mut point = MapPoint::new(pos);
            point.flags = flags;
            point.normal = Vector3::new(0.0, 0.0, 1.0);
            index.insert(&pos, points.len());
            points.push(point);
        }
        (points, index)
    }

    #[test]
    fn test_passable_edge_has_finite_cost() {
        let (points, index) = make_points(
            &[[0.0, 0.0, 0.0], [0.3, 0.0, 0.0]],
            PointFlags::TRAVERSABLE,
        );
        let label = LabelConfig::default();
        let config = GraphConfig::default();
        let graph = GraphView::new(&points, &index, &label, &config);

        let cost = graph.edge_cost(0, 1, None);
        assert!(cost.is_finite());
        assert!(cost > 0.0);
        // Flat surface, no turn: pure weighted distance.
        assert!((cost - 1.06 * 0.3).abs() < 1e-5);
    }

    #[test]
    fn test_obstacle_edge_is_pruned() {
        let (mut points, index) = make_points(
            &[[0.0, 0.0, 0.0], [0.3, 0.0, 0.0]],
            PointFlags::TRAVERSABLE,
        );
        points[1].flags = PointFlags::OBSTACLE;
        let label = LabelConfig::default();
        let config = GraphConfig::default();
        let graph = GraphView::new(&points, &index, &label, &config);
        assert!(graph.edge_cost(0, 1, None).is_infinite());
    }

    #[test]
    fn test_turning_penalty() {
        let (points, index) = make_points(
            &[[0.0, 0.0, 0.0], [0.3, 0.0, 0.0]],
            PointFlags::TRAVERSABLE,
        );
        let label = LabelConfig::default();
        let config = GraphConfig::default();
        let graph = GraphView::new(&points, &index, &label, &config);

        let straight = graph.edge_cost(0, 1, Some(&Vector3::new(1.0, 0.0, 0.0)));
        let turned = graph.edge_cost(0, 1, Some(&Vector3::new(0.0, 1.0, 0.0)));
        assert!(turned > straight);
    }

    #[test]
    fn test_out_neighbors_respects_radius() {
        let (points, index) = make_points(
            &[[0.0, 0.0, 0.0], [0.3, 0.0, 0.0], [5.0, 0.0, 0.0]],
            PointFlags::TRAVERSABLE,
        );
        let label = LabelConfig::default();
        let config = GraphConfig::default();
        let graph = GraphView::new(&points, &index, &label, &config);
        let neighbors = graph.out_neighbors(0);
        assert_eq!(neighbors, vec![1]);
    }
}
