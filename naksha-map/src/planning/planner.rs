//! Planning tick: start selection, shortest paths, goal selection, path
//! assembly.
//!
//! Planning is stateless: every tick recomputes costs from the current map
//! under the store's plan access, and a failed tick leaves everything but
//! the transient per-point plan fields untouched.

use nalgebra::Vector3;
use rand::Rng;
use thiserror::Error;

use crate::config::{GraphConfig, LabelConfig, PlannerConfig};
use crate::core::{MapPoint, PlannedPath, Pose};
use crate::graph::GraphView;
use crate::map::{PointIndex, TerrainMap};
use crate::viewpoints::{ViewpointIndex, ViewpointLog};

use super::dijkstra::{shortest_paths, ShortestPaths};

/// A plan request. `None` goal selects exploration mode; `None` start means
/// the caller could not resolve a start position.
#[derive(Clone, Copy, Debug)]
pub struct PlanRequest {
    pub start: Option<Vector3<f32>>,
    pub goal: Option<Vector3<f32>>,
    /// Start-search radius in meters; non-positive falls back to the
    /// neighborhood radius.
    pub tolerance: f32,
}

impl Default for PlanRequest {
    fn default() -> Self {
        Self {
            start: None,
            goal: None,
            tolerance: 2.0,
        }
    }
}

impl PlanRequest {
    /// Exploration from `start`.
    pub fn exploration(start: Vector3<f32>) -> Self {
        Self {
            start: Some(start),
            ..Self::default()
        }
    }

    /// Goal-directed plan from `start` to `goal`.
    pub fn to_goal(start: Vector3<f32>, goal: Vector3<f32>) -> Self {
        Self {
            start: Some(start),
            goal: Some(goal),
            ..Self::default()
        }
    }
}

/// Why a planning tick produced no path.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    #[error("cannot plan in map with {size} < {required} points")]
    MapTooSmall { size: usize, required: usize },

    #[error("no start position available")]
    NoStart,

    #[error("no traversable point within {radius} m of start")]
    NoTraversableStart { radius: f32 },

    #[error("no feasible goal")]
    NoFeasibleGoal,
}

/// A successful plan.
#[derive(Clone, Debug)]
pub struct Plan {
    pub path: PlannedPath,
    /// Map index of the start vertex.
    pub start_index: usize,
    /// Map index of the selected goal vertex.
    pub goal_index: usize,
    /// Travel cost from start to goal.
    pub cost: f32,
}

/// The planning core.
pub struct Planner {
    label: LabelConfig,
    graph: GraphConfig,
    config: PlannerConfig,
}

impl Planner {
    pub fn new(label: LabelConfig, graph: GraphConfig, config: PlannerConfig) -> Self {
        Self {
            label,
            graph,
            config,
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Run one planning tick against the map.
    ///
    /// Holds the map's plan access (data and index) for the duration.
    pub fn plan(
        &self,
        map: &TerrainMap,
        viewpoints: &ViewpointLog,
        req: &PlanRequest,
    ) -> Result<Plan, PlanError> {
        let size = map.len();
        if size < self.config.min_map_points {
            return Err(PlanError::MapTooSmall {
                size,
                required: self.config.min_map_points,
            });
        }

        let start = req.start.ok_or(PlanError::NoStart)?;

        map.with_plan_access(|points, index| {
            let v_start = self.pick_start(points, index, &start, req.tolerance)?;

            let graph = GraphView::new(points, index, &self.label, &self.graph);
            let paths = shortest_paths(&graph, v_start);

            for (v, point) in points.iter_mut().enumerate() {
                point.path_cost = paths.cost[v];
                point.reward = 0.0;
                point.relative_cost = f32::INFINITY;
            }

            let v_goal = match req.goal {
                Some(goal) => self.pick_goal_directed(points, &paths, &goal)?,
                None => self.pick_exploration_goal(points, &paths, viewpoints)?,
            };

            let trace = paths
                .trace(v_start, v_goal)
                .ok_or(PlanError::NoFeasibleGoal)?;
            let path = assemble_path(points, &start, &trace);

            log::debug!(
                "Planned {} poses from vertex {} to {} (cost {:.3}).",
                path.len(),
                v_start,
                v_goal,
                paths.cost[v_goal]
            );

            Ok(Plan {
                path,
                start_index: v_start,
                goal_index: v_goal,
                cost: paths.cost[v_goal],
            })
        })
    }

    /// Closest passable point within the tolerance radius of the start, or
    /// a uniformly random candidate under `random_start`.
    fn pick_start(
        &self,
        points: &[MapPoint],
        index: &PointIndex,
        start: &Vector3<f32>,
        tolerance: f32,
    ) -> Result<usize, PlanError> {
        let radius = if tolerance > 0.0 {
            tolerance
        } else {
            self.label.neighborhood_radius
        };
        let mut candidates: Vec<(usize, f32)> = index
            .within(start, radius)
            .into_iter()
            .filter(|&(v, _)| points[v].flags.passable())
            .collect();
        if candidates.is_empty() {
            return Err(PlanError::NoTraversableStart { radius });
        }
        if self.config.random_start {
            let pick = rand::thread_rng().gen_range(0..candidates.len());
            return Ok(candidates[pick].0);
        }
        candidates.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(candidates[0].0)
    }

    /// Reachable vertex closest to the requested goal.
    fn pick_goal_directed(
        &self,
        points: &[MapPoint],
        paths: &ShortestPaths,
        goal: &Vector3<f32>,
    ) -> Result<usize, PlanError> {
        let mut best: Option<(usize, f32)> = None;
        for (v, point) in points.iter().enumerate() {
            if !paths.cost[v].is_finite() {
                continue;
            }
            let dist = (point.position - goal).norm();
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((v, dist));
            }
        }
        best.map(|(v, _)| v).ok_or(PlanError::NoFeasibleGoal)
    }

    /// Exploration goal: the vertex minimizing `path_cost / reward` among
    /// rewarding vertices beyond the minimum path cost.
    ///
    /// The reward favors points not yet observed by this robot or the rest
    /// of the fleet, scaled up near geometric frontiers, and suppressed
    /// inside the configured staging area.
    fn pick_exploration_goal(
        &self,
        points: &mut [MapPoint],
        paths: &ShortestPaths,
        viewpoints: &ViewpointLog,
    ) -> Result<usize, PlanError> {
        // Per-point annotations take precedence; the viewpoint log fills in
        // for points the viewpoint task has not reached yet.
        let own_index = viewpoints.own_index();
        let other_index = viewpoints.other_index();

        let mut best: Option<(usize, f32)> = None;
        for (v, point) in points.iter_mut().enumerate() {
            let r_self = self.coverage_reward(point.dist_to_actor, &point.position, &own_index);
            let r_other =
                self.coverage_reward(point.dist_to_other_actors, &point.position, &other_index);

            let mut reward = r_self.min(r_other).max(self.config.self_factor * r_self)
                * (1.0 + f32::from(point.num_edge_neighbors));

            if let Some(area) = &self.config.staging_area {
                if area.contains(&point.position) {
                    reward /= 1.0 + point.position.norm().powi(4);
                }
            }

            point.reward = reward;
            point.relative_cost = paths.cost[v] / reward.max(1e-6);

            if reward > 0.0
                && paths.cost[v].is_finite()
                && paths.cost[v] > self.config.min_goal_path_cost
                && best.map_or(true, |(_, c)| point.relative_cost < c)
            {
                best = Some((v, point.relative_cost));
            }
        }
        best.map(|(v, _)| v).ok_or(PlanError::NoFeasibleGoal)
    }

    /// Normalized not-yet-observed score in [0, 1]: zero at
    /// `min_vp_distance`, one at `max_vp_distance` or for never-observed
    /// points.
    fn coverage_reward(
        &self,
        annotated: f32,
        position: &Vector3<f32>,
        fallback: &ViewpointIndex,
    ) -> f32 {
        let dist = if annotated.is_nan() {
            fallback.distance(position)
        } else {
            annotated
        };
        if !dist.is_finite() {
            return 1.0;
        }
        ((dist - self.config.min_vp_distance)
            / (self.config.max_vp_distance - self.config.min_vp_distance))
            .clamp(0.0, 1.0)
    }
}

/// Build the published path: the requested start pose first, then one pose
/// per traced vertex, oriented along the segment with the z-axis following
/// the surface normal (flipped to non-negative world z).
fn assemble_path(points: &[MapPoint], start: &Vector3<f32>, trace: &[usize]) -> PlannedPath {
    let mut path = PlannedPath::new();
    path.poses.reserve(trace.len() + 1);
    path.poses.push(Pose::from_position(*start));
    let mut prev = *start;
    for &v in trace {
        let position = points[v].position;
        path.poses
            .push(Pose::from_segment(position, position - prev, points[v].normal));
        prev = position;
    }
    path
}
