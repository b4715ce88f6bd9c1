//! The planner node: ingestion, planning and viewpoint gathering around a
//! shared terrain map.
//!
//! Every public entry point checks the initialization flag and bails out
//! during startup. Failures are local: a rejected cloud or a failed plan
//! changes nothing but the log.

use std::time::{Duration, Instant};

use nalgebra::Vector3;
use parking_lot::Mutex;

use naksha_map::{
    MergeStats, Plan, PlannedPath, PlanRequest, Planner, TerrainMap, ViewpointLog,
};

use crate::bus::Publisher;
use crate::cloud::{build_map_cloud, PointCloud};
use crate::config::NodeConfig;
use crate::error::{NavError, Result};
use crate::robots::find_robots;
use crate::transforms::TransformBuffer;

/// Input points closer than this to the sensor are the robot seeing itself.
const MIN_POINT_RANGE: f32 = 1.0;
/// Input points farther than this are mostly noise.
const MAX_POINT_RANGE: f32 = 25.0;
/// Minimum surviving points for a merge to be worth it.
const MIN_MERGE_POINTS: usize = 16;
/// Robot-filter exclusion radius.
const ROBOT_FILTER_RADIUS: f32 = 1.0;
/// Half extent of the local diagnostic cloud window.
const LOCAL_WINDOW_HALF_EXTENT: f32 = 10.0;

/// Monotonic seconds since node start.
pub struct Clock {
    epoch: Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// A published path with its header.
#[derive(Clone, Debug)]
pub struct PathMessage {
    pub frame_id: String,
    pub stamp: f64,
    pub path: PlannedPath,
}

/// Diagnostic and output publishers.
pub struct NodePublishers {
    pub path: Publisher<PathMessage>,
    pub map_cloud: Publisher<PointCloud>,
    pub dirty_cloud: Publisher<PointCloud>,
    pub local_cloud: Publisher<PointCloud>,
    pub viewpoints_cloud: Publisher<PointCloud>,
    pub other_viewpoints_cloud: Publisher<PointCloud>,
}

impl NodePublishers {
    fn new(queue_size: usize) -> Self {
        Self {
            path: Publisher::new(queue_size),
            map_cloud: Publisher::new(queue_size),
            dirty_cloud: Publisher::new(queue_size),
            local_cloud: Publisher::new(queue_size),
            viewpoints_cloud: Publisher::new(queue_size),
            other_viewpoints_cloud: Publisher::new(queue_size),
        }
    }
}

/// The exploration planner node.
pub struct PlannerNode {
    config: NodeConfig,
    map: TerrainMap,
    planner: Planner,
    clock: Clock,
    pub tf: TransformBuffer,
    pub publishers: NodePublishers,
    viewpoints: Mutex<ViewpointLog>,
    last_request: Mutex<PlanRequest>,
    initialized: Mutex<bool>,
}

impl PlannerNode {
    pub fn new(mut config: NodeConfig) -> Self {
        config.normalize();
        let map = TerrainMap::new(config.map.clone(), config.label.clone());
        let planner = Planner::new(
            config.label.clone(),
            config.graph.clone(),
            config.planner.clone(),
        );
        let tf = TransformBuffer::new(&config.map_frame);
        let publishers = NodePublishers::new(config.input_queue_size);
        let viewpoints = Mutex::new(ViewpointLog::with_rate(config.viewpoints_update_freq, 2.0));
        Self {
            config,
            map,
            planner,
            clock: Clock::new(),
            tf,
            publishers,
            viewpoints,
            last_request: Mutex::new(PlanRequest::default()),
            initialized: Mutex::new(false),
        }
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn map(&self) -> &TerrainMap {
        &self.map
    }

    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    fn check_initialized(&self) -> Result<()> {
        if *self.initialized.lock() {
            Ok(())
        } else {
            Err(NavError::NotInitialized)
        }
    }

    /// Mark the node ready. Exposed for embedding and tests; `wait_for_robots`
    /// is the normal path.
    pub fn set_initialized(&self) {
        *self.initialized.lock() = true;
    }

    /// Startup phase: discover the other robots, then accept input.
    pub fn wait_for_robots(&self) {
        let started = Instant::now();
        log::info!("Waiting for other robots...");
        find_robots(
            &self.config,
            &self.tf,
            Duration::from_secs_f64(self.config.robot_discovery_timeout),
        );
        self.set_initialized();
        log::info!("Initialized ({:.3} s).", started.elapsed().as_secs_f64());
    }

    /// Latest robot position in the map frame.
    pub fn robot_position(&self) -> Option<Vector3<f32>> {
        self.tf
            .latest(&self.config.robot_frame)
            .map(|(_, tf)| tf.translation)
    }

    /// Ingest one input cloud: validate, transform into the map frame,
    /// range- and robot-filter, merge, relabel, publish diagnostics.
    pub fn ingest_cloud(&self, cloud: &PointCloud) -> Result<MergeStats> {
        self.check_initialized()?;
        cloud.validate()?;

        let age = self.now() - cloud.stamp;
        if age > self.config.max_cloud_age {
            return Err(NavError::StaleCloud {
                age,
                max_age: self.config.max_cloud_age,
            });
        }

        let remaining = (self.config.transform_timeout - age).max(0.0);
        let transform = self.tf.wait_for(
            &cloud.frame_id,
            cloud.stamp,
            Duration::from_secs_f64(remaining),
        )?;

        let robots: Vec<(String, Vector3<f32>)> = if self.config.filter_robots {
            find_robots(&self.config, &self.tf, Duration::from_secs(3))
        } else {
            Vec::new()
        };

        let input = cloud.read_vec3("x")?;
        let mut points = Vec::with_capacity(input.len());
        for p in &input {
            let range = p.norm();
            if !(MIN_POINT_RANGE..=MAX_POINT_RANGE).contains(&range) {
                continue;
            }
            let world = transform.apply(p);
            if robots
                .iter()
                .any(|(_, r)| (world - r).norm() < ROBOT_FILTER_RADIUS)
            {
                continue;
            }
            points.push(world);
        }
        if points.len() < MIN_MERGE_POINTS {
            return Err(NavError::TooFewPoints {
                kept: points.len(),
                required: MIN_MERGE_POINTS,
            });
        }
        log::debug!(
            "{} / {} points kept by distance and robot filters.",
            points.len(),
            input.len()
        );

        let origin = transform.apply(&Vector3::zeros());
        let stats = self.map.merge(&points, &origin);
        // Snapshot the dirty set before the label pass consumes it, so the
        // dirty diagnostic cloud reflects the freshly relabeled points.
        let dirty = if self.publishers.dirty_cloud.has_subscribers() {
            self.map.dirty_indices()
        } else {
            Vec::new()
        };
        self.map.update_dirty();

        self.publish_map_diagnostics(cloud.stamp, &origin, &dirty);
        Ok(stats)
    }

    /// Bulk-load an initial map cloud, already in the map frame.
    pub fn ingest_map(&self, cloud: &PointCloud) -> Result<MergeStats> {
        self.check_initialized()?;
        cloud.validate()?;
        if cloud.frame_id != self.config.map_frame {
            return Err(NavError::InvalidCloud(format!(
                "cloud frame {} does not match map frame {}",
                cloud.frame_id, self.config.map_frame
            )));
        }
        let points = cloud.read_vec3("x")?;
        let stats = self.map.bulk_load(&points);
        self.map.update_dirty();
        log::info!("Loaded input map with {} points.", stats.added);
        Ok(stats)
    }

    fn publish_map_diagnostics(&self, stamp: f64, origin: &Vector3<f32>, dirty: &[usize]) {
        let frame = &self.config.map_frame;
        if !dirty.is_empty() && self.publishers.dirty_cloud.has_subscribers() {
            let points = self.map.points_at(dirty);
            self.publishers
                .dirty_cloud
                .publish(build_map_cloud(&points, frame, stamp));
        }
        if self.publishers.map_cloud.has_subscribers() {
            self.publishers
                .map_cloud
                .publish(build_map_cloud(&self.map.clone_points(), frame, stamp));
        }
        if self.publishers.local_cloud.has_subscribers() {
            let local = self.map.clone_window(origin, LOCAL_WINDOW_HALF_EXTENT);
            self.publishers
                .local_cloud
                .publish(build_map_cloud(&local, frame, stamp));
        }
    }

    /// Handle an explicit plan request. The request is retained so the
    /// periodic tick keeps replanning toward the same goal.
    pub fn request_plan(&self, req: PlanRequest) -> Result<Plan> {
        self.check_initialized()?;
        *self.last_request.lock() = req;
        self.plan_once()
    }

    /// One planning tick over the retained request.
    pub fn plan_once(&self) -> Result<Plan> {
        self.check_initialized()?;
        let mut req = *self.last_request.lock();

        if req.start.is_none() {
            let position = self.robot_position().ok_or_else(|| NavError::Transform {
                frame: self.config.robot_frame.clone(),
                target: self.config.map_frame.clone(),
                reason: "no robot transform yet".to_string(),
            })?;
            req.start = Some(position);
        }

        let viewpoints = self.viewpoints.lock().clone();
        let started = Instant::now();
        let plan = self.planner.plan(&self.map, &viewpoints, &req)?;

        log::info!(
            "Planned {} poses in {} ({:.3} s).",
            plan.path.len(),
            self.config.map_frame,
            started.elapsed().as_secs_f64()
        );
        self.publishers.path.publish(PathMessage {
            frame_id: self.config.map_frame.clone(),
            stamp: self.now(),
            path: plan.path.clone(),
        });
        Ok(plan)
    }

    /// One viewpoint tick: remember where every robot currently is, both in
    /// the bounded log and as per-point visit annotations on the map.
    pub fn gather_viewpoints(&self) {
        if self.check_initialized().is_err() {
            return;
        }
        let stamp = self.now();
        let max_distance = self.planner.config().max_vp_distance;
        let mut viewpoints = self.viewpoints.lock();
        for frame in self.config.robot_frames.values() {
            let Some((_, transform)) = self.tf.latest(frame) else {
                log::warn!("Could not get robot {} position.", frame);
                continue;
            };
            let position = transform.translation;
            let own = *frame == self.config.robot_frame;
            if own {
                viewpoints.record_own(position);
            } else {
                viewpoints.record_other(position);
            }
            self.map.mark_visited(&position, stamp, own, max_distance);
        }

        if self.publishers.viewpoints_cloud.has_subscribers() {
            let points: Vec<Vector3<f32>> = viewpoints.own().copied().collect();
            self.publishers.viewpoints_cloud.publish(PointCloud::from_points(
                &self.config.map_frame,
                stamp,
                &points,
            ));
        }
        if self.publishers.other_viewpoints_cloud.has_subscribers() {
            let points: Vec<Vector3<f32>> = viewpoints.other().copied().collect();
            self.publishers
                .other_viewpoints_cloud
                .publish(PointCloud::from_points(&self.config.map_frame, stamp, &points));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transforms::Transform;
    use naksha_map::{LabelConfig, PlanError};

    fn test_config() -> NodeConfig {
        let mut config = NodeConfig::default();
        config.robot_frame = "X1/base_footprint".to_string();
        config
            .robot_frames
            .insert("X1".to_string(), "X1/base_footprint".to_string());
        config
            .robot_frames
            .insert("X2".to_string(), "X2/base_footprint".to_string());
        config.label = LabelConfig {
            min_normal_pts: 5,
            edge_min_centroid_offset: 0.4,
            min_dist_to_obstacle: 0.3,
            ..LabelConfig::default()
        };
        config.planner.min_map_points = 32;
        config
    }

    /// Ground patch seen from a sensor 1.5 m above: all points fall inside
    /// the [1, 25] m range band.
    fn ground_cloud(stamp: f64) -> PointCloud {
        let mut points = Vec::new();
        for i in 0..10 {
            for j in 0..10 {
                points.push(Vector3::new(
                    -1.25 + i as f32 * 0.25,
                    -1.25 + j as f32 * 0.25,
                    -1.5,
                ));
            }
        }
        PointCloud::from_points("X1/lidar", stamp, &points)
    }

    fn ready_node() -> PlannerNode {
        let node = PlannerNode::new(test_config());
        node.set_initialized();
        // Sensor sits 1.5 m above the map origin.
        node.tf.set(
            "X1/lidar",
            node.now(),
            Transform::from_translation(Vector3::new(0.0, 0.0, 1.5)),
        );
        node.tf.set(
            "X1/base_footprint",
            node.now(),
            Transform::from_translation(Vector3::new(0.0, 0.0, 0.2)),
        );
        node
    }

    #[test]
    fn test_not_initialized_rejects_everything() {
        let node = PlannerNode::new(test_config());
        let cloud = ground_cloud(0.0);
        assert!(matches!(
            node.ingest_cloud(&cloud),
            Err(NavError::NotInitialized)
        ));
        assert!(matches!(
            node.plan_once(),
            Err(NavError::NotInitialized)
        ));
        assert_eq!(node.map().len(), 0);
    }

    #[test]
    fn test_ingest_merges_ground() {
        let node = ready_node();
        let stats = node.ingest_cloud(&ground_cloud(node.now())).unwrap();
        assert_eq!(stats.added, 100);
        assert_eq!(node.map().len(), 100);
    }

    #[test]
    fn test_stale_cloud_rejected() {
        let node = ready_node();
        std::thread::sleep(Duration::from_millis(30));
        // A stamp far in the past fails the age check before any transform
        // lookup.
        let cloud = ground_cloud(node.now() - 60.0);
        assert!(matches!(
            node.ingest_cloud(&cloud),
            Err(NavError::StaleCloud { .. })
        ));
        assert_eq!(node.map().len(), 0);
    }

    #[test]
    fn test_near_field_points_filtered() {
        let node = ready_node();
        // All points within 1 m of the sensor: nothing survives the band.
        let close: Vec<Vector3<f32>> = (0..20)
            .map(|i| Vector3::new(0.02 * i as f32, 0.0, 0.0))
            .collect();
        let cloud = PointCloud::from_points("X1/lidar", node.now(), &close);
        assert!(matches!(
            node.ingest_cloud(&cloud),
            Err(NavError::TooFewPoints { .. })
        ));
    }

    #[test]
    fn test_robot_filter() {
        // Another robot parked at (2, 0, 0) in the map frame.
        let robot_position = Vector3::new(2.0, 0.0, 0.0);

        for filter in [true, false] {
            let mut config = test_config();
            config.filter_robots = filter;
            let node = PlannerNode::new(config);
            node.set_initialized();
            node.tf.set(
                "X1/lidar",
                node.now(),
                Transform::from_translation(Vector3::new(0.0, 0.0, 1.5)),
            );
            node.tf.set(
                "X2/base_footprint",
                node.now(),
                Transform::from_translation(robot_position),
            );

            let mut cloud_points = ground_cloud(0.0).read_vec3("x").unwrap();
            // Five sensor-frame points landing within 0.5 m of the robot,
            // spaced wider than points_min_dist so each becomes its own map
            // point when kept.
            for k in 0..5 {
                cloud_points.push(Vector3::new(2.0 - 0.42 + 0.21 * k as f32, 0.1, -1.5));
            }
            let cloud = PointCloud::from_points("X1/lidar", node.now(), &cloud_points);
            node.ingest_cloud(&cloud).unwrap();

            let near_robot = node
                .map()
                .nearby_indices(&robot_position, 0.8)
                .len();
            if filter {
                assert_eq!(near_robot, 0, "robot points leaked into the map");
            } else {
                assert!(near_robot >= 5, "expected robot points in the map");
            }
        }
    }

    #[test]
    fn test_plan_over_ingested_ground() {
        let node = ready_node();
        node.ingest_cloud(&ground_cloud(node.now())).unwrap();

        let plan = node
            .request_plan(PlanRequest::to_goal(
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
            ))
            .unwrap();
        assert!(plan.path.len() >= 2);

        // The periodic tick reuses the retained request.
        let replay = node.plan_once().unwrap();
        assert_eq!(replay.goal_index, plan.goal_index);
    }

    #[test]
    fn test_plan_uses_robot_transform_when_start_missing() {
        let node = ready_node();
        node.ingest_cloud(&ground_cloud(node.now())).unwrap();

        let plan = node.request_plan(PlanRequest::default());
        // Exploration from the robot transform at (0, 0, 0.2).
        match plan {
            Ok(plan) => assert!(plan.path.len() >= 2),
            Err(NavError::Plan(PlanError::NoFeasibleGoal)) => {}
            Err(e) => panic!("unexpected error {}", e),
        }
    }

    #[test]
    fn test_failed_plan_publishes_nothing() {
        let node = ready_node();
        node.ingest_cloud(&ground_cloud(node.now())).unwrap();
        let path_rx = node.publishers.path.subscribe();

        // Start far outside the map.
        let err = node.request_plan(PlanRequest::to_goal(
            Vector3::new(50.0, 0.0, 0.0),
            Vector3::new(60.0, 0.0, 0.0),
        ));
        assert!(err.is_err());
        assert!(path_rx.try_recv().is_err());
    }

    #[test]
    fn test_gather_viewpoints_annotates_map() {
        let node = ready_node();
        node.ingest_cloud(&ground_cloud(node.now())).unwrap();
        node.tf.set(
            "X2/base_footprint",
            node.now(),
            Transform::from_translation(Vector3::new(1.0, 1.0, 0.0)),
        );

        node.gather_viewpoints();

        // Points near the own robot carry self annotations, points near the
        // other robot carry other-actor annotations.
        let own_near = node.map().nearby_indices(&Vector3::new(0.0, 0.0, 0.0), 0.3);
        assert!(!own_near.is_empty());
        for v in own_near {
            let p = node.map().point(v);
            assert!(!p.dist_to_actor.is_nan());
            assert!(!p.actor_last_visit.is_nan());
        }
        let other_near = node.map().nearby_indices(&Vector3::new(1.0, 1.0, 0.0), 0.3);
        for v in other_near {
            assert!(!node.map().point(v).dist_to_other_actors.is_nan());
        }
    }

    #[test]
    fn test_dirty_cloud_published_to_subscriber() {
        let node = ready_node();
        let dirty_rx = node.publishers.dirty_cloud.subscribe();
        node.ingest_cloud(&ground_cloud(node.now())).unwrap();

        let cloud = dirty_rx.try_recv().unwrap();
        cloud.validate().unwrap();
        // Every merged point was dirty and shows up freshly labeled.
        assert_eq!(cloud.len(), 100);
    }
}
