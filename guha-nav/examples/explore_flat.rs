//! Simulated exploration over a flat cave floor.
//!
//! Drives the planner node directly, without transport or threads: the
//! "sensor" observes a disc of floor around the robot, the robot teleports
//! to each planned goal, and the loop repeats until the planner runs out of
//! rewarding frontiers.
//!
//! Run with: cargo run --example explore_flat

use nalgebra::Vector3;

use guha_nav::cloud::PointCloud;
use guha_nav::config::NodeConfig;
use guha_nav::node::PlannerNode;
use guha_nav::transforms::Transform;
use naksha_map::{LabelConfig, PlanRequest};

const FLOOR_HALF_EXTENT: f32 = 6.0;
const SENSOR_HEIGHT: f32 = 1.2;
const SCAN_RADIUS: f32 = 4.0;
const GRID_SPACING: f32 = 0.25;

/// Sensor-frame scan of the floor disc visible from `robot`.
fn scan_floor(robot: &Vector3<f32>) -> Vec<Vector3<f32>> {
    let mut points = Vec::new();
    let steps = (2.0 * SCAN_RADIUS / GRID_SPACING) as i32;
    for i in 0..=steps {
        for j in 0..=steps {
            let x = robot.x - SCAN_RADIUS + i as f32 * GRID_SPACING;
            let y = robot.y - SCAN_RADIUS + j as f32 * GRID_SPACING;
            if x.abs() > FLOOR_HALF_EXTENT || y.abs() > FLOOR_HALF_EXTENT {
                continue;
            }
            let horizontal = ((x - robot.x).powi(2) + (y - robot.y).powi(2)).sqrt();
            if horizontal > SCAN_RADIUS {
                continue;
            }
            // Sensor frame: robot position at SENSOR_HEIGHT above the floor.
            points.push(Vector3::new(x - robot.x, y - robot.y, -SENSOR_HEIGHT));
        }
    }
    points
}

fn main() {
    env_logger::init();

    let mut config = NodeConfig::default();
    config.robot_frame = "robot".to_string();
    config.label = LabelConfig {
        min_normal_pts: 5,
        edge_min_centroid_offset: 0.4,
        ..LabelConfig::default()
    };
    config.planner.min_map_points = 32;

    let node = PlannerNode::new(config);
    node.set_initialized();

    let mut robot = Vector3::new(0.0, 0.0, 0.0);
    for step in 0..20 {
        let stamp = node.now();
        node.tf.set(
            "robot",
            stamp,
            Transform::from_translation(robot + Vector3::new(0.0, 0.0, SENSOR_HEIGHT)),
        );

        let scan = PointCloud::from_points("robot", stamp, &scan_floor(&robot));
        match node.ingest_cloud(&scan) {
            Ok(stats) => println!(
                "step {:2}: merged scan ({} added, {} matched), map size {}",
                step,
                stats.added,
                stats.matched,
                node.map().len()
            ),
            Err(e) => {
                println!("step {:2}: scan rejected: {}", step, e);
                continue;
            }
        }
        node.gather_viewpoints();

        match node.request_plan(PlanRequest::exploration(robot)) {
            Ok(plan) => {
                let goal = plan.path.poses.last().unwrap().position;
                println!(
                    "step {:2}: exploring to [{:.2}, {:.2}] ({} poses, cost {:.2})",
                    step,
                    goal.x,
                    goal.y,
                    plan.path.len(),
                    plan.cost
                );
                robot = Vector3::new(goal.x, goal.y, 0.0);
            }
            Err(e) => {
                println!("step {:2}: no plan ({}), exploration done", step, e);
                break;
            }
        }
    }
}
