//! Discovery of the other robots' positions from the transform buffer.

use std::time::{Duration, Instant};

use nalgebra::Vector3;

use crate::config::NodeConfig;
use crate::transforms::TransformBuffer;

/// Map-frame positions of the other robots, by frame name.
///
/// Waits up to `timeout` in total; the budget shrinks as robots are looked
/// up one after another. Robots whose transform never shows up are skipped
/// with a warning.
pub fn find_robots(
    config: &NodeConfig,
    tf: &TransformBuffer,
    timeout: Duration,
) -> Vec<(String, Vector3<f32>)> {
    let started = Instant::now();
    let mut robots = Vec::new();
    for frame in config.other_robot_frames() {
        let remaining = timeout.saturating_sub(started.elapsed());
        match tf.wait_for(frame, 0.0, remaining) {
            Ok(transform) => {
                log::info!(
                    "Robot {} found in {} at [{:.1}, {:.1}, {:.1}].",
                    frame,
                    tf.target_frame(),
                    transform.translation.x,
                    transform.translation.y,
                    transform.translation.z
                );
                robots.push((frame.clone(), transform.translation));
            }
            Err(e) => {
                log::warn!("Could not get {} pose: {}.", frame, e);
            }
        }
    }
    log::info!(
        "{} / {} robots found in {:.3} s (timeout {:.3} s).",
        robots.len(),
        config.other_robot_frames().count(),
        started.elapsed().as_secs_f64(),
        timeout.as_secs_f64()
    );
    robots
}
