//! Configuration loading for GuhaNav

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use naksha_map::{GraphConfig, LabelConfig, MapConfig, PlannerConfig};

use crate::error::{NavError, Result};

/// Main configuration structure
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Fixed world frame the map is built in.
    pub map_frame: String,

    /// This robot's body frame.
    pub robot_frame: String,

    /// All robot frames by name, this robot included. When the own frame is
    /// missing it is inserted under the key "SELF".
    pub robot_frames: BTreeMap<String, String>,

    /// Reject input clouds older than this (seconds).
    pub max_cloud_age: f64,

    /// Remove input points within 1 m of a known robot.
    pub filter_robots: bool,

    /// Number of input cloud subscriptions.
    pub num_input_clouds: usize,

    /// Queue depth per subscription.
    pub input_queue_size: usize,

    /// Viewpoint gathering rate (Hz).
    pub viewpoints_update_freq: f64,

    /// Planning tick rate (Hz).
    pub planning_freq: f64,

    /// Timeout for transform lookups (seconds).
    pub transform_timeout: f64,

    /// Time allowed for discovering the other robots at startup (seconds).
    pub robot_discovery_timeout: f64,

    /// Map store parameters.
    pub map: MapConfig,

    /// Feature and label thresholds.
    pub label: LabelConfig,

    /// Edge cost parameters.
    pub graph: GraphConfig,

    /// Planner and exploration reward parameters.
    pub planner: PlannerConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            map_frame: "subt".to_string(),
            robot_frame: "base_footprint".to_string(),
            robot_frames: BTreeMap::new(),
            max_cloud_age: 5.0,
            filter_robots: false,
            num_input_clouds: 1,
            input_queue_size: 5,
            viewpoints_update_freq: 1.0,
            planning_freq: 0.5,
            transform_timeout: 5.0,
            robot_discovery_timeout: 15.0,
            map: MapConfig::default(),
            label: LabelConfig::default(),
            graph: GraphConfig::default(),
            planner: PlannerConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NavError::Config(format!("Failed to read config file: {}", e)))?;
        let mut config: NodeConfig = toml::from_str(&content)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Ensure the own robot frame appears among all robot frames.
    pub fn normalize(&mut self) {
        let among_robots = self.robot_frames.values().any(|f| *f == self.robot_frame);
        if !among_robots {
            log::info!("Inserting robot frame among all robot frames.");
            self.robot_frames
                .insert("SELF".to_string(), self.robot_frame.clone());
        }
    }

    fn validate(&self) -> Result<()> {
        if self.map_frame.is_empty() {
            return Err(NavError::Config("map_frame must not be empty".into()));
        }
        if self.planning_freq <= 0.0 {
            return Err(NavError::Config("planning_freq must be positive".into()));
        }
        if self.viewpoints_update_freq <= 0.0 {
            return Err(NavError::Config(
                "viewpoints_update_freq must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Frames of the other robots, excluding our own.
    pub fn other_robot_frames(&self) -> impl Iterator<Item = &String> {
        self.robot_frames
            .values()
            .filter(move |f| **f != self.robot_frame)
    }
}
