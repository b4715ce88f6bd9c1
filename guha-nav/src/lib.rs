//! GuhaNav - Multi-Robot Exploration Planner Node
//!
//! Wires the naksha-map planning core into a running node: cloud ingestion
//! with validation and filtering, a timed transform buffer, worker threads
//! for merging, planning and viewpoint gathering, and in-process publishers
//! for the path and the diagnostic clouds.
//!
//! The transport that carries clouds and transforms between robots is out
//! of scope; an embedding process pushes [`cloud::PointCloud`] messages into
//! the senders returned by [`threads::spawn_threads`] and feeds
//! [`transforms::TransformBuffer`] from its frame source.

pub mod bus;
pub mod cloud;
pub mod config;
pub mod error;
pub mod node;
pub mod robots;
pub mod threads;
pub mod transforms;

pub use cloud::PointCloud;
pub use config::NodeConfig;
pub use error::{NavError, Result};
pub use node::{PathMessage, PlannerNode};
pub use transforms::{Transform, TransformBuffer};
