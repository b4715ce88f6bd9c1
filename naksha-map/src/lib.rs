//! # Naksha-Map: Point-Cloud Map-as-Graph Exploration Planning
//!
//! A 3-D surface map for outdoor and subterranean mobile robots, built by
//! incrementally merging point-cloud scans, with per-point geometric
//! features and traversability labels, and a planner that treats the map as
//! an implicit graph.
//!
//! ## Pipeline
//!
//! ```text
//!   scans ──► TerrainMap::merge ──► dirty set ──► update_dirty
//!                                                (features + labels)
//!                                                        │
//!   PlanRequest ──► Planner::plan ◄── GraphView ◄────────┘
//!        │              │
//!        │        Dijkstra SSSP ──► goal selection ──► PlannedPath
//!        │                          (requested goal, or best
//!        └──────────────────────────reward/cost frontier)
//! ```
//!
//! ## Coordinate Frame
//!
//! All coordinates follow the ROS REP-103 convention: X-forward, Y-left,
//! Z-up. Distances are meters, angles radians, stamps seconds since init.
//!
//! ## Concurrency
//!
//! [`TerrainMap`] is shared between ingest, planning and viewpoint tasks.
//! It owns three locks (data, index, dirty), always acquired in that order;
//! a planning tick holds data and index for its whole duration and so
//! observes every merge that completed before it.

pub mod config;
pub mod core;
pub mod features;
pub mod graph;
pub mod map;
pub mod planning;
pub mod viewpoints;

pub use config::{GraphConfig, LabelConfig, MapConfig, PlannerConfig, StagingArea};
pub use core::{MapPoint, PlannedPath, PointFlags, Pose};
pub use graph::GraphView;
pub use map::{MergeStats, TerrainMap};
pub use planning::{Plan, PlanError, PlanRequest, Planner};
pub use viewpoints::ViewpointLog;
