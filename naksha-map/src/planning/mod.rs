//! Shortest-path search and the planning tick.

mod dijkstra;
mod planner;

pub use dijkstra::{shortest_paths, ShortestPaths};
pub use planner::{Plan, PlanError, PlanRequest, Planner};
