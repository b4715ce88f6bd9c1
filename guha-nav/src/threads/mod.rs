//! Worker threads for the planner node.
//!
//! Three recurring activities run concurrently against the shared node:
//! - Ingest threads (one per input cloud subscription) merge scans
//! - Planning thread replans at a fixed rate
//! - Viewpoint thread records robot positions at a fixed rate

mod ingest;
mod planning;
mod viewpoints;

pub use ingest::IngestThread;
pub use planning::PlanningThread;
pub use viewpoints::ViewpointThread;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Sender};

use crate::cloud::PointCloud;
use crate::node::PlannerNode;

/// Handles of all spawned threads.
pub struct ThreadHandles {
    pub ingest: Vec<JoinHandle<()>>,
    pub planning: JoinHandle<()>,
    pub viewpoints: JoinHandle<()>,
}

impl ThreadHandles {
    pub fn join(self) {
        for handle in self.ingest {
            let _ = handle.join();
        }
        let _ = self.planning.join();
        let _ = self.viewpoints.join();
    }
}

/// Spawn the worker threads. Returns one cloud sender per configured input
/// subscription; the embedding transport feeds scans through them.
pub fn spawn_threads(
    node: Arc<PlannerNode>,
    shutdown: Arc<AtomicBool>,
) -> (Vec<Sender<PointCloud>>, ThreadHandles) {
    let config = node.config();
    let mut senders = Vec::with_capacity(config.num_input_clouds);
    let mut ingest = Vec::with_capacity(config.num_input_clouds);

    for i in 0..config.num_input_clouds.max(1) {
        let (tx, rx) = bounded::<PointCloud>(config.input_queue_size);
        senders.push(tx);
        let thread_node = Arc::clone(&node);
        let thread_shutdown = Arc::clone(&shutdown);
        let handle = thread::Builder::new()
            .name(format!("ingest-{}", i))
            .spawn(move || {
                IngestThread::new(thread_node, rx, thread_shutdown).run();
            })
            .expect("Failed to spawn ingest thread");
        ingest.push(handle);
    }

    let planning_node = Arc::clone(&node);
    let planning_shutdown = Arc::clone(&shutdown);
    let planning = thread::Builder::new()
        .name("planning".into())
        .spawn(move || {
            PlanningThread::new(planning_node, planning_shutdown).run();
        })
        .expect("Failed to spawn planning thread");

    let viewpoint_shutdown = Arc::clone(&shutdown);
    let viewpoints = thread::Builder::new()
        .name("viewpoints".into())
        .spawn(move || {
            ViewpointThread::new(node, viewpoint_shutdown).run();
        })
        .expect("Failed to spawn viewpoint thread");

    (
        senders,
        ThreadHandles {
            ingest,
            planning,
            viewpoints,
        },
    )
}
