//! Ingest thread: drain one input cloud subscription into the map.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::cloud::PointCloud;
use crate::error::NavError;
use crate::node::PlannerNode;

pub struct IngestThread {
    node: Arc<PlannerNode>,
    rx: Receiver<PointCloud>,
    shutdown: Arc<AtomicBool>,
}

impl IngestThread {
    pub fn new(
        node: Arc<PlannerNode>,
        rx: Receiver<PointCloud>,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        Self { node, rx, shutdown }
    }

    pub fn run(&self) {
        log::info!("Ingest thread started");
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            match self.rx.recv_timeout(Duration::from_millis(100)) {
                Ok(cloud) => self.process(cloud),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    log::warn!("Cloud channel disconnected, ingest thread exiting");
                    break;
                }
            }
        }
        log::info!("Ingest thread shutting down");
    }

    fn process(&self, cloud: PointCloud) {
        let n_pts = cloud.len();
        log::debug!("Input cloud from {} with {} points received.", cloud.frame_id, n_pts);
        match self.node.ingest_cloud(&cloud) {
            Ok(stats) => {
                log::debug!(
                    "Merged {} points: {} added, {} matched.",
                    n_pts,
                    stats.added,
                    stats.matched
                );
            }
            // Expected during startup and under backpressure.
            Err(NavError::NotInitialized) => {
                log::debug!("Discarding input cloud. Waiting for other robots...");
            }
            Err(NavError::StaleCloud { age, max_age }) => {
                log::info!("Skipping cloud {:.1} s > {:.1} s old.", age, max_age);
            }
            Err(NavError::TooFewPoints { kept, required }) => {
                log::info!(
                    "Discarding input cloud: not enough points to merge: {} < {}.",
                    kept,
                    required
                );
            }
            Err(e) => {
                log::error!("Could not merge input cloud: {}.", e);
            }
        }
    }
}
