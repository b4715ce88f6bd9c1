//! Viewpoint thread: record robot positions at a fixed rate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::node::PlannerNode;

pub struct ViewpointThread {
    node: Arc<PlannerNode>,
    shutdown: Arc<AtomicBool>,
    period: Duration,
}

impl ViewpointThread {
    pub fn new(node: Arc<PlannerNode>, shutdown: Arc<AtomicBool>) -> Self {
        let period = Duration::from_secs_f64(1.0 / node.config().viewpoints_update_freq);
        Self {
            node,
            shutdown,
            period,
        }
    }

    pub fn run(&self) {
        log::info!(
            "Viewpoint thread started ({:.2} Hz)",
            1.0 / self.period.as_secs_f64()
        );
        let mut next_tick = Instant::now() + self.period;
        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            let now = Instant::now();
            if now < next_tick {
                std::thread::sleep((next_tick - now).min(Duration::from_millis(100)));
                continue;
            }
            next_tick += self.period;
            log::debug!("Gathering viewpoints.");
            self.node.gather_viewpoints();
        }
        log::info!("Viewpoint thread shutting down");
    }
}
