//! Planning thread: replan at a fixed rate over the retained request.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::NavError;
use crate::node::PlannerNode;

pub struct PlanningThread {
    node: Arc<PlannerNode>,
    shutdown: Arc<AtomicBool>,
    period: Duration,
}

impl PlanningThread {
    pub fn new(node: Arc<PlannerNode>, shutdown: Arc<AtomicBool>) -> Self {
        let period = Duration::from_secs_f64(1.0 / node.config().planning_freq);
        Self {
            node,
            shutdown,
            period,
        }
    }

    pub fn run(&self) {
        log::info!("Planning thread started ({:.2} Hz)", 1.0 / self.period.as_secs_f64());
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
            self.tick();
        }
        log::info!("Planning thread shutting down");
    }

    fn tick(&self) {
        match self.node.plan_once() {
            Ok(_) => {}
            // A failed tick is routine; the next one starts fresh.
            Err(NavError::NotInitialized) => {
                log::debug!("Won't plan. Waiting for other robots...");
            }
            Err(NavError::Plan(e)) => {
                log::warn!("Planning failed: {}.", e);
            }
            Err(e) => {
                log::error!("Planning tick error: {}.", e);
            }
        }
    }
}
