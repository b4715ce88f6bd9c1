//! GuhaNav - exploration planner node.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use guha_nav::config::NodeConfig;
use guha_nav::error::Result;
use guha_nav::node::PlannerNode;
use guha_nav::threads::spawn_threads;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("GuhaNav v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = match std::env::args().nth(1) {
        Some(path) => {
            log::info!("Loading configuration from {}", path);
            NodeConfig::load(Path::new(&path))?
        }
        None if Path::new("guha.toml").exists() => {
            log::info!("Loading configuration from guha.toml");
            NodeConfig::load(Path::new("guha.toml"))?
        }
        None => {
            log::info!("Using default configuration");
            NodeConfig::default()
        }
    };

    log::info!(
        "Map frame {}, robot frame {}, {} robots in fleet.",
        config.map_frame,
        config.robot_frame,
        config.robot_frames.len().max(1)
    );

    let node = Arc::new(PlannerNode::new(config));
    let shutdown = Arc::new(AtomicBool::new(false));

    let ctrlc_shutdown = Arc::clone(&shutdown);
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        ctrlc_shutdown.store(true, Ordering::Relaxed);
    })
    .expect("Failed to set Ctrl-C handler");

    // Startup: discover the other robots before accepting input.
    node.wait_for_robots();

    let (_cloud_senders, handles) = spawn_threads(Arc::clone(&node), Arc::clone(&shutdown));
    log::info!("GuhaNav running. Press Ctrl-C to stop.");

    while !shutdown.load(Ordering::Relaxed) {
        std::thread::sleep(Duration::from_millis(100));
    }

    handles.join();
    log::info!("GuhaNav stopped");
    Ok(())
}
