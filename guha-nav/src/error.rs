//! Error types for GuhaNav

use thiserror::Error;

/// GuhaNav error type
#[derive(Error, Debug)]
pub enum NavError {
    #[error("not initialized: waiting for other robots")]
    NotInitialized,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid cloud: {0}")]
    InvalidCloud(String),

    #[error("stale cloud: {age:.1} s > {max_age:.1} s")]
    StaleCloud { age: f64, max_age: f64 },

    #[error("could not transform {frame} into {target}: {reason}")]
    Transform {
        frame: String,
        target: String,
        reason: String,
    },

    #[error("too few points after filtering: {kept} < {required}")]
    TooFewPoints { kept: usize, required: usize },

    #[error("planning failed: {0}")]
    Plan(#[from] naksha_map::PlanError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for NavError {
    fn from(e: toml::de::Error) -> Self {
        NavError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NavError>;
