//! Timed transform buffer.
//!
//! Stores recent map-frame transforms per child frame and answers
//! closest-in-time lookups. `wait_for` is the only blocking call in the
//! node; everything else returns immediately with whatever is buffered.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use nalgebra::{UnitQuaternion, Vector3};
use parking_lot::{Condvar, Mutex};

use crate::error::{NavError, Result};

/// A rigid transform from a child frame into the map frame.
#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Self {
            translation,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Map a point from the child frame into the map frame.
    pub fn apply(&self, p: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * p + self.translation
    }
}

const BUFFER_DEPTH: usize = 128;

/// Buffered map-frame transforms keyed by child frame.
pub struct TransformBuffer {
    target_frame: String,
    inner: Mutex<HashMap<String, VecDeque<(f64, Transform)>>>,
    updated: Condvar,
}

impl TransformBuffer {
    pub fn new(target_frame: &str) -> Self {
        Self {
            target_frame: target_frame.to_string(),
            inner: Mutex::new(HashMap::new()),
            updated: Condvar::new(),
        }
    }

    pub fn target_frame(&self) -> &str {
        &self.target_frame
    }

    /// Record a transform of `frame` into the map frame at `stamp`.
    pub fn set(&self, frame: &str, stamp: f64, transform: Transform) {
        let mut inner = self.inner.lock();
        let buffer = inner.entry(frame.to_string()).or_default();
        buffer.push_back((stamp, transform));
        while buffer.len() > BUFFER_DEPTH {
            buffer.pop_front();
        }
        self.updated.notify_all();
    }

    /// Latest known transform for `frame`, with its stamp.
    pub fn latest(&self, frame: &str) -> Option<(f64, Transform)> {
        self.inner.lock().get(frame).and_then(|b| b.back().copied())
    }

    /// Buffered transform closest in time to `stamp`.
    pub fn closest(&self, frame: &str, stamp: f64) -> Option<Transform> {
        let inner = self.inner.lock();
        let buffer = inner.get(frame)?;
        buffer
            .iter()
            .min_by(|a, b| {
                (a.0 - stamp)
                    .abs()
                    .partial_cmp(&(b.0 - stamp).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|&(_, tf)| tf)
    }

    /// Wait until any transform is available for `frame`, then return the
    /// buffered transform closest in time to `stamp`.
    pub fn wait_for(&self, frame: &str, stamp: f64, timeout: Duration) -> Result<Transform> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();
        loop {
            if let Some(buffer) = inner.get(frame) {
                let tf = buffer
                    .iter()
                    .min_by(|a, b| {
                        (a.0 - stamp)
                            .abs()
                            .partial_cmp(&(b.0 - stamp).abs())
                            .unwrap_or(std::cmp::Ordering::Equal)
                    })
                    .map(|&(_, tf)| tf);
                if let Some(tf) = tf {
                    return Ok(tf);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(NavError::Transform {
                    frame: frame.to_string(),
                    target: self.target_frame.clone(),
                    reason: format!("timed out after {:.1} s", timeout.as_secs_f64()),
                });
            }
            if self
                .updated
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return Err(NavError::Transform {
                    frame: frame.to_string(),
                    target: self.target_frame.clone(),
                    reason: format!("timed out after {:.1} s", timeout.as_secs_f64()),
                });
            }
        }
    }
}
