//! Bounded log of robot viewpoints.
//!
//! Keeps the recent positions at which this robot and the other robots were
//! observed. The log bootstraps the exploration reward for map points whose
//! per-point visit annotations are still unset.

use std::collections::VecDeque;

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use nalgebra::Vector3;

/// Append-only viewpoint sequences, bounded by a horizon.
#[derive(Clone, Debug, Default)]
pub struct ViewpointLog {
    own: VecDeque<Vector3<f32>>,
    other: VecDeque<Vector3<f32>>,
    horizon: usize,
}

impl ViewpointLog {
    /// `horizon` caps each sequence; zero means unbounded.
    pub fn new(horizon: usize) -> Self {
        Self {
            own: VecDeque::new(),
            other: VecDeque::new(),
            horizon,
        }
    }

    /// Horizon sized for `hours` of recording at `freq` Hz.
    pub fn with_rate(freq: f64, hours: f64) -> Self {
        Self::new((hours * 3600.0 * freq).ceil() as usize)
    }

    pub fn record_own(&mut self, position: Vector3<f32>) {
        Self::push(&mut self.own, position, self.horizon);
    }

    pub fn record_other(&mut self, position: Vector3<f32>) {
        Self::push(&mut self.other, position, self.horizon);
    }

    fn push(seq: &mut VecDeque<Vector3<f32>>, position: Vector3<f32>, horizon: usize) {
        seq.push_back(position);
        if horizon > 0 {
            while seq.len() > horizon {
                seq.pop_front();
            }
        }
    }

    pub fn own(&self) -> impl Iterator<Item = &Vector3<f32>> {
        self.own.iter()
    }

    pub fn other(&self) -> impl Iterator<Item = &Vector3<f32>> {
        self.other.iter()
    }

    pub fn own_len(&self) -> usize {
        self.own.len()
    }

    pub fn other_len(&self) -> usize {
        self.other.len()
    }

    /// Distance index over own viewpoints.
    pub fn own_index(&self) -> ViewpointIndex {
        ViewpointIndex::build(self.own.iter())
    }

    /// Distance index over other robots' viewpoints.
    pub fn other_index(&self) -> ViewpointIndex {
        ViewpointIndex::build(self.other.iter())
    }
}

/// Throwaway nearest-viewpoint index built per planning tick.
pub struct ViewpointIndex {
    tree: KdTree<f32, u64, 3, 256, u32>,
    len: usize,
}

impl ViewpointIndex {
    fn build<'a>(points: impl Iterator<Item = &'a Vector3<f32>>) -> Self {
        let mut tree: KdTree<f32, u64, 3, 256, u32> = KdTree::new();
        let mut len = 0;
        for p in points {
            tree.add(&[p.x, p.y, p.z], len as u64);
            len += 1;
        }
        Self { tree, len }
    }

    /// Distance to the nearest logged viewpoint; infinity when the log is
    /// empty.
    pub fn distance(&self, position: &Vector3<f32>) -> f32 {
        if self.len == 0 {
            return f32::INFINITY;
        }
        self.tree
            .nearest_one::<SquaredEuclidean>(&[position.x, position.y, position.z])
            .distance
            .sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_horizon_bounds_log() {
        let mut log = ViewpointLog::new(3);
        for i in 0..5 {
            log.record_own(Vector3::new(i as f32, 0.0, 0.0));
        }
        assert_eq!(log.own_len(), 3);
        // Oldest entries dropped first.
        assert!((log.own().next().unwrap().x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_index_is_infinite() {
        let log = ViewpointLog::new(10);
        let index = log.own_index();
        assert!(index.distance(&Vector3::zeros()).is_infinite());
    }

    #[test]
    fn test_nearest_distance() {
        let mut log = ViewpointLog::new(10);
        log.record_own(Vector3::new(1.0, 0.0, 0.0));
        log.record_own(Vector3::new(4.0, 0.0, 0.0));
        let index = log.own_index();
        assert!((index.distance(&Vector3::zeros()) - 1.0).abs() < 1e-5);
        assert!((index.distance(&Vector3::new(3.5, 0.0, 0.0)) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_own_and_other_are_separate() {
        let mut log = ViewpointLog::new(10);
        log.record_own(Vector3::zeros());
        assert_eq!(log.own_len(), 1);
        assert_eq!(log.other_len(), 0);
        assert!(log.other_index().distance(&Vector3::zeros()).is_infinite());
    }
}
