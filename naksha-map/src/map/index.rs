//! Spatial index over map point positions.
//!
//! Thin wrapper around a 3-D k-d tree. Point indices are stable: points are
//! never removed, so entries are only ever added.

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use nalgebra::Vector3;

/// Index over point positions; values are indices into the point array.
pub struct PointIndex {
    tree: KdTree<f32, u64, 3, 256, u32>,
    len: usize,
}

impl PointIndex {
    pub fn new() -> Self {
        Self {
            tree: KdTree::new(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert a position under point index `idx`.
    pub fn insert(&mut self, position: &Vector3<f32>, idx: usize) {
        self.tree.add(&[position.x, position.y, position.z], idx as u64);
        self.len += 1;
    }

    /// Nearest stored point to `query`: `(index, distance)`.
    pub fn nearest(&self, query: &Vector3<f32>) -> Option<(usize, f32)> {
        if self.len == 0 {
            return None;
        }
        let nn = self
            .tree
            .nearest_one::<SquaredEuclidean>(&[query.x, query.y, query.z]);
        Some((nn.item as usize, nn.distance.sqrt()))
    }

    /// Up to `k` nearest points, closest first: `(index, distance)`.
    pub fn nearest_n(&self, query: &Vector3<f32>, k: usize) -> Vec<(usize, f32)> {
        self.tree
            .nearest_n::<SquaredEuclidean>(&[query.x, query.y, query.z], k)
            .into_iter()
            .map(|nn| (nn.item as usize, nn.distance.sqrt()))
            .collect()
    }

    /// All points within `radius` of `query`, unordered: `(index, distance)`.
    pub fn within(&self, query: &Vector3<f32>, radius: f32) -> Vec<(usize, f32)> {
        self.tree
            .within_unsorted::<SquaredEuclidean>(&[query.x, query.y, query.z], radius * radius)
            .into_iter()
            .map(|nn| (nn.item as usize, nn.distance.sqrt()))
            .collect()
    }

    /// Up to `k` nearest points within `radius`, closest first.
    pub fn within_capped(&self, query: &Vector3<f32>, radius: f32, k: usize) -> Vec<(usize, f32)> {
        let mut hits: Vec<(usize, f32)> = self.within(query, radius);
        hits.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        hits
    }
}

impl Default for PointIndex {
    fn default() -> Self {
        Self::new()
    }
}
