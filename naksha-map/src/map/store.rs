//! Persistent surface map with merge regularization and dirty tracking.
//!
//! The store owns the point array, the spatial index, and the dirty set,
//! each behind its own lock. Lock order is always data, then index, then
//! dirty; helpers take plain references so no lock is ever re-entered.
//! Points are append-only: merges either thicken an existing point or add a
//! new one, never remove.

use std::collections::HashSet;

use kiddo::float::kdtree::KdTree;
use kiddo::SquaredEuclidean;
use nalgebra::Vector3;
use parking_lot::Mutex;

use crate::config::{LabelConfig, MapConfig};
use crate::core::math::is_finite;
use crate::core::{MapPoint, PointFlags};
use crate::features;

use super::index::PointIndex;

/// Outcome of one merge.
#[derive(Clone, Copy, Debug, Default)]
pub struct MergeStats {
    /// New points appended to the map.
    pub added: usize,
    /// Incoming points absorbed by an existing point.
    pub matched: usize,
    /// Stored points whose empty counter grew.
    pub emptied: usize,
    /// Size of the dirty set after the merge.
    pub dirty: usize,
}

/// The shared surface map.
pub struct TerrainMap {
    map_config: MapConfig,
    label_config: LabelConfig,
    data: Mutex<Vec<MapPoint>>,
    index: Mutex<PointIndex>,
    dirty: Mutex<HashSet<usize>>,
}

impl TerrainMap {
    pub fn new(map_config: MapConfig, label_config: LabelConfig) -> Self {
        Self {
            map_config,
            label_config,
            data: Mutex::new(Vec::new()),
            index: Mutex::new(PointIndex::new()),
            dirty: Mutex::new(HashSet::new()),
        }
    }

    pub fn label_config(&self) -> &LabelConfig {
        &self.label_config
    }

    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Position of point `v`.
    pub fn position(&self, v: usize) -> Vector3<f32> {
        self.data.lock()[v].position
    }

    /// Clone of point `v`.
    pub fn point(&self, v: usize) -> MapPoint {
        self.data.lock()[v].clone()
    }

    /// Clone of the whole point array, for diagnostic clouds.
    pub fn clone_points(&self) -> Vec<MapPoint> {
        self.data.lock().clone()
    }

    /// Indices currently marked dirty, sorted.
    pub fn dirty_indices(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self.dirty.lock().iter().copied().collect();
        out.sort_unstable();
        out
    }

    /// Clones of the points at `indices`.
    pub fn points_at(&self, indices: &[usize]) -> Vec<MapPoint> {
        let data = self.data.lock();
        indices.iter().map(|&v| data[v].clone()).collect()
    }

    /// Clones of all points within `half_extent` of `center` on every axis.
    pub fn clone_window(&self, center: &Vector3<f32>, half_extent: f32) -> Vec<MapPoint> {
        let data = self.data.lock();
        let index = self.index.lock();
        // Radius query over the window's circumscribed sphere, then box-filter.
        let radius = half_extent * 3.0f32.sqrt();
        let mut out: Vec<MapPoint> = index
            .within(center, radius)
            .into_iter()
            .filter(|&(v, _)| {
                let d = data[v].position - center;
                d.x.abs() <= half_extent && d.y.abs() <= half_extent && d.z.abs() <= half_extent
            })
            .map(|(v, _)| data[v].clone())
            .collect();
        out.sort_by(|a, b| {
            a.position
                .norm_squared()
                .partial_cmp(&b.position.norm_squared())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        out
    }

    /// Indices of stored points within `radius` of `center`.
    pub fn nearby_indices(&self, center: &Vector3<f32>, radius: f32) -> Vec<usize> {
        let _data = self.data.lock();
        let index = self.index.lock();
        index.within(center, radius).into_iter().map(|(v, _)| v).collect()
    }

    /// Run `f` with exclusive access to the point array and the index, for
    /// the duration of a planning tick.
    pub fn with_plan_access<R>(&self, f: impl FnOnce(&mut Vec<MapPoint>, &PointIndex) -> R) -> R {
        let mut data = self.data.lock();
        let index = self.index.lock();
        f(&mut data, &index)
    }

    /// Merge a world-frame scan observed from `origin` into the map.
    ///
    /// Each incoming point either thickens its nearest stored point (within
    /// `points_min_dist`) or is appended as a new point. Stored points that
    /// an incoming ray demonstrably passed through get their empty counter
    /// bumped. Every touched point and its radius-neighborhood is marked
    /// dirty for the next label pass.
    ///
    /// Non-finite coordinates are dropped before reaching the store; merge
    /// itself never fails.
    pub fn merge(&self, points: &[Vector3<f32>], origin: &Vector3<f32>) -> MergeStats {
        self.merge_inner(points, Some(origin))
    }

    /// Bulk-load an initial map: merge without ray accounting.
    pub fn bulk_load(&self, points: &[Vector3<f32>]) -> MergeStats {
        self.merge_inner(points, None)
    }

    fn merge_inner(&self, points: &[Vector3<f32>], origin: Option<&Vector3<f32>>) -> MergeStats {
        let mut stats = MergeStats::default();
        let mut data = self.data.lock();
        let mut index = self.index.lock();

        let mut seeds: Vec<usize> = Vec::new();
        let mut accepted: Vec<Vector3<f32>> = Vec::with_capacity(points.len());

        for p in points {
            if !is_finite(p) {
                continue;
            }
            accepted.push(*p);
            match index.nearest(p) {
                Some((v, dist)) if dist < self.map_config.points_min_dist => {
                    data[v].occupied_count = data[v].occupied_count.saturating_add(1);
                    stats.matched += 1;
                    seeds.push(v);
                }
                _ => {
                    let v = data.len();
                    index.insert(p, v);
                    data.push(MapPoint::new(*p));
                    stats.added += 1;
                    seeds.push(v);
                }
            }
        }

        if let Some(origin) = origin {
            stats.emptied = self.account_empty_space(&mut data, &index, &accepted, origin, &mut seeds);
        }

        // Feature recomputation must reach the neighbors of every touched
        // point as well.
        let mut dirty_new: HashSet<usize> = HashSet::with_capacity(seeds.len() * 2);
        for &v in &seeds {
            dirty_new.insert(v);
            for (u, _) in index.within(&data[v].position, self.label_config.neighborhood_radius) {
                dirty_new.insert(u);
            }
        }

        drop(index);
        drop(data);

        let mut dirty = self.dirty.lock();
        dirty.extend(dirty_new);
        stats.dirty = dirty.len();

        log::debug!(
            "Merged cloud: {} added, {} matched, {} emptied, {} dirty.",
            stats.added,
            stats.matched,
            stats.emptied,
            stats.dirty
        );
        stats
    }

    /// Empty-space accounting, resolved as a per-stored-point reverse query:
    /// for every stored point in range of the scan, find the incoming ray
    /// closest in direction (k-d tree over unit directions from `origin`)
    /// and bump the empty counter when the cone test holds, i.e. the ray
    /// direction matches within `min_empty_cos` and the ray reaches at least
    /// `empty_ratio` times the stored point's distance. Growth is monotonic.
    fn account_empty_space(
        &self,
        data: &mut [MapPoint],
        index: &PointIndex,
        incoming: &[Vector3<f32>],
        origin: &Vector3<f32>,
        seeds: &mut Vec<usize>,
    ) -> usize {
        let mut directions: KdTree<f32, u64, 3, 256, u32> = KdTree::new();
        let mut ranges: Vec<f32> = Vec::with_capacity(incoming.len());
        let mut max_range = 0.0f32;
        for p in incoming {
            let offset = p - origin;
            let range = offset.norm();
            if range <= f32::EPSILON {
                continue;
            }
            let dir = offset / range;
            directions.add(&[dir.x, dir.y, dir.z], ranges.len() as u64);
            ranges.push(range);
            max_range = max_range.max(range);
        }
        if ranges.is_empty() {
            return 0;
        }

        let empty_ratio = self.map_config.empty_ratio;
        let min_cos = self.map_config.min_empty_cos;
        let mut emptied = 0;
        for (v, dist) in index.within(origin, max_range) {
            if dist <= f32::EPSILON {
                continue;
            }
            let dir = (data[v].position - origin) / dist;
            let nn = directions.nearest_one::<SquaredEuclidean>(&[dir.x, dir.y, dir.z]);
            // For unit vectors, cos(angle) = 1 - d^2 / 2.
            let cos = 1.0 - nn.distance / 2.0;
            if cos < min_cos {
                continue;
            }
            if ranges[nn.item as usize] < empty_ratio * dist {
                continue;
            }
            let was_empty = self.empty_dominated(&data[v]);
            data[v].empty_count = data[v].empty_count.saturating_add(1);
            emptied += 1;
            if self.empty_dominated(&data[v]) != was_empty {
                seeds.push(v);
            }
        }
        emptied
    }

    fn empty_dominated(&self, p: &MapPoint) -> bool {
        f32::from(p.empty_count) >= self.map_config.empty_ratio * f32::from(p.occupied_count)
    }

    /// Run the feature & label engine over the dirty set and clear it.
    ///
    /// A fixed point: calling this twice without an intervening merge
    /// changes no flag. Returns the number of points relabeled.
    pub fn update_dirty(&self) -> usize {
        let mut data = self.data.lock();
        let index = self.index.lock();
        let mut dirty: Vec<usize> = {
            let mut set = self.dirty.lock();
            set.drain().collect()
        };
        dirty.sort_unstable();

        if dirty.is_empty() {
            return 0;
        }

        // Stage 1: features and threshold labels, from geometry alone.
        let updates: Vec<features::FeatureUpdate> = dirty
            .iter()
            .map(|&v| features::compute_update(&data, &index, v, &self.label_config))
            .collect();

        let mut edge_changed: Vec<usize> = Vec::new();
        for (&v, update) in dirty.iter().zip(&updates) {
            let was_edge = data[v].flags.contains(PointFlags::EDGE);
            let point = &mut data[v];
            point.normal = update.normal;
            point.num_normal_pts = update.num_normal_pts;
            point.ground_diff_min = update.ground_diff_min;
            point.ground_diff_max = update.ground_diff_max;
            point.ground_diff_std = update.ground_diff_std;
            point.ground_abs_diff_mean = update.ground_abs_diff_mean;
            point.num_obstacle_pts = update.num_obstacle_pts;
            point.flags = update.flags;
            if self.empty_dominated(point) {
                point.flags = PointFlags::EMPTY;
            }
            if point.flags.contains(PointFlags::EDGE) != was_edge {
                edge_changed.push(v);
            }
        }

        // Stage 2: the traversable proviso. A would-be traversable point
        // too close to an obstacle is demoted; edge points carry no such
        // proviso. Demotion targets UNKNOWN so it cannot cascade.
        for &v in &dirty {
            if data[v].flags.contains(PointFlags::TRAVERSABLE)
                && features::too_close_to_obstacle(&data, &index, v, &self.label_config)
            {
                data[v].flags = PointFlags::UNKNOWN;
            }
        }

        // Stage 3: re-count edge neighbors for every dirty point and every
        // neighbor of a point whose EDGE status flipped.
        let mut recount: HashSet<usize> = dirty.iter().copied().collect();
        for &v in &edge_changed {
            for (u, _) in index.within(&data[v].position, self.label_config.neighborhood_radius) {
                recount.insert(u);
            }
        }
        let mut recount: Vec<usize> = recount.into_iter().collect();
        recount.sort_unstable();
        for &v in &recount {
            data[v].num_edge_neighbors = features::count_edge_neighbors(
                &data,
                &index,
                v,
                self.label_config.neighborhood_radius,
            );
        }

        log::debug!("Relabeled {} dirty points.", dirty.len());
        dirty.len()
    }

    /// Record a robot observation: points within `max_distance` of `pos`
    /// remember their closest approach and the visit stamp.
    pub fn mark_visited(&self, pos: &Vector3<f32>, stamp: f64, by_self: bool, max_distance: f32) {
        let mut data = self.data.lock();
        let index = self.index.lock();
        for (v, dist) in index.within(pos, max_distance) {
            let point = &mut data[v];
            if by_self {
                point.dist_to_actor = if point.dist_to_actor.is_nan() {
                    dist
                } else {
                    point.dist_to_actor.min(dist)
                };
                point.actor_last_visit = stamp;
            } else {
                point.dist_to_other_actors = if point.dist_to_other_actors.is_nan() {
                    dist
                } else {
                    point.dist_to_other_actors.min(dist)
                };
                point.other_actors_last_visit = stamp;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_map() -> TerrainMap {
        TerrainMap::new(
            MapConfig::default(),
            LabelConfig {
                min_normal_pts: 5,
                edge_min_centroid_offset: 0.4,
                min_dist_to_obstacle: 0.3,
                ..LabelConfig::default()
            },
        )
    }

    fn grid(nx: i32, ny: i32, spacing: f32, z: f32) -> Vec<Vector3<f32>> {
        let mut out = Vec::new();
        for i in 0..nx {
            for j in 0..ny {
                out.push(Vector3::new(i as f32 * spacing, j as f32 * spacing, z));
            }
        }
        out
    }

    #[test]
    fn test_merge_adds_points() {
        let map = test_map();
        let cloud = grid(4, 4, 0.25, 0.0);
        let stats = map.merge(&cloud, &Vector3::new(0.0, 0.0, 1.0));
        assert_eq!(stats.added, 16);
        assert_eq!(stats.matched, 0);
        assert_eq!(map.len(), 16);
    }

    #[test]
    fn test_merge_is_idempotent_on_point_set() {
        let map = test_map();
        let cloud = grid(4, 4, 0.25, 0.0);
        let origin = Vector3::new(0.5, 0.5, 1.0);
        map.merge(&cloud, &origin);
        map.update_dirty();
        let size = map.len();

        let stats = map.merge(&cloud, &origin);
        assert_eq!(map.len(), size);
        assert_eq!(stats.added, 0);
        assert_eq!(stats.matched, 16);
        for v in 0..map.len() {
            assert_eq!(map.point(v).occupied_count, 2);
        }
    }

    #[test]
    fn test_min_dist_invariant() {
        let map = test_map();
        // Two interleaved grids closer than points_min_dist collapse.
        let a = grid(4, 4, 0.25, 0.0);
        let b: Vec<Vector3<f32>> = a.iter().map(|p| p + Vector3::new(0.05, 0.0, 0.0)).collect();
        map.merge(&a, &Vector3::new(0.0, 0.0, 1.0));
        map.merge(&b, &Vector3::new(0.0, 0.0, 1.0));

        let points = map.clone_points();
        let min_dist = map.map_config.points_min_dist;
        for (i, a) in points.iter().enumerate() {
            for b in points.iter().skip(i + 1) {
                let d = (a.position - b.position).norm();
                assert!(d >= min_dist * 0.999, "{} < {}", d, min_dist);
            }
        }
    }

    #[test]
    fn test_non_finite_points_dropped() {
        let map = test_map();
        let cloud = vec![
            Vector3::new(f32::NAN, 0.0, 0.0),
            Vector3::new(1.0, f32::INFINITY, 0.0),
            Vector3::new(1.0, 1.0, 0.0),
        ];
        let stats = map.merge(&cloud, &Vector3::zeros());
        assert_eq!(stats.added, 1);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_update_dirty_is_fixed_point() {
        let map = test_map();
        map.merge(&grid(9, 9, 0.25, 0.0), &Vector3::new(1.0, 1.0, 1.0));
        assert!(map.update_dirty() > 0);
        let before: Vec<PointFlags> = map.clone_points().iter().map(|p| p.flags).collect();
        assert_eq!(map.update_dirty(), 0);
        let after: Vec<PointFlags> = map.clone_points().iter().map(|p| p.flags).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_labels_flat_grid() {
        let map = test_map();
        map.merge(&grid(9, 9, 0.25, 0.0), &Vector3::new(1.0, 1.0, 1.0));
        map.update_dirty();
        let center = map.clone_points()[4 * 9 + 4].clone();
        assert!(center.flags.contains(PointFlags::TRAVERSABLE));
        assert!(center.normal.z > 0.99);
    }

    #[test]
    fn test_edge_neighbor_invariant() {
        let map = test_map();
        map.merge(&grid(9, 9, 0.25, 0.0), &Vector3::new(1.0, 1.0, 1.0));
        map.update_dirty();

        let points = map.clone_points();
        for v in 0..points.len() {
            let expected = map
                .nearby_indices(&points[v].position, map.label_config.neighborhood_radius)
                .into_iter()
                .filter(|&u| u != v && points[u].flags.contains(PointFlags::EDGE))
                .count() as u16;
            assert_eq!(points[v].num_edge_neighbors, expected, "point {}", v);
        }
    }

    #[test]
    fn test_empty_accounting_monotonic() {
        let map = test_map();
        // A close surface, then a scan that passes well beyond it.
        map.merge(&[Vector3::new(1.0, 0.0, 0.0)], &Vector3::zeros());
        let far = vec![Vector3::new(5.0, 0.0, 0.0)];
        map.merge(&far, &Vector3::zeros());
        let first = map.point(0).empty_count;
        assert!(first > 0);
        map.merge(&far, &Vector3::zeros());
        assert!(map.point(0).empty_count >= first);
    }

    #[test]
    fn test_empty_accounting_requires_cone_match() {
        let map = test_map();
        map.merge(&[Vector3::new(1.0, 0.0, 0.0)], &Vector3::zeros());
        // Perpendicular ray: no cone match, no empty increment.
        map.merge(&[Vector3::new(0.0, 5.0, 0.0)], &Vector3::zeros());
        assert_eq!(map.point(0).empty_count, 0);
    }

    #[test]
    fn test_mark_visited() {
        let map = test_map();
        map.merge(&grid(4, 4, 0.25, 0.0), &Vector3::new(0.0, 0.0, 1.0));
        map.mark_visited(&Vector3::new(0.0, 0.0, 0.0), 12.5, true, 1.0);

        let origin_point = map.point(0);
        assert!(origin_point.dist_to_actor.abs() < 1e-6);
        assert!((origin_point.actor_last_visit - 12.5).abs() < 1e-9);
        assert!(origin_point.dist_to_other_actors.is_nan());

        // Closest approach is retained.
        map.mark_visited(&Vector3::new(10.0, 0.0, 0.0), 13.0, true, 100.0);
        assert!(map.point(0).dist_to_actor.abs() < 1e-6);
    }

    #[test]
    fn test_clone_window() {
        let map = test_map();
        map.merge(&grid(9, 9, 0.5, 0.0), &Vector3::new(0.0, 0.0, 1.0));
        let window = map.clone_window(&Vector3::new(1.0, 1.0, 0.0), 0.6);
        assert!(!window.is_empty());
        for p in &window {
            assert!((p.position.x - 1.0).abs() <= 0.6);
            assert!((p.position.y - 1.0).abs() <= 0.6);
        }
    }
}
