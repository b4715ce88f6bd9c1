//! Map point with per-point geometric features and traversability labels.

use nalgebra::Vector3;

/// Semantic label bits assigned by the label engine.
///
/// A point normally carries exactly one of the traversal-relevant bits
/// (TRAVERSABLE, EDGE, OBSTACLE, UNKNOWN); EMPTY marks points whose
/// `empty_count` dominates their `occupied_count`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct PointFlags(u8);

impl PointFlags {
    /// Locally flat, clear headroom, far enough from obstacles.
    pub const TRAVERSABLE: PointFlags = PointFlags(1 << 0);
    /// Geometric frontier: traversable but the neighborhood lies to one side.
    pub const EDGE: PointFlags = PointFlags(1 << 1);
    /// Too steep, too rough, or blocked headroom.
    pub const OBSTACLE: PointFlags = PointFlags(1 << 2);
    /// Not enough neighbors to estimate local geometry.
    pub const UNKNOWN: PointFlags = PointFlags(1 << 3);
    /// Observed as free space more often than as surface.
    pub const EMPTY: PointFlags = PointFlags(1 << 4);

    /// No bits set.
    pub const fn empty() -> Self {
        PointFlags(0)
    }

    /// True if all bits of `other` are set in `self`.
    #[inline]
    pub fn contains(self, other: PointFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the bits of `other`.
    #[inline]
    pub fn insert(&mut self, other: PointFlags) {
        self.0 |= other.0;
    }

    /// Clear the bits of `other`.
    #[inline]
    pub fn remove(&mut self, other: PointFlags) {
        self.0 &= !other.0;
    }

    /// A point may be entered by a path iff it is TRAVERSABLE or EDGE.
    #[inline]
    pub fn passable(self) -> bool {
        self.contains(PointFlags::TRAVERSABLE) || self.contains(PointFlags::EDGE)
    }

    /// Raw bit value, used when exporting label clouds.
    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }
}

/// A single point of the merged surface map.
///
/// Positions are in the map frame. Feature fields are undefined until the
/// point has been through a label pass with at least `min_normal_pts`
/// neighbors; until then the point carries the UNKNOWN flag.
#[derive(Clone, Debug)]
pub struct MapPoint {
    /// Position in the map frame, always finite.
    pub position: Vector3<f32>,
    /// Unit surface normal with non-negative z, valid once labeled.
    pub normal: Vector3<f32>,
    /// How many merges observed this point as surface.
    pub occupied_count: u16,
    /// How many merges saw a ray pass through this point.
    pub empty_count: u16,
    /// Neighbors used for the normal estimate.
    pub num_normal_pts: u16,
    /// Minimum neighbor offset along the normal.
    pub ground_diff_min: f32,
    /// Maximum neighbor offset along the normal.
    pub ground_diff_max: f32,
    /// Standard deviation of neighbor offsets along the normal.
    pub ground_diff_std: f32,
    /// Mean absolute neighbor offset along the normal.
    pub ground_abs_diff_mean: f32,
    /// Neighbors inside the clearance box above the tangent plane.
    pub num_obstacle_pts: u16,
    /// Radius-neighbors currently labeled EDGE.
    pub num_edge_neighbors: u16,
    /// Semantic label bits.
    pub flags: PointFlags,
    /// Last observed distance to this robot (NaN if never observed).
    pub dist_to_actor: f32,
    /// Last observed distance to any other robot (NaN if never observed).
    pub dist_to_other_actors: f32,
    /// Stamp of the last self observation, seconds since init (NaN if never).
    pub actor_last_visit: f64,
    /// Stamp of the last other-robot observation (NaN if never).
    pub other_actors_last_visit: f64,
    /// Travel cost from the last plan's start vertex.
    pub path_cost: f32,
    /// Exploration reward from the last plan.
    pub reward: f32,
    /// `path_cost / reward` from the last plan.
    pub relative_cost: f32,
}

impl MapPoint {
    /// Create a fresh point at `position`, observed once, not yet labeled.
    pub fn new(position: Vector3<f32>) -> Self {
        Self {
            position,
            normal: Vector3::zeros(),
            occupied_count: 1,
            empty_count: 0,
            num_normal_pts: 0,
            ground_diff_min: 0.0,
            ground_diff_max: 0.0,
            ground_diff_std: 0.0,
            ground_abs_diff_mean: 0.0,
            num_obstacle_pts: 0,
            num_edge_neighbors: 0,
            flags: PointFlags::UNKNOWN,
            dist_to_actor: f32::NAN,
            dist_to_other_actors: f32::NAN,
            actor_last_visit: f64::NAN,
            other_actors_last_visit: f64::NAN,
            path_cost: f32::INFINITY,
            reward: 0.0,
            relative_cost: f32::INFINITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_bit_ops() {
        let mut flags = PointFlags::empty();
        assert!(!flags.passable());

        flags.insert(PointFlags::TRAVERSABLE);
        assert!(flags.contains(PointFlags::TRAVERSABLE));
        assert!(flags.passable());

        flags.remove(PointFlags::TRAVERSABLE);
        flags.insert(PointFlags::EDGE);
        assert!(flags.passable());

        flags.remove(PointFlags::EDGE);
        flags.insert(PointFlags::OBSTACLE);
        assert!(!flags.passable());
    }

    #[test]
    fn test_new_point_is_unknown() {
        let p = MapPoint::new(Vector3::new(1.0, 2.0, 3.0));
        assert!(p.flags.contains(PointFlags::UNKNOWN));
        assert_eq!(p.occupied_count, 1);
        assert_eq!(p.empty_count, 0);
        assert!(p.dist_to_actor.is_nan());
        assert!(p.actor_last_visit.is_nan());
    }
}
