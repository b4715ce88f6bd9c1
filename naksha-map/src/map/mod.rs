//! Map store: point array, spatial index, dirty bookkeeping.

mod index;
mod store;

pub use index::PointIndex;
pub use store::{MergeStats, TerrainMap};
