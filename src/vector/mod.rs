//! Vector index: embedding storage with filtered nearest-neighbor search.

/// Distance metric for vector similarity.
pub mod distance;
/// The durable index: upsert, query, and snapshot handling.
pub mod index;

pub use distance::DistanceMetric;
pub use index::{VectorColumns, VectorIndex, VectorRecord};
