//! Hybrid search: query both indexes, filter, fuse, optionally re-rank.

/// Threshold filtering and provenance-preserving merge.
pub mod fusion;
/// Optional hybrid re-ranking: standardized semantic score + edit similarity.
pub mod rerank;

mod engine;

pub use engine::{Provenance, SearchEngine, SearchHit, SearchRequest};
