//! Global configuration constants for fusedb.
//!
//! Tuning parameters and input validation limits live here as compile-time
//! constants. Per-query knobs (percentile, distance threshold, fusion weight)
//! default to these values but can be overridden on each
//! [`SearchRequest`](crate::search::SearchRequest).

/// BM25 Okapi term frequency saturation parameter.
///
/// Controls how quickly term frequency saturates. Standard value is 1.2.
pub const BM25_K1: f32 = 1.2;

/// BM25 Okapi document length normalization parameter.
///
/// 0.0 = no normalization, 1.0 = full normalization. Standard value is 0.75.
pub const BM25_B: f32 = 0.75;

/// Default number of results returned by a search.
pub const DEFAULT_TOP_K: usize = 5;

/// Default percentile cutoff applied to the lexical score distribution.
///
/// Only hits at or above this percentile survive the lexical filtering step,
/// and only when the score distribution looks discriminative (aggregate score
/// mass above hit count). This is a tunable policy, not a law.
pub const DEFAULT_LEXICAL_PERCENTILE: f64 = 90.0;

/// Default cosine-distance cutoff for vector hits.
///
/// Hits at or below this absolute distance survive (lower distance = more
/// similar). Cosine distance ranges over [0, 2]; 0.8 keeps moderately related
/// text while dropping unrelated matches.
pub const DEFAULT_VECTOR_DISTANCE_THRESHOLD: f32 = 0.8;

/// Default weight of the semantic component in the hybrid re-ranking score.
///
/// `hybrid = alpha * semantic + (1 - alpha) * edit_similarity`.
pub const DEFAULT_FUSION_ALPHA: f32 = 0.7;

/// Maximum number of documents per batch ingestion call.
pub const MAX_BATCH_SIZE: usize = 1_000;

/// Maximum length of document content in bytes.
pub const MAX_TEXT_LEN: usize = 1_000_000;

/// Maximum retries for a transient embedding-provider failure.
pub const EMBED_MAX_RETRIES: u32 = 5;

/// Base delay in milliseconds for exponential backoff between provider retries.
pub const EMBED_BACKOFF_BASE_MS: u64 = 500;

/// Cap in milliseconds for the exponential backoff delay.
pub const EMBED_BACKOFF_MAX_MS: u64 = 30_000;
