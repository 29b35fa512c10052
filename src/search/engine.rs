//! The fusion engine: one query against both indexes, merged with provenance.

use crate::config;
use crate::error::{Error, Result};
use crate::filter::MetadataFilter;
use crate::lexical::LexicalIndex;
use crate::provider::{embed_with_retry, EmbeddingProvider, RetryPolicy};
use crate::search::{fusion, rerank};
use crate::temporal::DateRange;
use crate::vector::VectorIndex;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Which retrieval method(s) produced a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    /// Lexical index only.
    Lexical,
    /// Vector index only.
    Vector,
    /// Both indexes.
    Both,
}

/// Parameters of a hybrid search.
///
/// `filter`, when set, overrides the date-range-derived vector filter; the
/// date range still restricts the lexical side.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    /// Free-text query. When absent the lexical side runs a match-everything
    /// query and the vector side a pure metadata/date browse.
    pub query: Option<String>,
    /// Inclusive timestamp window applied by both indexes.
    pub date_range: Option<DateRange>,
    /// Maximum number of results. Zero yields an empty result, not an error.
    pub top_k: usize,
    /// Percentile cutoff (0–100) for the lexical score distribution.
    pub lexical_percentile: f64,
    /// Inclusive cosine-distance cutoff for vector hits.
    pub vector_distance_threshold: f32,
    /// Weight (0–1) of the semantic component in hybrid re-ranking.
    pub alpha: f32,
    /// Whether to apply the hybrid re-ranking step.
    pub rerank: bool,
    /// Explicit vector-side metadata filter, overriding the date range.
    pub filter: Option<MetadataFilter>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            query: None,
            date_range: None,
            top_k: config::DEFAULT_TOP_K,
            lexical_percentile: config::DEFAULT_LEXICAL_PERCENTILE,
            vector_distance_threshold: config::DEFAULT_VECTOR_DISTANCE_THRESHOLD,
            alpha: config::DEFAULT_FUSION_ALPHA,
            rerank: false,
            filter: None,
        }
    }
}

/// One entry of the fused, ranked result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Document id.
    pub id: String,
    /// Stored content.
    pub content: String,
    /// Stored timestamp.
    pub timestamp: DateTime<Utc>,
    /// Which index(es) produced this hit.
    pub provenance: Provenance,
    /// BM25 score, when the lexical side produced the hit.
    pub lexical_score: Option<f32>,
    /// Cosine distance, when the vector side produced the hit.
    pub vector_distance: Option<f32>,
    /// Hybrid score, set when re-ranking ran.
    pub score: Option<f32>,
}

/// Executes hybrid searches against a lexical and a vector index.
pub struct SearchEngine {
    lexical: Arc<LexicalIndex>,
    vector: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
}

impl SearchEngine {
    /// Creates an engine over the two indexes and an embedding provider.
    pub fn new(
        lexical: Arc<LexicalIndex>,
        vector: Arc<VectorIndex>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            lexical,
            vector,
            provider,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the provider retry policy for query embeddings.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Runs a hybrid search.
    ///
    /// An empty corpus yields an empty result. A provider failure while
    /// embedding the query propagates as the query's failure: returning
    /// partial results without signaling degradation would hide missing
    /// candidates.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        validate(request)?;
        if request.top_k == 0 {
            return Ok(Vec::new());
        }
        let filter = request
            .filter
            .clone()
            .or_else(|| request.date_range.map(|r| r.to_filter()));

        let lexical_hits = match &request.query {
            Some(query) => {
                self.lexical
                    .query_terms(query, request.date_range.as_ref(), request.top_k)
            }
            None => self.lexical.query_all(request.date_range.as_ref()),
        };

        let vector_hits: Vec<(String, Option<f32>)> = match &request.query {
            Some(query) => {
                let embedding = embed_with_retry(self.provider.as_ref(), &self.retry, query)
                    .await
                    .map_err(Error::Provider)?;
                self.vector
                    .query(&embedding, filter.as_ref(), request.top_k)?
                    .into_iter()
                    .map(|(id, distance)| (id, Some(distance)))
                    .collect()
            }
            None => self
                .vector
                .get_by_filter(filter.as_ref())
                .into_iter()
                .map(|record| (record.id, None))
                .collect(),
        };

        let lexical_kept = fusion::percentile_filter(&lexical_hits, request.lexical_percentile);
        let vector_kept = fusion::distance_filter(&vector_hits, request.vector_distance_threshold);
        let fused = fusion::fuse(lexical_kept, vector_kept);

        let mut hits = self.hydrate(fused);
        if request.rerank {
            if let Some(query) = &request.query {
                rerank::rerank(&mut hits, query, request.alpha);
            }
        }
        hits.truncate(request.top_k);
        Ok(hits)
    }

    /// Resolves candidates to stored content and timestamps. The lexical
    /// store is authoritative; the vector snapshot covers ids sitting in the
    /// dual-write inconsistency window.
    fn hydrate(&self, candidates: Vec<fusion::Candidate>) -> Vec<SearchHit> {
        candidates
            .into_iter()
            .filter_map(|candidate| {
                let (content, timestamp) = match self.lexical.get(&candidate.id) {
                    Some(stored) => (stored.content, stored.timestamp),
                    None => {
                        let record = self.vector.get(&candidate.id)?;
                        (record.content, record.timestamp)
                    }
                };
                Some(SearchHit {
                    id: candidate.id,
                    content,
                    timestamp,
                    provenance: candidate.provenance,
                    lexical_score: candidate.lexical_score,
                    vector_distance: candidate.vector_distance,
                    score: None,
                })
            })
            .collect()
    }
}

fn validate(request: &SearchRequest) -> Result<()> {
    if !(0.0..=100.0).contains(&request.lexical_percentile) {
        return Err(Error::Validation(format!(
            "lexical percentile {} outside 0-100",
            request.lexical_percentile
        )));
    }
    if !(0.0..=1.0).contains(&request.alpha) {
        return Err(Error::Validation(format!(
            "fusion alpha {} outside 0-1",
            request.alpha
        )));
    }
    if request.vector_distance_threshold < 0.0 {
        return Err(Error::Validation(format!(
            "vector distance threshold {} is negative",
            request.vector_distance_threshold
        )));
    }
    Ok(())
}
