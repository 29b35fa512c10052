//! Threshold filtering and set fusion.
//!
//! Lexical hits pass through an adaptive percentile cutoff; vector hits pass
//! through an absolute distance cutoff. Survivors merge into one
//! deduplicated list, encounter order, first-seen-wins, with provenance.

use crate::search::engine::Provenance;
use std::collections::HashMap;

/// A fused candidate before hydration.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub id: String,
    pub lexical_score: Option<f32>,
    pub vector_distance: Option<f32>,
    pub provenance: Provenance,
}

/// Adaptive percentile cutoff over the lexical score distribution.
///
/// The cheap discriminativeness signal: when the aggregate score mass exceeds
/// the hit count, the query separated documents and the percentile cutoff
/// applies. A flat or trivial distribution (mass ≤ count, e.g. the constant
/// 1.0 scores of a match-all) keeps no lexical hits at all. The percentile is
/// a tunable policy surfaced on the search request, not a law.
pub(crate) fn percentile_filter(hits: &[(String, f32)], percentile: f64) -> Vec<(String, f32)> {
    if hits.is_empty() {
        return Vec::new();
    }
    let count = hits.len() as f64;
    let mass: f64 = hits.iter().map(|&(_, s)| s as f64).sum();
    if mass <= count {
        return Vec::new();
    }
    let cutoff = percentile_value(hits.iter().map(|&(_, s)| s).collect(), percentile);
    hits.iter()
        .filter(|&&(_, score)| score >= cutoff)
        .cloned()
        .collect()
}

/// Nearest-rank percentile of a score sample.
fn percentile_value(mut scores: Vec<f32>, percentile: f64) -> f32 {
    scores.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = scores.len();
    let rank = ((percentile / 100.0) * n as f64).ceil() as usize;
    scores[rank.clamp(1, n) - 1]
}

/// Absolute distance cutoff, inclusive: a hit at exactly the threshold
/// survives. Hits without a distance (pure metadata browses) always pass.
pub(crate) fn distance_filter(
    hits: &[(String, Option<f32>)],
    threshold: f32,
) -> Vec<(String, Option<f32>)> {
    hits.iter()
        .filter(|&&(_, distance)| distance.is_none_or(|d| d <= threshold))
        .cloned()
        .collect()
}

/// Merges lexical then vector survivors, deduplicating by id.
///
/// Encounter order is preserved and the first occurrence wins the position;
/// an id produced by both sides carries both scores and `Provenance::Both`.
pub(crate) fn fuse(
    lexical: Vec<(String, f32)>,
    vector: Vec<(String, Option<f32>)>,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = Vec::with_capacity(lexical.len() + vector.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (id, score) in lexical {
        positions.insert(id.clone(), candidates.len());
        candidates.push(Candidate {
            id,
            lexical_score: Some(score),
            vector_distance: None,
            provenance: Provenance::Lexical,
        });
    }
    for (id, distance) in vector {
        if let Some(&pos) = positions.get(&id) {
            candidates[pos].vector_distance = distance;
            candidates[pos].provenance = Provenance::Both;
        } else {
            positions.insert(id.clone(), candidates.len());
            candidates.push(Candidate {
                id,
                lexical_score: None,
                vector_distance: distance,
                provenance: Provenance::Vector,
            });
        }
    }
    candidates
}
