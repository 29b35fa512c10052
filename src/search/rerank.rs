//! Hybrid re-ranking over fused candidates.
//!
//! Semantic scores (1 − cosine distance) are standardized to zero mean and
//! unit variance across the candidates that have one, then squashed through
//! the logistic function into (0, 1). Candidates with no semantic score sit
//! at the 0.5 midpoint. A normalized Levenshtein similarity between the query
//! text and each candidate's content supplies the lexical component. The
//! final score is `alpha * semantic + (1 - alpha) * edit`; the sort is
//! stable, so ties keep their fusion order.

use crate::search::engine::SearchHit;

/// Scores and reorders `hits` in place, descending by hybrid score.
pub(crate) fn rerank(hits: &mut [SearchHit], query: &str, alpha: f32) {
    let semantic: Vec<Option<f32>> = hits
        .iter()
        .map(|h| h.vector_distance.map(|d| 1.0 - d))
        .collect();
    let present: Vec<f32> = semantic.iter().filter_map(|s| *s).collect();
    let (mean, std_dev) = mean_std(&present);

    for (hit, sim) in hits.iter_mut().zip(&semantic) {
        let z = match sim {
            Some(s) if std_dev > 0.0 => (s - mean) / std_dev,
            _ => 0.0,
        };
        let semantic_norm = logistic(z);
        let edit = edit_similarity(query, &hit.content);
        hit.score = Some(alpha * semantic_norm + (1.0 - alpha) * edit);
    }

    // stable: ties keep fusion order
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn logistic(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

/// Population mean and standard deviation.
fn mean_std(values: &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f32;
    let mean = values.iter().sum::<f32>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
    (mean, variance.sqrt())
}

/// Normalized edit-distance similarity in [0, 1]; 1.0 for identical strings.
pub(crate) fn edit_similarity(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f32 / max_len as f32
}

/// Two-row dynamic-programming Levenshtein distance.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            current[j + 1] = substitution.min(prev[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut prev, &mut current);
    }
    prev[b.len()]
}
