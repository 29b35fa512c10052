//! BM25 Okapi scoring.
//!
//! Scores documents against a query with the classic saturating-frequency
//! formula (`k1`, `b` from [`crate::config`]). An acceptance predicate is
//! ANDed into postings traversal: rejected documents never enter the score
//! map, so ranking among accepted documents is unaffected by rejected ones.
//! When the corpus-wide average document length is unavailable (zero), the
//! score degrades to raw term frequency.

use crate::bm25::inverted_index::InvertedIndex;
use crate::bm25::tokenizer::tokenize;
use crate::config;
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Scores `query` against the index, keeping only documents for which
/// `accept` returns true. Returns up to `limit` (internal id, score) pairs
/// sorted by descending score.
pub fn bm25_search<F>(
    index: &InvertedIndex,
    query: &str,
    limit: usize,
    accept: F,
) -> Vec<(u32, f32)>
where
    F: Fn(u32) -> bool,
{
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() || index.doc_count == 0 || limit == 0 {
        return Vec::new();
    }

    let avgdl = index.average_doc_length();
    let n = index.doc_count as f32;
    let k1 = config::BM25_K1;
    let b = config::BM25_B;

    let mut scores: HashMap<u32, f32> = HashMap::new();
    for token in query_tokens.iter() {
        let postings = match index.index.get(token) {
            Some(p) => p,
            None => continue,
        };
        let df = postings.len() as f32;
        // IDF: log((N - df + 0.5) / (df + 0.5) + 1)
        let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

        for posting in postings {
            if !accept(posting.doc_id) {
                continue;
            }
            let tf = posting.term_frequency as f32;
            let score = if avgdl > 0.0 {
                let dl = index
                    .doc_lengths
                    .get(posting.doc_id as usize)
                    .copied()
                    .unwrap_or(0) as f32;
                let tf_norm = (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl));
                idf * tf_norm
            } else {
                // degraded mode: no length statistic, raw term frequency
                tf
            };
            *scores.entry(posting.doc_id).or_insert(0.0) += score;
        }
    }

    // Partial sort: O(n log k) via min-heap of size limit
    let mut heap: BinaryHeap<Reverse<(OrderedFloat<f32>, u32)>> =
        BinaryHeap::with_capacity(limit + 1);
    for (id, score) in scores {
        heap.push(Reverse((OrderedFloat(score), id)));
        if heap.len() > limit {
            heap.pop();
        }
    }
    let mut results: Vec<(u32, f32)> = heap.into_iter().map(|Reverse((s, id))| (id, s.0)).collect();
    results.sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    results
}
