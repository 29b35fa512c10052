//! Inverted index for BM25 scoring.
//!
//! Maps terms to postings lists of (internal u32 id, term frequency).
//! Term frequencies for a document are recomputed in full on every upsert:
//! the caller removes the old version's postings before adding the new ones,
//! so there is no incremental decay.

use crate::bm25::tokenizer::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single entry in a term's postings list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Posting {
    /// Internal u32 document id.
    pub doc_id: u32,
    /// Number of times the term appears in this document.
    pub term_frequency: u32,
}

/// Inverted index with document-length tracking for BM25 normalization.
///
/// Slot `i` of `doc_lengths` belongs to internal id `i`; removed slots keep
/// a zero length and are never reused. Occupancy is tracked by the owning
/// lexical index, which must call [`remove_document`](Self::remove_document)
/// exactly once per occupied slot.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct InvertedIndex {
    /// term → postings list.
    pub index: HashMap<String, Vec<Posting>>,
    /// internal id → token count (0 after removal, or for empty content).
    pub doc_lengths: Vec<u32>,
    /// Number of live documents.
    pub doc_count: u32,
    /// Sum of all live document lengths.
    pub total_doc_length: u64,
}

impl InvertedIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes a document's text under a fresh internal id.
    pub fn add_document(&mut self, internal_id: u32, text: &str) {
        let tokens = tokenize(text);
        let doc_len = tokens.len() as u32;

        let idx = internal_id as usize;
        if idx >= self.doc_lengths.len() {
            self.doc_lengths.resize(idx + 1, 0);
        }
        self.doc_lengths[idx] = doc_len;
        self.doc_count += 1;
        self.total_doc_length += doc_len as u64;

        let mut frequencies: HashMap<&str, u32> = HashMap::new();
        for token in tokens.iter() {
            *frequencies.entry(token).or_insert(0) += 1;
        }
        for (term, tf) in frequencies {
            self.index.entry(term.to_string()).or_default().push(Posting {
                doc_id: internal_id,
                term_frequency: tf,
            });
        }
    }

    /// Removes a live document's postings and length accounting.
    ///
    /// Must be called at most once per occupied internal id; the caller owns
    /// occupancy tracking.
    pub fn remove_document(&mut self, internal_id: u32) {
        let idx = internal_id as usize;
        if idx >= self.doc_lengths.len() {
            return;
        }
        let doc_len = self.doc_lengths[idx];
        self.doc_lengths[idx] = 0;
        self.doc_count = self.doc_count.saturating_sub(1);
        self.total_doc_length = self.total_doc_length.saturating_sub(doc_len as u64);

        if doc_len > 0 {
            self.index.retain(|_, postings| {
                postings.retain(|p| p.doc_id != internal_id);
                !postings.is_empty()
            });
        }
    }

    /// Average live document length, or 0.0 for an empty index.
    pub fn average_doc_length(&self) -> f32 {
        if self.doc_count == 0 {
            return 0.0;
        }
        self.total_doc_length as f32 / self.doc_count as f32
    }
}
