//! BM25 full-text primitives: tokenizer, inverted index, and Okapi scorer.

/// Inverted index mapping terms to postings lists.
pub mod inverted_index;
/// BM25 Okapi scoring with an ANDed acceptance predicate.
pub mod scorer;
/// Lowercasing, non-alphanumeric-splitting tokenizer.
pub mod tokenizer;

pub use inverted_index::{InvertedIndex, Posting};
pub use scorer::bm25_search;
pub use tokenizer::tokenize;
