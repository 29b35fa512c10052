//! Crate error taxonomy.
//!
//! Validation failures are never retried and surface immediately. Provider
//! failures carry their own transient/fatal split (see
//! [`ProviderError`](crate::provider::ProviderError)). A schema mismatch on
//! reopen is deliberately absent here: it triggers an index rebuild and a
//! logged recovery event rather than a user-facing error.

use crate::provider::ProviderError;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for ingestion and query operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input: mismatched batch lengths, inverted date range,
    /// out-of-range percentile or alpha, wrong embedding dimension.
    #[error("validation: {0}")]
    Validation(String),

    /// Embedding provider failure that survived the retry policy.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// One of the two indexes failed to persist a document. The other half is
    /// NOT rolled back; the inconsistency window is bounded by the next upsert
    /// of the same id or a [`reconcile`](crate::store::DocumentStore::reconcile)
    /// pass.
    #[error("partial ingestion of document '{id}' (lexical: {lexical:?}, vector: {vector:?})")]
    PartialIngestion {
        /// Id of the affected document.
        id: String,
        /// Error message from the lexical half, if it failed.
        lexical: Option<String>,
        /// Error message from the vector half, if it failed.
        vector: Option<String>,
    },

    /// Snapshot or directory I/O failure.
    #[error("index i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot payload failed integrity or consistency checks.
    #[error("corrupt index data: {0}")]
    Corrupt(String),
}
