//! Lexical index: BM25-ranked term search with on-disk persistence.

/// The durable index: upsert, query, and snapshot handling.
pub mod index;
/// Fixed field schema persisted alongside the index.
pub mod schema;

pub use index::{LexicalIndex, StoredDocument};
pub use schema::{FieldKind, IndexSchema, SchemaField};
