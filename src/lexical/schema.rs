//! Fixed field schema for the lexical index.
//!
//! The schema is decided at index creation and persisted as a readable
//! descriptor next to the snapshot. On reopen, a persisted schema that
//! differs from [`IndexSchema::current`] means the on-disk index was built
//! by an incompatible version: it is discarded and rebuilt empty rather
//! than used. Schema drift is never silently tolerated.

use serde::{Deserialize, Serialize};

/// How a field participates in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Unique caller-supplied identifier.
    Id,
    /// Tokenized, BM25-scored text.
    Text,
    /// Point in time, filterable by date range.
    Timestamp,
    /// Stored string label, filterable by equality.
    Label,
    /// Stored boolean flag, filterable by equality.
    Flag,
}

/// A named, typed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Field name.
    pub name: String,
    /// Field kind.
    pub kind: FieldKind,
}

/// The complete field set an index was created with, plus a format version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    /// Snapshot format version; bumped on incompatible layout changes.
    pub version: u32,
    /// Ordered field declarations.
    pub fields: Vec<SchemaField>,
}

impl IndexSchema {
    /// The schema this crate version writes and expects on reopen.
    pub fn current() -> Self {
        let field = |name: &str, kind: FieldKind| SchemaField {
            name: name.to_string(),
            kind,
        };
        Self {
            version: 1,
            fields: vec![
                field("id", FieldKind::Id),
                field("content", FieldKind::Text),
                field("timestamp", FieldKind::Timestamp),
                field("category", FieldKind::Label),
                field("group_id", FieldKind::Label),
                field("project", FieldKind::Label),
                field("escalated", FieldKind::Flag),
                field("resolved", FieldKind::Flag),
            ],
        }
    }
}
