//! Core document types.
//!
//! A [`Document`] is the unit of ingestion: caller-supplied string id, text
//! content, a required timestamp, and a [`Metadata`] block with fixed labeled
//! fields plus an open typed key-value map. The id is the join key across the
//! lexical and vector indexes; a given id has at most one live version in
//! each index at any time.

use crate::config;
use crate::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A typed value in the open metadata map.
///
/// Used by filter predicates; the externally-tagged serde representation
/// keeps bincode snapshots stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetadataValue {
    /// Boolean value.
    Boolean(bool),
    /// 64-bit signed integer.
    Integer(i64),
    /// 64-bit floating-point number.
    Float(f64),
    /// UTF-8 string.
    String(String),
}

/// Labeled metadata attached to every document.
///
/// `category`, `group_id` and `project` default to `"NA"`; the flags default
/// to `false`. `custom` is an open map for caller-defined fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Free-form category label.
    pub category: String,
    /// Owning group identifier.
    pub group_id: String,
    /// Project label.
    pub project: String,
    /// Whether the record was escalated.
    pub escalated: bool,
    /// Whether the record was resolved.
    pub resolved: bool,
    /// Caller-defined typed fields.
    #[serde(default)]
    pub custom: HashMap<String, MetadataValue>,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            category: "NA".to_string(),
            group_id: "NA".to_string(),
            project: "NA".to_string(),
            escalated: false,
            resolved: false,
            custom: HashMap::new(),
        }
    }
}

/// A document to be ingested into both indexes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique caller-supplied identifier.
    pub id: String,
    /// Text content, indexed by BM25 and embedded for vector search.
    pub content: String,
    /// Point in time the document refers to. Required; drives temporal
    /// filtering on both indexes.
    pub timestamp: DateTime<Utc>,
    /// Labeled metadata, defaulted when not supplied.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    /// Creates a document with default metadata.
    pub fn new(id: impl Into<String>, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            timestamp,
            metadata: Metadata::default(),
        }
    }

    /// Creates a document with explicit metadata.
    pub fn with_metadata(
        id: impl Into<String>,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            timestamp,
            metadata,
        }
    }
}

/// Column-oriented batch input: parallel arrays of document fields.
///
/// All columns must have exactly the same length; a shorter column is a
/// validation error, never padded with defaults. When `metadata` is present
/// it fully replaces the default-constructed metadata for every row; sparse
/// per-row metadata is not merged with defaults.
#[derive(Debug, Clone, Default)]
pub struct DocumentColumns {
    /// Unique ids, one per row.
    pub ids: Vec<String>,
    /// Text contents, one per row.
    pub contents: Vec<String>,
    /// Timestamps, one per row.
    pub timestamps: Vec<DateTime<Utc>>,
    /// Optional explicit metadata, one per row when present.
    pub metadata: Option<Vec<Metadata>>,
}

impl DocumentColumns {
    /// Validates column lengths and assembles row-oriented documents.
    ///
    /// Fails with [`Error::Validation`] on any length mismatch, an empty
    /// batch id, or a batch larger than [`config::MAX_BATCH_SIZE`]; nothing
    /// is ingested from a call that fails validation.
    pub fn into_documents(self) -> Result<Vec<Document>, Error> {
        let n = self.ids.len();
        if self.contents.len() != n || self.timestamps.len() != n {
            return Err(Error::Validation(format!(
                "batch column lengths differ: {} ids, {} contents, {} timestamps",
                n,
                self.contents.len(),
                self.timestamps.len()
            )));
        }
        if let Some(ref metadata) = self.metadata {
            if metadata.len() != n {
                return Err(Error::Validation(format!(
                    "batch metadata length {} != {} rows",
                    metadata.len(),
                    n
                )));
            }
        }
        if n > config::MAX_BATCH_SIZE {
            return Err(Error::Validation(format!(
                "batch of {} rows exceeds maximum of {}",
                n,
                config::MAX_BATCH_SIZE
            )));
        }
        if self.ids.iter().any(|id| id.is_empty()) {
            return Err(Error::Validation("batch contains an empty id".into()));
        }

        let mut metadata = match self.metadata {
            Some(m) => m.into_iter().map(Some).collect(),
            None => vec![None; n],
        };
        let documents = self
            .ids
            .into_iter()
            .zip(self.contents)
            .zip(self.timestamps)
            .enumerate()
            .map(|(i, ((id, content), timestamp))| Document {
                id,
                content,
                timestamp,
                metadata: metadata[i].take().unwrap_or_default(),
            })
            .collect();
        Ok(documents)
    }
}
