//! The durable lexical index.
//!
//! Holds the inverted index, the stored documents, and the id mappings behind
//! a `parking_lot::RwLock`: concurrent readers, single writer. A write call
//! mutates under one guard and persists a fresh snapshot before returning, so
//! readers observe either the pre- or post-commit state, never a partial one.
//! The index exclusively owns its directory; nothing else mutates its files.

use crate::bm25::{bm25_search, InvertedIndex};
use crate::config;
use crate::document::{Document, Metadata};
use crate::error::{Error, Result};
use crate::lexical::schema::IndexSchema;
use crate::snapshot;
use crate::temporal::DateRange;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "lexical.idx";
const SCHEMA_FILE: &str = "schema.json";
const SNAPSHOT_MAGIC: &[u8; 4] = b"FLX1";

/// A document as stored by the lexical index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// Caller-supplied id.
    pub id: String,
    /// Raw content as ingested.
    pub content: String,
    /// Document timestamp.
    pub timestamp: DateTime<Utc>,
    /// Labeled metadata.
    pub metadata: Metadata,
}

/// Inner index state, protected by the `RwLock`.
///
/// Internal u32 ids index into `internal_to_id` and `timestamps`; a `None`
/// timestamp marks a vacated slot (removed or replaced). Slots are never
/// reused.
#[derive(Debug, Serialize, Deserialize)]
struct LexicalData {
    schema: IndexSchema,
    inverted: InvertedIndex,
    docs: HashMap<String, StoredDocument>,
    id_to_internal: HashMap<String, u32>,
    internal_to_id: Vec<String>,
    timestamps: Vec<Option<DateTime<Utc>>>,
}

impl LexicalData {
    fn empty(schema: IndexSchema) -> Self {
        Self {
            schema,
            inverted: InvertedIndex::new(),
            docs: HashMap::new(),
            id_to_internal: HashMap::new(),
            internal_to_id: Vec::new(),
            timestamps: Vec::new(),
        }
    }

    /// Consistency checks applied after deserialization.
    fn validate(&self) -> std::result::Result<(), String> {
        let slots = self.internal_to_id.len();
        if self.timestamps.len() != slots {
            return Err(format!(
                "timestamps length {} != slot count {}",
                self.timestamps.len(),
                slots
            ));
        }
        if self.inverted.doc_lengths.len() > slots {
            return Err(format!(
                "doc_lengths length {} > slot count {}",
                self.inverted.doc_lengths.len(),
                slots
            ));
        }
        if self.id_to_internal.len() != self.docs.len() {
            return Err(format!(
                "id map size {} != document count {}",
                self.id_to_internal.len(),
                self.docs.len()
            ));
        }
        for (id, &internal) in &self.id_to_internal {
            match self.internal_to_id.get(internal as usize) {
                Some(mapped) if mapped == id => {}
                _ => return Err(format!("id '{id}' maps to inconsistent slot {internal}")),
            }
            if self.timestamps[internal as usize].is_none() {
                return Err(format!("live id '{id}' points at a vacated slot"));
            }
        }
        Ok(())
    }

    fn apply_upsert(&mut self, doc: &Document) {
        if let Some(old) = self.id_to_internal.remove(&doc.id) {
            self.inverted.remove_document(old);
            self.timestamps[old as usize] = None;
        }
        let internal = self.internal_to_id.len() as u32;
        self.internal_to_id.push(doc.id.clone());
        self.timestamps.push(Some(doc.timestamp));
        self.id_to_internal.insert(doc.id.clone(), internal);
        self.inverted.add_document(internal, &doc.content);
        self.docs.insert(
            doc.id.clone(),
            StoredDocument {
                id: doc.id.clone(),
                content: doc.content.clone(),
                timestamp: doc.timestamp,
                metadata: doc.metadata.clone(),
            },
        );
    }
}

/// BM25-ranked lexical index with schema-checked on-disk persistence.
pub struct LexicalIndex {
    dir: PathBuf,
    inner: RwLock<LexicalData>,
}

impl LexicalIndex {
    /// Opens (or creates) the index rooted at `dir`.
    ///
    /// A persisted schema that differs from the expected one, or a snapshot
    /// that fails integrity or consistency checks, triggers a full directory
    /// wipe and an empty rebuild, logged as a recovery event rather than
    /// as an error. Callers must re-ingest from upstream after a rebuild.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let expected = IndexSchema::current();

        let data = match Self::load(&dir, &expected) {
            Ok(Some(data)) => {
                tracing::info!(?dir, documents = data.docs.len(), "opened lexical index");
                data
            }
            Ok(None) => {
                write_schema(&dir, &expected)?;
                LexicalData::empty(expected)
            }
            Err(reason) => {
                tracing::warn!(?dir, %reason, "lexical index rebuilt empty");
                fs::remove_dir_all(&dir)?;
                fs::create_dir_all(&dir)?;
                write_schema(&dir, &expected)?;
                LexicalData::empty(expected)
            }
        };

        Ok(Self {
            dir,
            inner: RwLock::new(data),
        })
    }

    /// Attempts to load persisted state. `Ok(None)` means a fresh directory;
    /// `Err` carries the reason a rebuild is required.
    fn load(
        dir: &Path,
        expected: &IndexSchema,
    ) -> std::result::Result<Option<LexicalData>, String> {
        let schema_path = dir.join(SCHEMA_FILE);
        if !schema_path.exists() {
            return Ok(None);
        }
        let raw = fs::read(&schema_path).map_err(|e| format!("unreadable schema: {e}"))?;
        let persisted: IndexSchema =
            serde_json::from_slice(&raw).map_err(|e| format!("undecodable schema: {e}"))?;
        if &persisted != expected {
            return Err(format!(
                "schema mismatch: persisted version {} with {} fields",
                persisted.version,
                persisted.fields.len()
            ));
        }

        let payload = snapshot::read(dir, SNAPSHOT_FILE, SNAPSHOT_MAGIC)
            .map_err(|e| format!("snapshot unreadable: {e}"))?;
        let payload = match payload {
            Some(p) => p,
            // schema present but never snapshotted: start empty on it
            None => return Ok(Some(LexicalData::empty(expected.clone()))),
        };
        let data: LexicalData =
            bincode::deserialize(&payload).map_err(|e| format!("snapshot undecodable: {e}"))?;
        if &data.schema != expected {
            return Err("snapshot schema disagrees with descriptor".to_string());
        }
        data.validate()
            .map_err(|e| format!("snapshot inconsistent: {e}"))?;
        Ok(Some(data))
    }

    fn persist(&self, data: &LexicalData) -> Result<()> {
        let payload = bincode::serialize(data).map_err(|e| Error::Corrupt(e.to_string()))?;
        snapshot::write(&self.dir, SNAPSHOT_FILE, SNAPSHOT_MAGIC, &payload)?;
        Ok(())
    }

    fn validate_input(doc: &Document) -> Result<()> {
        if doc.id.is_empty() {
            return Err(Error::Validation("document id must not be empty".into()));
        }
        if doc.content.len() > config::MAX_TEXT_LEN {
            return Err(Error::Validation(format!(
                "content of '{}' exceeds {} bytes",
                doc.id,
                config::MAX_TEXT_LEN
            )));
        }
        Ok(())
    }

    /// Inserts or fully replaces a document. Replacement removes every old
    /// posting before adding new ones, as one atomic step under the write
    /// lock.
    pub fn upsert(&self, doc: &Document) -> Result<()> {
        Self::validate_input(doc)?;
        let mut data = self.inner.write();
        data.apply_upsert(doc);
        self.persist(&data)
    }

    /// Upserts a batch under a single write guard with one snapshot commit:
    /// all postings become visible together or not at all.
    pub fn upsert_batch(&self, docs: &[Document]) -> Result<()> {
        for doc in docs {
            Self::validate_input(doc)?;
        }
        let mut data = self.inner.write();
        for doc in docs {
            data.apply_upsert(doc);
        }
        self.persist(&data)
    }

    /// Removes a document. Returns whether it existed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut data = self.inner.write();
        let internal = match data.id_to_internal.remove(id) {
            Some(internal) => internal,
            None => return Ok(false),
        };
        data.inverted.remove_document(internal);
        data.timestamps[internal as usize] = None;
        data.docs.remove(id);
        self.persist(&data)?;
        Ok(true)
    }

    /// Fetches a stored document by id.
    pub fn get(&self, id: &str) -> Option<StoredDocument> {
        self.inner.read().docs.get(id).cloned()
    }

    /// BM25 query, optionally restricted to an inclusive date window.
    ///
    /// The window predicate is ANDed into postings traversal, so relevance
    /// ranking among in-window documents is unaffected by out-of-window ones.
    /// Returns up to `limit` (id, score) pairs, best first.
    pub fn query_terms(
        &self,
        query: &str,
        range: Option<&DateRange>,
        limit: usize,
    ) -> Vec<(String, f32)> {
        let data = self.inner.read();
        let accept = |internal: u32| match data.timestamps.get(internal as usize) {
            Some(Some(ts)) => range.is_none_or(|r| r.contains(*ts)),
            _ => false,
        };
        bm25_search(&data.inverted, query, limit, accept)
            .into_iter()
            .map(|(internal, score)| (data.internal_to_id[internal as usize].clone(), score))
            .collect()
    }

    /// Match-everything query: every live in-window document at a constant
    /// score of 1.0, in slot order. A flat distribution like this is treated
    /// as non-discriminative by the fusion layer.
    pub fn query_all(&self, range: Option<&DateRange>) -> Vec<(String, f32)> {
        let data = self.inner.read();
        data.timestamps
            .iter()
            .enumerate()
            .filter_map(|(slot, ts)| {
                let ts = (*ts)?;
                if range.is_none_or(|r| r.contains(ts)) {
                    Some((data.internal_to_id[slot].clone(), 1.0))
                } else {
                    None
                }
            })
            .collect()
    }

    /// Number of live documents.
    pub fn len(&self) -> usize {
        self.inner.read().docs.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.inner.read().docs.is_empty()
    }

    /// All live document ids, for reconciliation against the vector store.
    pub fn ids(&self) -> Vec<String> {
        self.inner.read().docs.keys().cloned().collect()
    }
}

fn write_schema(dir: &Path, schema: &IndexSchema) -> Result<()> {
    let raw = serde_json::to_vec_pretty(schema).map_err(|e| Error::Corrupt(e.to_string()))?;
    fs::write(dir.join(SCHEMA_FILE), raw)?;
    Ok(())
}
