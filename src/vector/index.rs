//! The durable vector index.
//!
//! Stores one [`VectorRecord`] per document id: the embedding plus a content,
//! timestamp, and metadata snapshot, so filter predicates evaluate without a
//! join back to the lexical store. Search is an exact scan under the cosine
//! metric with a min-heap partial top-k. The embedding dimension is fixed at
//! creation and invariant for the index's lifetime; the same `RwLock` and
//! snapshot regime as the lexical index applies.

use crate::document::Metadata;
use crate::error::{Error, Result};
use crate::filter::MetadataFilter;
use crate::snapshot;
use crate::vector::distance::DistanceMetric;
use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BinaryHeap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "vectors.idx";
const SCHEMA_FILE: &str = "schema.json";
const SNAPSHOT_MAGIC: &[u8; 4] = b"FVX1";

/// A stored embedding with its metadata snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Caller-supplied document id.
    pub id: String,
    /// Fixed-dimension embedding.
    pub embedding: Vec<f32>,
    /// Content snapshot, used as a hydration fallback.
    pub content: String,
    /// Document timestamp.
    pub timestamp: DateTime<Utc>,
    /// Metadata snapshot for filter predicates.
    pub metadata: Metadata,
}

/// Column-oriented batch input for the vector index.
///
/// All columns must have exactly the same length; shorter columns are a
/// validation error, never padded. Explicit `metadata`, when present, fully
/// replaces default-constructed metadata for the whole batch.
#[derive(Debug, Clone, Default)]
pub struct VectorColumns {
    /// Document ids.
    pub ids: Vec<String>,
    /// Embeddings, one per id.
    pub embeddings: Vec<Vec<f32>>,
    /// Content snapshots, one per id.
    pub contents: Vec<String>,
    /// Timestamps, one per id.
    pub timestamps: Vec<DateTime<Utc>>,
    /// Optional explicit metadata, one per id when present.
    pub metadata: Option<Vec<Metadata>>,
}

impl VectorColumns {
    fn into_records(self) -> Result<Vec<VectorRecord>> {
        let n = self.ids.len();
        if self.embeddings.len() != n || self.contents.len() != n || self.timestamps.len() != n {
            return Err(Error::Validation(format!(
                "vector batch column lengths differ: {} ids, {} embeddings, {} contents, {} timestamps",
                n,
                self.embeddings.len(),
                self.contents.len(),
                self.timestamps.len()
            )));
        }
        if let Some(ref metadata) = self.metadata {
            if metadata.len() != n {
                return Err(Error::Validation(format!(
                    "vector batch metadata length {} != {} rows",
                    metadata.len(),
                    n
                )));
            }
        }
        let mut metadata = match self.metadata {
            Some(m) => m.into_iter().map(Some).collect(),
            None => vec![None; n],
        };
        Ok(self
            .ids
            .into_iter()
            .zip(self.embeddings)
            .zip(self.contents)
            .zip(self.timestamps)
            .enumerate()
            .map(|(i, (((id, embedding), content), timestamp))| VectorRecord {
                id,
                embedding,
                content,
                timestamp,
                metadata: metadata[i].take().unwrap_or_default(),
            })
            .collect())
    }
}

/// Persisted descriptor: dimension and metric, fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct VectorSchema {
    version: u32,
    dimension: usize,
    metric: DistanceMetric,
}

/// Inner index state, protected by the `RwLock`.
///
/// `order` preserves first-insertion order for browse queries; an upsert of
/// an existing id keeps its position.
#[derive(Debug, Serialize, Deserialize)]
struct VectorData {
    schema: VectorSchema,
    records: HashMap<String, VectorRecord>,
    order: Vec<String>,
}

impl VectorData {
    fn empty(schema: VectorSchema) -> Self {
        Self {
            schema,
            records: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        if self.order.len() != self.records.len() {
            return Err(format!(
                "order length {} != record count {}",
                self.order.len(),
                self.records.len()
            ));
        }
        for id in &self.order {
            let record = self
                .records
                .get(id)
                .ok_or_else(|| format!("ordered id '{id}' has no record"))?;
            if record.embedding.len() != self.schema.dimension {
                return Err(format!(
                    "record '{id}' dimension {} != index dimension {}",
                    record.embedding.len(),
                    self.schema.dimension
                ));
            }
        }
        Ok(())
    }
}

/// Embedding store with exact filtered nearest-neighbor search.
pub struct VectorIndex {
    dir: PathBuf,
    inner: RwLock<VectorData>,
}

impl VectorIndex {
    /// Opens (or creates) the index rooted at `dir` with the given embedding
    /// dimension and the cosine metric.
    ///
    /// A persisted dimension or metric that differs from the expected one
    /// gets the same treatment as lexical schema drift: full directory wipe,
    /// empty rebuild, logged recovery event.
    pub fn open(dir: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Validation("embedding dimension must be > 0".into()));
        }
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let expected = VectorSchema {
            version: 1,
            dimension,
            metric: DistanceMetric::Cosine,
        };

        let data = match Self::load(&dir, &expected) {
            Ok(Some(data)) => {
                tracing::info!(?dir, records = data.records.len(), "opened vector index");
                data
            }
            Ok(None) => {
                write_schema(&dir, &expected)?;
                VectorData::empty(expected)
            }
            Err(reason) => {
                tracing::warn!(?dir, %reason, "vector index rebuilt empty");
                fs::remove_dir_all(&dir)?;
                fs::create_dir_all(&dir)?;
                write_schema(&dir, &expected)?;
                VectorData::empty(expected)
            }
        };

        Ok(Self {
            dir,
            inner: RwLock::new(data),
        })
    }

    fn load(
        dir: &Path,
        expected: &VectorSchema,
    ) -> std::result::Result<Option<VectorData>, String> {
        let schema_path = dir.join(SCHEMA_FILE);
        if !schema_path.exists() {
            return Ok(None);
        }
        let raw = fs::read(&schema_path).map_err(|e| format!("unreadable schema: {e}"))?;
        let persisted: VectorSchema =
            serde_json::from_slice(&raw).map_err(|e| format!("undecodable schema: {e}"))?;
        if &persisted != expected {
            return Err(format!(
                "schema mismatch: persisted dimension {} vs expected {}",
                persisted.dimension, expected.dimension
            ));
        }

        let payload = snapshot::read(dir, SNAPSHOT_FILE, SNAPSHOT_MAGIC)
            .map_err(|e| format!("snapshot unreadable: {e}"))?;
        let payload = match payload {
            Some(p) => p,
            None => return Ok(Some(VectorData::empty(expected.clone()))),
        };
        let data: VectorData =
            bincode::deserialize(&payload).map_err(|e| format!("snapshot undecodable: {e}"))?;
        if &data.schema != expected {
            return Err("snapshot schema disagrees with descriptor".to_string());
        }
        data.validate()
            .map_err(|e| format!("snapshot inconsistent: {e}"))?;
        Ok(Some(data))
    }

    fn persist(&self, data: &VectorData) -> Result<()> {
        let payload = bincode::serialize(data).map_err(|e| Error::Corrupt(e.to_string()))?;
        snapshot::write(&self.dir, SNAPSHOT_FILE, SNAPSHOT_MAGIC, &payload)?;
        Ok(())
    }

    /// The fixed embedding dimension.
    pub fn dimension(&self) -> usize {
        self.inner.read().schema.dimension
    }

    fn check_dimension(&self, embedding: &[f32], id: &str) -> Result<()> {
        let expected = self.inner.read().schema.dimension;
        if embedding.len() != expected {
            return Err(Error::Validation(format!(
                "embedding for '{id}' has dimension {}, index expects {expected}",
                embedding.len()
            )));
        }
        Ok(())
    }

    /// Inserts or fully replaces the record for `record.id`.
    pub fn upsert(&self, record: VectorRecord) -> Result<()> {
        if record.id.is_empty() {
            return Err(Error::Validation("record id must not be empty".into()));
        }
        self.check_dimension(&record.embedding, &record.id)?;
        let mut data = self.inner.write();
        if data.records.insert(record.id.clone(), record.clone()).is_none() {
            data.order.push(record.id);
        }
        self.persist(&data)
    }

    /// Upserts a batch of parallel columns under one write guard with one
    /// snapshot commit. Validation happens before any mutation: a failing
    /// call ingests nothing.
    pub fn upsert_batch(&self, columns: VectorColumns) -> Result<()> {
        let records = columns.into_records()?;
        for record in &records {
            if record.id.is_empty() {
                return Err(Error::Validation("record id must not be empty".into()));
            }
            self.check_dimension(&record.embedding, &record.id)?;
        }
        let mut data = self.inner.write();
        for record in records {
            if data.records.insert(record.id.clone(), record.clone()).is_none() {
                data.order.push(record.id);
            }
        }
        self.persist(&data)
    }

    /// Removes a record. Returns whether it existed.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut data = self.inner.write();
        if data.records.remove(id).is_none() {
            return Ok(false);
        }
        data.order.retain(|existing| existing != id);
        self.persist(&data)?;
        Ok(true)
    }

    /// Fetches a record by id.
    pub fn get(&self, id: &str) -> Option<VectorRecord> {
        self.inner.read().records.get(id).cloned()
    }

    /// Nearest-neighbor search: up to `top_k` (id, distance) pairs sorted by
    /// ascending cosine distance, restricted to records matching `filter`.
    pub fn query(
        &self,
        query_embedding: &[f32],
        filter: Option<&MetadataFilter>,
        top_k: usize,
    ) -> Result<Vec<(String, f32)>> {
        self.check_dimension(query_embedding, "query")?;
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let data = self.inner.read();
        let metric = data.schema.metric;

        // Partial selection: max-heap of size top_k keeps the k smallest distances
        let mut heap: BinaryHeap<(OrderedFloat<f32>, String)> =
            BinaryHeap::with_capacity(top_k + 1);
        for id in &data.order {
            let record = &data.records[id];
            if let Some(f) = filter {
                if !f.matches(record.timestamp, &record.metadata) {
                    continue;
                }
            }
            let distance = metric.distance(query_embedding, &record.embedding);
            heap.push((OrderedFloat(distance), id.clone()));
            if heap.len() > top_k {
                heap.pop();
            }
        }
        let mut results: Vec<(String, f32)> =
            heap.into_iter().map(|(d, id)| (id, d.0)).collect();
        results.sort_unstable_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        Ok(results)
    }

    /// All records matching `filter`, in first-insertion order. Used for pure
    /// metadata/date browses where no query vector exists.
    pub fn get_by_filter(&self, filter: Option<&MetadataFilter>) -> Vec<VectorRecord> {
        let data = self.inner.read();
        data.order
            .iter()
            .filter_map(|id| {
                let record = &data.records[id];
                match filter {
                    Some(f) if !f.matches(record.timestamp, &record.metadata) => None,
                    _ => Some(record.clone()),
                }
            })
            .collect()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    /// Whether the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.inner.read().records.is_empty()
    }

    /// All record ids, for reconciliation against the lexical store.
    pub fn ids(&self) -> Vec<String> {
        self.inner.read().records.keys().cloned().collect()
    }
}

fn write_schema(dir: &Path, schema: &VectorSchema) -> Result<()> {
    let raw = serde_json::to_vec_pretty(schema).map_err(|e| Error::Corrupt(e.to_string()))?;
    fs::write(dir.join(SCHEMA_FILE), raw)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterOp, FilterValue};
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn record(id: &str, embedding: Vec<f32>, secs: i64) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            embedding,
            content: format!("content of {id}"),
            timestamp: ts(secs),
            metadata: Metadata::default(),
        }
    }

    #[test]
    fn upsert_and_query_nearest() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(dir.path(), 3).unwrap();
        idx.upsert(record("a", vec![1.0, 0.0, 0.0], 0)).unwrap();
        idx.upsert(record("b", vec![0.0, 1.0, 0.0], 0)).unwrap();
        idx.upsert(record("c", vec![0.9, 0.1, 0.0], 0)).unwrap();

        let hits = idx.query(&[1.0, 0.0, 0.0], None, 2).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "a");
        assert!(hits[0].1 < hits[1].1);
    }

    #[test]
    fn dimension_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(dir.path(), 3).unwrap();
        assert!(matches!(
            idx.upsert(record("a", vec![1.0, 0.0], 0)),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            idx.query(&[1.0, 0.0], None, 5),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn upsert_replaces_record() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(dir.path(), 2).unwrap();
        idx.upsert(record("a", vec![1.0, 0.0], 0)).unwrap();
        idx.upsert(record("a", vec![0.0, 1.0], 5)).unwrap();
        assert_eq!(idx.len(), 1);
        let stored = idx.get("a").unwrap();
        assert_eq!(stored.embedding, vec![0.0, 1.0]);
        assert_eq!(stored.timestamp, ts(5));
    }

    #[test]
    fn batch_length_mismatch_ingests_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(dir.path(), 2).unwrap();
        let columns = VectorColumns {
            ids: vec!["a".into(), "b".into(), "c".into()],
            embeddings: vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![1.0, 1.0]],
            contents: vec!["x".into(), "y".into(), "z".into()],
            timestamps: vec![ts(1), ts(2)],
            metadata: None,
        };
        assert!(matches!(
            idx.upsert_batch(columns),
            Err(Error::Validation(_))
        ));
        assert_eq!(idx.len(), 0);
    }

    #[test]
    fn batch_explicit_metadata_replaces_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(dir.path(), 2).unwrap();
        let meta = Metadata {
            category: "billing".into(),
            ..Metadata::default()
        };
        let columns = VectorColumns {
            ids: vec!["a".into()],
            embeddings: vec![vec![1.0, 0.0]],
            contents: vec!["x".into()],
            timestamps: vec![ts(1)],
            metadata: Some(vec![meta.clone()]),
        };
        idx.upsert_batch(columns).unwrap();
        assert_eq!(idx.get("a").unwrap().metadata, meta);
    }

    #[test]
    fn filtered_query_excludes_non_matching() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(dir.path(), 2).unwrap();
        idx.upsert(record("early", vec![1.0, 0.0], 10)).unwrap();
        idx.upsert(record("late", vec![1.0, 0.0], 100)).unwrap();

        let filter = MetadataFilter::new()
            .and("timestamp", FilterOp::Lte, FilterValue::Timestamp(ts(50)));
        let hits = idx.query(&[1.0, 0.0], Some(&filter), 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "early");
    }

    #[test]
    fn get_by_filter_preserves_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(dir.path(), 2).unwrap();
        idx.upsert(record("first", vec![1.0, 0.0], 1)).unwrap();
        idx.upsert(record("second", vec![0.0, 1.0], 2)).unwrap();
        idx.upsert(record("third", vec![1.0, 1.0], 3)).unwrap();

        let ids: Vec<String> = idx
            .get_by_filter(None)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn remove_record() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(dir.path(), 2).unwrap();
        idx.upsert(record("a", vec![1.0, 0.0], 0)).unwrap();
        assert!(idx.remove("a").unwrap());
        assert!(!idx.remove("a").unwrap());
        assert!(idx.get("a").is_none());
        assert!(idx.get_by_filter(None).is_empty());
    }

    #[test]
    fn reopen_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        {
            let idx = VectorIndex::open(dir.path(), 2).unwrap();
            idx.upsert(record("a", vec![1.0, 0.0], 7)).unwrap();
        }
        let idx = VectorIndex::open(dir.path(), 2).unwrap();
        assert_eq!(idx.len(), 1);
        assert_eq!(idx.get("a").unwrap().timestamp, ts(7));
    }

    #[test]
    fn dimension_change_rebuilds_empty() {
        let dir = tempfile::tempdir().unwrap();
        {
            let idx = VectorIndex::open(dir.path(), 2).unwrap();
            idx.upsert(record("a", vec![1.0, 0.0], 0)).unwrap();
        }
        let idx = VectorIndex::open(dir.path(), 4).unwrap();
        assert_eq!(idx.len(), 0);
        assert_eq!(idx.dimension(), 4);
    }

    #[test]
    fn empty_index_queries_empty() {
        let dir = tempfile::tempdir().unwrap();
        let idx = VectorIndex::open(dir.path(), 2).unwrap();
        assert!(idx.query(&[1.0, 0.0], None, 5).unwrap().is_empty());
        assert!(idx.get_by_filter(None).is_empty());
    }
}
