//! Document store: the single ingestion entry point.
//!
//! For each document the coordinator obtains an embedding (batched where
//! possible, retried per the policy), then writes to the lexical and vector
//! indexes. The two stores commit independently: there is no cross-index
//! transaction. If one half fails after retries, the other is NOT rolled
//! back and the document reports a partial-ingestion failure. The resulting
//! inconsistency window is a deliberate, bounded tradeoff: the next upsert of
//! the same id repairs it, and [`reconcile`](DocumentStore::reconcile)
//! detects and repairs ids present in only one index.

use crate::document::{Document, DocumentColumns};
use crate::error::{Error, Result};
use crate::lexical::LexicalIndex;
use crate::provider::{
    embed_batch_with_retry, embed_with_retry, EmbeddingProvider, RetryPolicy,
};
use crate::vector::{VectorIndex, VectorRecord};
use std::collections::HashSet;
use std::sync::Arc;

/// Per-document outcome of a batch ingestion.
#[derive(Debug)]
pub struct IngestResult {
    /// Document id this outcome refers to.
    pub id: String,
    /// Success, or the failure that stopped this document. Other documents in
    /// the batch are unaffected.
    pub outcome: Result<()>,
}

/// Summary of a reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Ids that were present in the lexical index only.
    pub missing_from_vector: Vec<String>,
    /// Ids that were present in the vector index only.
    pub missing_from_lexical: Vec<String>,
    /// How many of the above were successfully repaired.
    pub repaired: usize,
}

/// Ingestion coordinator fanning out to both indexes.
pub struct DocumentStore {
    lexical: Arc<LexicalIndex>,
    vector: Arc<VectorIndex>,
    provider: Arc<dyn EmbeddingProvider>,
    retry: RetryPolicy,
}

impl DocumentStore {
    /// Creates a store over the two indexes and an embedding provider.
    pub fn new(
        lexical: Arc<LexicalIndex>,
        vector: Arc<VectorIndex>,
        provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            lexical,
            vector,
            provider,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides the provider retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ingests a single document into both indexes.
    pub async fn add(&self, doc: &Document) -> Result<()> {
        let embedding = embed_with_retry(self.provider.as_ref(), &self.retry, &doc.content)
            .await
            .map_err(Error::Provider)?;
        self.write_both(doc, embedding)
    }

    /// Ingests a batch, returning one outcome per document.
    ///
    /// Embeddings are requested as a single batch call first; if that fails
    /// (for example one malformed document poisons the batch), ingestion
    /// falls back to per-document embedding so every document still gets an
    /// individual outcome. A failure never stops the rest of the batch.
    pub async fn add_batch(&self, docs: &[Document]) -> Vec<IngestResult> {
        let texts: Vec<&str> = docs.iter().map(|d| d.content.as_str()).collect();
        let batch = embed_batch_with_retry(self.provider.as_ref(), &self.retry, &texts).await;

        match batch {
            Ok(embeddings) if embeddings.len() == docs.len() => docs
                .iter()
                .zip(embeddings)
                .map(|(doc, embedding)| IngestResult {
                    id: doc.id.clone(),
                    outcome: self.write_both(doc, embedding),
                })
                .collect(),
            _ => {
                let mut results = Vec::with_capacity(docs.len());
                for doc in docs {
                    results.push(IngestResult {
                        id: doc.id.clone(),
                        outcome: self.add(doc).await,
                    });
                }
                results
            }
        }
    }

    /// Validates and ingests a column-oriented batch. A validation failure
    /// (mismatched column lengths, empty id, oversized batch) ingests
    /// nothing from the call.
    pub async fn add_columns(&self, columns: DocumentColumns) -> Result<Vec<IngestResult>> {
        let docs = columns.into_documents()?;
        Ok(self.add_batch(&docs).await)
    }

    /// Removes a document from both indexes. Returns whether it existed in
    /// either.
    pub fn remove(&self, id: &str) -> Result<bool> {
        let lexical = self.lexical.remove(id)?;
        let vector = self.vector.remove(id)?;
        Ok(lexical || vector)
    }

    /// Detects ids present in one index but not the other and repairs them:
    /// lexical-only documents are re-embedded into the vector store,
    /// vector-only snapshots are re-indexed into the lexical store.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let lexical_ids: HashSet<String> = self.lexical.ids().into_iter().collect();
        let vector_ids: HashSet<String> = self.vector.ids().into_iter().collect();

        let mut report = ReconcileReport {
            missing_from_vector: lexical_ids.difference(&vector_ids).cloned().collect(),
            missing_from_lexical: vector_ids.difference(&lexical_ids).cloned().collect(),
            ..ReconcileReport::default()
        };

        for id in &report.missing_from_vector {
            let Some(stored) = self.lexical.get(id) else {
                continue;
            };
            let embedding =
                embed_with_retry(self.provider.as_ref(), &self.retry, &stored.content)
                    .await
                    .map_err(Error::Provider)?;
            self.vector.upsert(VectorRecord {
                id: stored.id,
                embedding,
                content: stored.content,
                timestamp: stored.timestamp,
                metadata: stored.metadata,
            })?;
            report.repaired += 1;
        }

        for id in &report.missing_from_lexical {
            let Some(record) = self.vector.get(id) else {
                continue;
            };
            self.lexical.upsert(&Document {
                id: record.id,
                content: record.content,
                timestamp: record.timestamp,
                metadata: record.metadata,
            })?;
            report.repaired += 1;
        }

        if report.repaired > 0 {
            tracing::info!(
                repaired = report.repaired,
                lexical_only = report.missing_from_vector.len(),
                vector_only = report.missing_from_lexical.len(),
                "reconciled index divergence"
            );
        }
        Ok(report)
    }

    /// Live document counts as (lexical, vector). Equal counts are expected
    /// outside the bounded inconsistency window.
    pub fn counts(&self) -> (usize, usize) {
        (self.lexical.len(), self.vector.len())
    }

    fn write_both(&self, doc: &Document, embedding: Vec<f32>) -> Result<()> {
        let lexical = self.lexical.upsert(doc);
        let vector = self.vector.upsert(VectorRecord {
            id: doc.id.clone(),
            embedding,
            content: doc.content.clone(),
            timestamp: doc.timestamp,
            metadata: doc.metadata.clone(),
        });
        match (lexical, vector) {
            (Ok(()), Ok(())) => Ok(()),
            (lexical, vector) => {
                let error = Error::PartialIngestion {
                    id: doc.id.clone(),
                    lexical: lexical.err().map(|e| e.to_string()),
                    vector: vector.err().map(|e| e.to_string()),
                };
                tracing::warn!(id = %doc.id, %error, "ingestion committed to one index only");
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::HashEmbedding;
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn store(dir: &std::path::Path) -> DocumentStore {
        let lexical = Arc::new(LexicalIndex::open(dir.join("lexical")).unwrap());
        let vector = Arc::new(VectorIndex::open(dir.join("vector"), 64).unwrap());
        DocumentStore::new(lexical, vector, Arc::new(HashEmbedding::new(64)))
    }

    #[tokio::test]
    async fn add_writes_both_indexes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .add(&Document::new("a", "gateway timeout", ts(1)))
            .await
            .unwrap();
        assert_eq!(store.counts(), (1, 1));
    }

    #[tokio::test]
    async fn add_batch_reports_per_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let docs = vec![
            Document::new("a", "first report", ts(1)),
            Document::new("b", "second report", ts(2)),
        ];
        let results = store.add_batch(&docs).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.outcome.is_ok()));
        assert_eq!(store.counts(), (2, 2));
    }

    #[tokio::test]
    async fn batch_continues_past_fatal_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        // empty content is a fatal provider error for that document only
        let docs = vec![
            Document::new("good", "valid content", ts(1)),
            Document::new("bad", "", ts(2)),
            Document::new("also-good", "more valid content", ts(3)),
        ];
        let results = store.add_batch(&docs).await;
        assert!(results[0].outcome.is_ok());
        assert!(matches!(results[1].outcome, Err(Error::Provider(_))));
        assert!(results[2].outcome.is_ok());
        assert_eq!(store.counts(), (2, 2));
    }

    #[tokio::test]
    async fn column_validation_ingests_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let columns = DocumentColumns {
            ids: vec!["1".into(), "2".into(), "3".into()],
            contents: vec!["a".into(), "b".into(), "c".into()],
            timestamps: vec![ts(1), ts(2)],
            metadata: None,
        };
        assert!(matches!(
            store.add_columns(columns).await,
            Err(Error::Validation(_))
        ));
        assert_eq!(store.counts(), (0, 0));
    }

    #[tokio::test]
    async fn remove_clears_both() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .add(&Document::new("a", "to remove", ts(1)))
            .await
            .unwrap();
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.counts(), (0, 0));
    }

    #[tokio::test]
    async fn reconcile_repairs_missing_vector_half() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .add(&Document::new("a", "diverged document", ts(1)))
            .await
            .unwrap();
        // simulate a lost vector half
        store.vector.remove("a").unwrap();
        assert_eq!(store.counts(), (1, 0));

        let report = store.reconcile().await.unwrap();
        assert_eq!(report.missing_from_vector, vec!["a".to_string()]);
        assert!(report.missing_from_lexical.is_empty());
        assert_eq!(report.repaired, 1);
        assert_eq!(store.counts(), (1, 1));
    }

    #[tokio::test]
    async fn reconcile_repairs_missing_lexical_half() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .add(&Document::new("a", "diverged document", ts(1)))
            .await
            .unwrap();
        store.lexical.remove("a").unwrap();
        assert_eq!(store.counts(), (0, 1));

        let report = store.reconcile().await.unwrap();
        assert_eq!(report.missing_from_lexical, vec!["a".to_string()]);
        assert_eq!(report.repaired, 1);
        assert_eq!(store.counts(), (1, 1));
        assert_eq!(
            store.lexical.get("a").unwrap().content,
            "diverged document"
        );
    }

    #[tokio::test]
    async fn reconcile_on_consistent_store_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        store
            .add(&Document::new("a", "stable", ts(1)))
            .await
            .unwrap();
        let report = store.reconcile().await.unwrap();
        assert!(report.missing_from_vector.is_empty());
        assert!(report.missing_from_lexical.is_empty());
        assert_eq!(report.repaired, 0);
    }
}
