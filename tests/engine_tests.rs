//! End-to-end tests driving ingestion and hybrid search through the public
//! API, on real on-disk indexes.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use fusedb::{
    DateRange, Document, DocumentColumns, DocumentStore, EmbeddingProvider, Error, HashEmbedding,
    LexicalIndex, Provenance, ProviderError, SearchEngine, SearchRequest, VectorIndex,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn setup(dir: &Path) -> (DocumentStore, SearchEngine) {
    setup_with(dir, Arc::new(HashEmbedding::new(64)))
}

fn setup_with(dir: &Path, provider: Arc<dyn EmbeddingProvider>) -> (DocumentStore, SearchEngine) {
    let lexical = Arc::new(LexicalIndex::open(dir.join("lexical")).unwrap());
    let vector = Arc::new(VectorIndex::open(dir.join("vector"), provider.dimension()).unwrap());
    let store = DocumentStore::new(lexical.clone(), vector.clone(), provider.clone());
    let engine = SearchEngine::new(lexical, vector, provider);
    (store, engine)
}

/// Maps exact texts to fixed vectors, for tests that need exact distances.
struct FixedProvider {
    vectors: HashMap<String, Vec<f32>>,
    dimension: usize,
}

#[async_trait]
impl EmbeddingProvider for FixedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| ProviderError::Fatal(format!("no fixture vector for '{text}'")))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[tokio::test]
async fn end_to_end_three_documents() {
    let dir = tempfile::tempdir().unwrap();
    let (store, engine) = setup(dir.path());

    store
        .add(&Document::new(
            "1",
            "Python is a high-level programming language.",
            date(2023, 1, 1),
        ))
        .await
        .unwrap();
    store
        .add(&Document::new(
            "2",
            "Machine learning is a subset of artificial intelligence.",
            date(2023, 4, 15),
        ))
        .await
        .unwrap();
    store
        .add(&Document::new(
            "3",
            "Natural language processing deals with the interaction between computers and humans using natural language.",
            date(2023, 3, 1),
        ))
        .await
        .unwrap();

    let hits = engine
        .search(&SearchRequest {
            query: Some("programming languages".into()),
            date_range: Some(DateRange::new(date(2023, 1, 1), date(2023, 3, 1)).unwrap()),
            top_k: 5,
            ..SearchRequest::default()
        })
        .await
        .unwrap();

    assert!(!hits.is_empty());
    assert_eq!(hits[0].id, "1", "the programming-language document ranks first");
    assert!(
        hits.iter().all(|h| h.id != "2"),
        "document outside the date range is excluded regardless of score"
    );
    for hit in &hits {
        assert!(!hit.content.is_empty());
    }
}

#[tokio::test]
async fn upsert_idempotence() {
    let dir = tempfile::tempdir().unwrap();
    let (store, engine) = setup(dir.path());
    let doc = Document::new("1", "payment gateway timeout during checkout", ts(100));

    store.add(&doc).await.unwrap();
    let first: Vec<String> = engine
        .search(&SearchRequest {
            query: Some("payment gateway".into()),
            ..SearchRequest::default()
        })
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.id)
        .collect();

    store.add(&doc).await.unwrap();
    assert_eq!(store.counts(), (1, 1), "index sizes unchanged");
    let second: Vec<String> = engine
        .search(&SearchRequest {
            query: Some("payment gateway".into()),
            ..SearchRequest::default()
        })
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.id)
        .collect();
    assert_eq!(first, second, "query results unchanged");
}

#[tokio::test]
async fn upsert_replacement_evicts_old_content() {
    let dir = tempfile::tempdir().unwrap();
    let (store, engine) = setup(dir.path());

    store
        .add(&Document::new("1", "kafka consumer lag spiking", ts(10)))
        .await
        .unwrap();
    store
        .add(&Document::new("1", "redis eviction storm in cache tier", ts(10)))
        .await
        .unwrap();
    assert_eq!(store.counts(), (1, 1));

    let stale = engine
        .search(&SearchRequest {
            query: Some("kafka consumer lag".into()),
            ..SearchRequest::default()
        })
        .await
        .unwrap();
    assert!(
        stale.iter().all(|h| h.content.contains("redis")),
        "no stale content surfaces for the old terms"
    );

    let fresh = engine
        .search(&SearchRequest {
            query: Some("redis eviction storm".into()),
            ..SearchRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(fresh[0].id, "1");
    assert!(fresh[0].content.contains("redis"));
}

#[tokio::test]
async fn duplicate_survivor_fused_once_with_both_provenance() {
    let dir = tempfile::tempdir().unwrap();
    let (store, engine) = setup(dir.path());

    store
        .add(&Document::new(
            "a",
            "rust retrieval engine rust retrieval",
            ts(1),
        ))
        .await
        .unwrap();
    store
        .add(&Document::new("b", "cooking pasta recipes tonight", ts(2)))
        .await
        .unwrap();

    // distance threshold 2.0 keeps every vector hit, so "a" survives on both sides
    let hits = engine
        .search(&SearchRequest {
            query: Some("rust retrieval engine".into()),
            vector_distance_threshold: 2.0,
            ..SearchRequest::default()
        })
        .await
        .unwrap();

    let occurrences = hits.iter().filter(|h| h.id == "a").count();
    assert_eq!(occurrences, 1, "deduplicated to a single entry");
    let hit = hits.iter().find(|h| h.id == "a").unwrap();
    assert_eq!(hit.provenance, Provenance::Both);
    assert!(hit.lexical_score.is_some());
    assert!(hit.vector_distance.is_some());
}

#[tokio::test]
async fn vector_threshold_boundary_is_inclusive() {
    let dir = tempfile::tempdir().unwrap();
    let mut vectors = HashMap::new();
    vectors.insert("q".to_string(), vec![1.0, 0.0]);
    vectors.insert("exact match".to_string(), vec![1.0, 0.0]);
    vectors.insert("orthogonal text".to_string(), vec![0.0, 1.0]);
    let provider = Arc::new(FixedProvider {
        vectors,
        dimension: 2,
    });
    let (store, engine) = setup_with(dir.path(), provider);

    store
        .add(&Document::new("near", "exact match", ts(1)))
        .await
        .unwrap();
    store
        .add(&Document::new("far", "orthogonal text", ts(2)))
        .await
        .unwrap();

    // "far" sits at cosine distance exactly 1.0 from the query
    let at_threshold = engine
        .search(&SearchRequest {
            query: Some("q".into()),
            vector_distance_threshold: 1.0,
            ..SearchRequest::default()
        })
        .await
        .unwrap();
    let ids: Vec<&str> = at_threshold.iter().map(|h| h.id.as_str()).collect();
    assert!(ids.contains(&"near"));
    assert!(ids.contains(&"far"), "hit at exactly the threshold is included");

    let below_threshold = engine
        .search(&SearchRequest {
            query: Some("q".into()),
            vector_distance_threshold: 0.999,
            ..SearchRequest::default()
        })
        .await
        .unwrap();
    let ids: Vec<&str> = below_threshold.iter().map(|h| h.id.as_str()).collect();
    assert!(ids.contains(&"near"));
    assert!(!ids.contains(&"far"), "hit above the threshold is excluded");
}

#[tokio::test]
async fn date_filtering_matches_window_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let (store, engine) = setup(dir.path());

    for (id, secs) in [("early", 10), ("middle", 20), ("late", 30)] {
        store
            .add(&Document::new(id, format!("entry at {secs}"), ts(secs)))
            .await
            .unwrap();
    }

    // browse (no query): the vector side serves the window
    let windowed = engine
        .search(&SearchRequest {
            date_range: Some(DateRange::new(ts(10), ts(20)).unwrap()),
            top_k: 10,
            ..SearchRequest::default()
        })
        .await
        .unwrap();
    let ids: Vec<&str> = windowed.iter().map(|h| h.id.as_str()).collect();
    assert!(ids.contains(&"early"));
    assert!(ids.contains(&"middle"));
    assert!(!ids.contains(&"late"));

    let instant = engine
        .search(&SearchRequest {
            date_range: Some(DateRange::new(ts(20), ts(20)).unwrap()),
            top_k: 10,
            ..SearchRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(instant.len(), 1);
    assert_eq!(instant[0].id, "middle");
}

#[tokio::test]
async fn inverted_date_range_fails_fast() {
    assert!(matches!(
        DateRange::new(ts(20), ts(10)),
        Err(Error::Validation(_))
    ));
}

#[tokio::test]
async fn batch_with_mismatched_columns_ingests_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _engine) = setup(dir.path());

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
async fn reopened_indexes_serve_queries() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (store, _engine) = setup(dir.path());
        store
            .add(&Document::new("a", "durable hybrid search entry", ts(5)))
            .await
            .unwrap();
    }

    let (store, engine) = setup(dir.path());
    assert_eq!(store.counts(), (1, 1));
    let hits = engine
        .search(&SearchRequest {
            query: Some("durable hybrid search".into()),
            ..SearchRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(hits[0].id, "a");
    assert_eq!(hits[0].timestamp, ts(5));
}

#[tokio::test]
async fn rerank_prefers_exact_textual_match_at_alpha_zero() {
    let dir = tempfile::tempdir().unwrap();
    let (store, engine) = setup(dir.path());

    store
        .add(&Document::new("exact", "payment gateway timeout", ts(1)))
        .await
        .unwrap();
    store
        .add(&Document::new(
            "verbose",
            "payment gateway timeout with retries exhausted and gateway restarted",
            ts(2),
        ))
        .await
        .unwrap();

    let hits = engine
        .search(&SearchRequest {
            query: Some("payment gateway timeout".into()),
            lexical_percentile: 0.0,
            vector_distance_threshold: 2.0,
            alpha: 0.0,
            rerank: true,
            ..SearchRequest::default()
        })
        .await
        .unwrap();

    assert_eq!(hits[0].id, "exact");
    let top = hits[0].score.unwrap();
    assert!((top - 1.0).abs() < 1e-6, "identical text scores 1.0 at alpha 0");
    assert!(hits.iter().all(|h| h.score.is_some()));
}

#[tokio::test]
async fn batch_ingestion_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let (store, engine) = setup(dir.path());

    let columns = DocumentColumns {
        ids: vec!["1".into(), "2".into()],
        contents: vec![
            "database connection pool exhausted".into(),
            "certificate expired on edge proxy".into(),
        ],
        timestamps: vec![ts(1), ts(2)],
        metadata: None,
    };
    let results = store.add_columns(columns).await.unwrap();
    assert!(results.iter().all(|r| r.outcome.is_ok()));

    let hits = engine
        .search(&SearchRequest {
            query: Some("connection pool exhausted".into()),
            ..SearchRequest::default()
        })
        .await
        .unwrap();
    assert_eq!(hits[0].id, "1");
}
