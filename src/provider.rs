//! Embedding-provider boundary.
//!
//! The engine never talks to an embedding service directly; it consumes the
//! [`EmbeddingProvider`] trait, passed in explicitly at construction time.
//! Provider calls are the only operations expected to block on external I/O.
//! Transient failures (rate limit, timeout, connection) are retried with
//! bounded exponential backoff; fatal failures (malformed input, auth)
//! surface immediately. The backoff sleeps run on tokio, so a caller-imposed
//! timeout cancels pending retries without touching committed index state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::config;

/// Typed failure from an embedding provider.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// Rate limit, timeout, or connection failure. Worth retrying.
    #[error("transient embedding failure: {0}")]
    Transient(String),
    /// Malformed input or authentication failure. Never retried.
    #[error("fatal embedding failure: {0}")]
    Fatal(String),
}

impl ProviderError {
    /// Whether the retry policy applies to this error.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }
}

/// Converts text into fixed-length vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Embeds a batch of texts. The default loops over [`embed`](Self::embed).
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimension of the produced vectors.
    fn dimension(&self) -> usize;
}

/// Bounded exponential backoff around provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retries after the initial attempt.
    pub max_retries: u32,
    /// Base delay in milliseconds; doubles per attempt.
    pub backoff_base_ms: u64,
    /// Cap on the delay in milliseconds.
    pub backoff_max_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: config::EMBED_MAX_RETRIES,
            backoff_base_ms: config::EMBED_BACKOFF_BASE_MS,
            backoff_max_ms: config::EMBED_BACKOFF_MAX_MS,
        }
    }
}

impl RetryPolicy {
    fn delay_ms(&self, attempt: u32) -> u64 {
        self.backoff_base_ms
            .saturating_mul(2u64.saturating_pow(attempt))
            .min(self.backoff_max_ms)
    }
}

/// Embeds `text`, retrying transient failures per `policy`.
pub async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    policy: &RetryPolicy,
    text: &str,
) -> Result<Vec<f32>, ProviderError> {
    let mut attempt = 0u32;
    loop {
        match provider.embed(text).await {
            Ok(embedding) => return Ok(embedding),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_ms(attempt);
                tracing::warn!(attempt, delay_ms = delay, error = %e, "retrying embedding call");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Embeds a batch, retrying transient failures per `policy`.
pub async fn embed_batch_with_retry(
    provider: &dyn EmbeddingProvider,
    policy: &RetryPolicy,
    texts: &[&str],
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let mut attempt = 0u32;
    loop {
        match provider.embed_batch(texts).await {
            Ok(embeddings) => return Ok(embeddings),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                let delay = policy.delay_ms(attempt);
                tracing::warn!(attempt, delay_ms = delay, error = %e, "retrying batch embedding call");
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Deterministic bag-of-words hashing embedder for tests and offline use.
///
/// Each token is hashed to three positions of a fixed-size vector with
/// decaying term-frequency weights; the result is L2-normalized. No external
/// service, fully deterministic. Empty text is a fatal (malformed-input)
/// error.
pub struct HashEmbedding {
    dimension: usize,
}

impl HashEmbedding {
    /// Creates a provider producing vectors of the given dimension.
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashEmbedding {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        if text.is_empty() {
            return Err(ProviderError::Fatal("cannot embed empty text".into()));
        }
        let mut vector = vec![0.0f32; self.dimension];

        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let total = words.len() as f32;
        if total == 0.0 {
            return Ok(vector);
        }

        let mut frequencies: HashMap<&str, f32> = HashMap::new();
        for word in &words {
            *frequencies.entry(word).or_insert(0.0) += 1.0;
        }
        for (word, count) in &frequencies {
            let tf = count / total;
            let h1 = fnv1a(word.as_bytes()) as usize;
            let h2 = fnv1a(&[word.as_bytes(), &[1u8]].concat()) as usize;
            let h3 = fnv1a(&[word.as_bytes(), &[2u8]].concat()) as usize;
            vector[h1 % self.dimension] += tf;
            vector[h2 % self.dimension] += tf * 0.7;
            vector[h3 % self.dimension] += tf * 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// FNV-1a hash.
fn fnv1a(data: &[u8]) -> u32 {
    let mut hash: u32 = 2166136261;
    for &byte in data {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}
