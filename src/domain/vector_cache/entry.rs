//! Cached detection records and lookup types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::vector::{Label, SimilarityMatch};

/// A previously confirmed detection keyed by the embedding that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedVector {
    id: i64,
    text: String,
    label_text: String,
    label: Label,
    embedding: Vec<f32>,
    similarity: f32,
    cached_at: DateTime<Utc>,
    #[serde(default)]
    ttl_secs: u64,
}

impl CachedVector {
    pub fn new(
        id: i64,
        text: impl Into<String>,
        label_text: impl Into<String>,
        label: Label,
        embedding: Vec<f32>,
        similarity: f32,
    ) -> Self {
        Self {
            id,
            text: text.into(),
            label_text: label_text.into(),
            label,
            embedding,
            similarity,
            cached_at: Utc::now(),
            ttl_secs: 0,
        }
    }

    /// Record for a store match, keyed by the query embedding
    pub fn from_match(found: &SimilarityMatch, query_embedding: &[f32]) -> Self {
        let vector = found.vector();

        Self::new(
            vector.id(),
            vector.text(),
            vector.label_text(),
            vector.label(),
            query_embedding.to_vec(),
            found.similarity(),
        )
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn label_text(&self) -> &str {
        &self.label_text
    }

    pub fn label(&self) -> Label {
        self.label
    }

    pub fn embedding(&self) -> &[f32] {
        &self.embedding
    }

    pub fn similarity(&self) -> f32 {
        self.similarity
    }

    pub fn cached_at(&self) -> DateTime<Utc> {
        self.cached_at
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }
}

/// Parameters for a cache lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSearchParams {
    pub min_similarity: f32,
    pub max_results: usize,
}

impl CacheSearchParams {
    pub fn new(min_similarity: f32) -> Self {
        Self {
            min_similarity: min_similarity.clamp(0.0, 1.0),
            max_results: 1,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }
}

/// Result of a cache lookup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheLookup {
    pub hit: bool,
    pub vector: Option<CachedVector>,
}

impl CacheLookup {
    pub fn hit(vector: CachedVector) -> Self {
        Self {
            hit: true,
            vector: Some(vector),
        }
    }

    pub fn miss() -> Self {
        Self::default()
    }

    /// The cached record, only when the lookup really hit
    pub fn into_hit(self) -> Option<CachedVector> {
        if self.hit { self.vector } else { None }
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

impl VectorCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Short stable fingerprint of an embedding.
///
/// Components are quantized to three decimals so vectors that differ only by
/// float noise map to the same key.
pub fn embedding_fingerprint(embedding: &[f32]) -> String {
    let mut hasher = Sha256::new();

    for value in embedding {
        hasher.update(format!("{:.3},", value).as_bytes());
    }

    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}
