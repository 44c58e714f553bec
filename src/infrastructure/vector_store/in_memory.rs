//! In-memory vector store

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Instant;

use async_trait::async_trait;

use crate::domain::embedding::cosine_similarity;
use crate::domain::vector::{
    BatchInsertResult, ReferenceVector, SimilarityMatch, VectorSearchParams, VectorStore,
    VectorStoreStats,
};
use crate::domain::{DomainError, RequestContext};

/// Linear-scan store for development, tests and small corpora
#[derive(Debug)]
pub struct InMemoryVectorStore {
    vectors: RwLock<Vec<ReferenceVector>>,
    next_id: AtomicI64,
    searches: AtomicU64,
    search_micros: AtomicU64,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            vectors: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
            searches: AtomicU64::new(0),
            search_micros: AtomicU64::new(0),
        }
    }

    /// Store pre-populated with `vectors`, duplicates dropped
    pub fn with_vectors(vectors: Vec<ReferenceVector>) -> Self {
        let store = Self::new();

        if let Ok(mut guard) = store.vectors.write() {
            for vector in vectors {
                store.push_unique(&mut guard, vector);
            }
        }

        store
    }

    pub fn len(&self) -> usize {
        self.vectors.read().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push_unique(&self, vectors: &mut Vec<ReferenceVector>, vector: ReferenceVector) -> Option<i64> {
        if vectors.iter().any(|v| v.text_hash() == vector.text_hash()) {
            return None;
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        vectors.push(vector.with_id(id));
        Some(id)
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn find_similar(
        &self,
        ctx: &RequestContext,
        embedding: &[f32],
        params: VectorSearchParams,
    ) -> Result<Vec<SimilarityMatch>, DomainError> {
        if ctx.is_cancelled() {
            return Err(DomainError::cancelled("vector search cancelled"));
        }

        let started = Instant::now();
        let vectors = self.vectors.read().map_err(|e| {
            DomainError::internal(format!("Failed to acquire read lock: {}", e))
        })?;

        let mut matches: Vec<SimilarityMatch> = vectors
            .iter()
            .filter_map(|vector| {
                let similarity = cosine_similarity(embedding, vector.embedding());
                (similarity >= params.min_similarity)
                    .then(|| SimilarityMatch::new(vector.clone(), similarity))
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity()
                .partial_cmp(&a.similarity())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(params.limit);

        self.searches.fetch_add(1, Ordering::Relaxed);
        self.search_micros
            .fetch_add(started.elapsed().as_micros() as u64, Ordering::Relaxed);

        Ok(matches)
    }

    async fn insert(&self, vector: ReferenceVector) -> Result<bool, DomainError> {
        let mut vectors = self.vectors.write().map_err(|e| {
            DomainError::internal(format!("Failed to acquire write lock: {}", e))
        })?;

        Ok(self.push_unique(&mut vectors, vector).is_some())
    }

    async fn insert_batch(
        &self,
        batch: Vec<ReferenceVector>,
    ) -> Result<BatchInsertResult, DomainError> {
        let mut vectors = self.vectors.write().map_err(|e| {
            DomainError::internal(format!("Failed to acquire write lock: {}", e))
        })?;

        let mut result = BatchInsertResult::default();
        for vector in batch {
            result.record(self.push_unique(&mut vectors, vector));
        }

        Ok(result)
    }

    async fn malicious_vectors(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ReferenceVector>, DomainError> {
        let vectors = self.vectors.read().map_err(|e| {
            DomainError::internal(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(vectors
            .iter()
            .filter(|v| v.label().is_malicious())
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_index(&self) -> Result<bool, DomainError> {
        Ok(false)
    }

    async fn stats(&self) -> Result<VectorStoreStats, DomainError> {
        let vectors = self.vectors.read().map_err(|e| {
            DomainError::internal(format!("Failed to acquire read lock: {}", e))
        })?;

        let malicious = vectors.iter().filter(|v| v.label().is_malicious()).count() as u64;
        let total = vectors.len() as u64;

        let searches = self.searches.load(Ordering::Relaxed);
        let avg_search_time_ms = match searches {
            0 => 0.0,
            n => self.search_micros.load(Ordering::Relaxed) as f64 / n as f64 / 1000.0,
        };

        Ok(VectorStoreStats {
            total,
            malicious,
            safe: total - malicious,
            searches,
            avg_search_time_ms,
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
