//! Durable vector store trait

use async_trait::async_trait;

use super::{BatchInsertResult, ReferenceVector, SimilarityMatch, VectorSearchParams, VectorStoreStats};
use crate::domain::{DomainError, RequestContext};

#[cfg(test)]
use mockall::automock;

/// Authoritative similarity search over the labelled corpus
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Matches at or above `min_similarity`, best first, at most `limit`
    async fn find_similar(
        &self,
        ctx: &RequestContext,
        embedding: &[f32],
        params: VectorSearchParams,
    ) -> Result<Vec<SimilarityMatch>, DomainError>;

    /// Insert a single vector. Returns false when its text hash already exists.
    async fn insert(&self, vector: ReferenceVector) -> Result<bool, DomainError>;

    /// Insert many vectors, skipping duplicates
    async fn insert_batch(
        &self,
        vectors: Vec<ReferenceVector>,
    ) -> Result<BatchInsertResult, DomainError>;

    /// Malicious vectors ordered by id, for re-warming the cache
    async fn malicious_vectors(
        &self,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ReferenceVector>, DomainError>;

    /// Build the backend's similarity index, if it has one. Returns false
    /// when nothing was built.
    async fn create_index(&self) -> Result<bool, DomainError>;

    async fn stats(&self) -> Result<VectorStoreStats, DomainError>;

    /// Backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}
