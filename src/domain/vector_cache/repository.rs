//! Vector cache trait

use async_trait::async_trait;

use super::{CacheLookup, CacheSearchParams, CachedVector, VectorCacheStats};
use crate::domain::{DomainError, RequestContext};

#[cfg(test)]
use mockall::automock;

/// Fast lookup of confirmed detections
#[cfg_attr(test, automock)]
#[async_trait]
pub trait VectorCache: Send + Sync {
    /// Look for a cached record close to `embedding`
    async fn search_similar(
        &self,
        ctx: &RequestContext,
        embedding: &[f32],
        params: CacheSearchParams,
    ) -> Result<CacheLookup, DomainError>;

    /// Store a record keyed by `embedding`
    async fn store(
        &self,
        ctx: &RequestContext,
        embedding: &[f32],
        vector: CachedVector,
    ) -> Result<(), DomainError>;

    async fn stats(&self) -> Result<VectorCacheStats, DomainError>;

    /// Remove every entry
    async fn clear(&self) -> Result<(), DomainError>;

    /// Backend name for logs and health output
    fn backend_name(&self) -> &'static str;
}
