//! Redis-backed vector cache

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use tracing::warn;

use super::cache_key;
use crate::domain::vector_cache::{
    CacheLookup, CacheSearchParams, CachedVector, VectorCache, VectorCacheStats,
};
use crate::domain::{DomainError, RequestContext};

/// Configuration for the Redis vector cache
#[derive(Debug, Clone)]
pub struct RedisVectorCacheConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Expiry applied to every stored record
    pub ttl: Duration,
    /// Namespace prefix for keys
    pub key_prefix: String,
}

impl Default for RedisVectorCacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            ttl: Duration::from_secs(3600),
            key_prefix: "sentinel".to_string(),
        }
    }
}

impl RedisVectorCacheConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

/// Vector cache shared across instances through Redis.
///
/// Records are stored as JSON under the exact embedding key, so a hit needs
/// the query to quantize to the same fingerprint. Entries that fail to
/// decode are deleted and reported as misses.
#[derive(Clone)]
pub struct RedisVectorCache {
    connection: ConnectionManager,
    config: RedisVectorCacheConfig,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl fmt::Debug for RedisVectorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisVectorCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisVectorCache {
    pub async fn new(config: RedisVectorCacheConfig) -> Result<Self, DomainError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| DomainError::cache(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            connection,
            config,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        })
    }

    fn key_pattern(&self) -> String {
        format!("{}:emb:*", self.config.key_prefix)
    }

    fn miss(&self) -> CacheLookup {
        self.misses.fetch_add(1, Ordering::Relaxed);
        CacheLookup::miss()
    }

    async fn scan_keys(&self) -> Result<Vec<String>, DomainError> {
        let mut conn = self.connection.clone();
        let pattern = self.key_pattern();
        let mut cursor: u64 = 0;
        let mut keys = Vec::new();

        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| DomainError::cache(format!("Failed to scan keys: {}", e)))?;

            keys.extend(batch);
            cursor = next;

            if cursor == 0 {
                break;
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl VectorCache for RedisVectorCache {
    async fn search_similar(
        &self,
        ctx: &RequestContext,
        embedding: &[f32],
        params: CacheSearchParams,
    ) -> Result<CacheLookup, DomainError> {
        if ctx.is_cancelled() {
            return Err(DomainError::cancelled("cache lookup cancelled"));
        }

        let key = cache_key(&self.config.key_prefix, embedding);
        let mut conn = self.connection.clone();

        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to get key '{}': {}", key, e)))?;

        let Some(raw) = raw else {
            return Ok(self.miss());
        };

        let cached: CachedVector = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                warn!(key = %key, error = %e, "Deleting corrupted cache entry");
                let _: Result<(), _> = conn.del(&key).await;
                return Ok(self.miss());
            }
        };

        if cached.similarity() < params.min_similarity {
            return Ok(self.miss());
        }

        self.hits.fetch_add(1, Ordering::Relaxed);
        Ok(CacheLookup::hit(cached))
    }

    async fn store(
        &self,
        ctx: &RequestContext,
        embedding: &[f32],
        vector: CachedVector,
    ) -> Result<(), DomainError> {
        if ctx.is_cancelled() {
            return Err(DomainError::cancelled("cache store cancelled"));
        }

        let key = cache_key(&self.config.key_prefix, embedding);
        let ttl_secs = self.config.ttl.as_secs().max(1);
        let vector = vector.with_ttl_secs(ttl_secs);

        let value = serde_json::to_string(&vector)
            .map_err(|e| DomainError::cache(format!("Failed to serialize cache entry: {}", e)))?;

        let mut conn = self.connection.clone();
        let _: () = conn
            .set_ex(&key, value, ttl_secs)
            .await
            .map_err(|e| DomainError::cache(format!("Failed to set key '{}': {}", key, e)))?;

        Ok(())
    }

    async fn stats(&self) -> Result<VectorCacheStats, DomainError> {
        let entries = self.scan_keys().await?.len() as u64;

        Ok(VectorCacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        })
    }

    async fn clear(&self) -> Result<(), DomainError> {
        let keys = self.scan_keys().await?;

        if !keys.is_empty() {
            let mut conn = self.connection.clone();
            let _: () = conn
                .del(&keys)
                .await
                .map_err(|e| DomainError::cache(format!("Failed to delete keys: {}", e)))?;
        }

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
