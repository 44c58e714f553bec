//! Vector cache implementations

mod in_memory;
mod redis;

pub use self::redis::{RedisVectorCache, RedisVectorCacheConfig};
pub use in_memory::{InMemoryVectorCache, InMemoryVectorCacheConfig};

use crate::domain::vector_cache::embedding_fingerprint;

/// Storage key for an embedding: `{prefix}:emb:{fingerprint}`
pub fn cache_key(prefix: &str, embedding: &[f32]) -> String {
    format!("{}:emb:{}", prefix, embedding_fingerprint(embedding))
}
