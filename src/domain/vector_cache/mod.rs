//! Fast result cache in front of the vector store

mod entry;
mod repository;

pub use entry::{embedding_fingerprint, CacheLookup, CacheSearchParams, CachedVector, VectorCacheStats};
pub use repository::VectorCache;

#[cfg(test)]
pub use repository::MockVectorCache;
