//! Domain layer - Core business logic and entities

pub mod context;
pub mod embedding;
pub mod error;
pub mod security;
pub mod vector;
pub mod vector_cache;

pub use context::{CancelHandle, RequestContext};
pub use embedding::{cosine_similarity, EmbeddingGenerator, PromptEmbedding};
pub use error::DomainError;
pub use security::{
    AnalysisScope, AnalysisStage, Interruption, PromptAnalyzer, SecurityError, SecurityMode,
    SecurityResult, VectorSecurityConfig,
};
pub use vector::{
    BatchInsertResult, Label, ReferenceVector, SimilarityMatch, VectorSearchParams, VectorStore,
    VectorStoreStats,
};
pub use vector_cache::{CacheLookup, CacheSearchParams, CachedVector, VectorCache, VectorCacheStats};
