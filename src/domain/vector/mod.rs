//! Reference vector corpus: entities, search types and the store trait

mod entity;
mod repository;
mod search;

pub use entity::{text_hash, Label, ReferenceVector};
pub use repository::VectorStore;
pub use search::{BatchInsertResult, SimilarityMatch, VectorSearchParams, VectorStoreStats};

#[cfg(test)]
pub use repository::MockVectorStore;
