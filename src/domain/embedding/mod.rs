//! Embedding generator domain models and traits

mod prompt_embedding;
mod provider;

pub use prompt_embedding::{cosine_similarity, l2_normalize, PromptEmbedding};
pub use provider::EmbeddingGenerator;

#[cfg(test)]
pub use provider::mock::MockEmbeddingGenerator;
