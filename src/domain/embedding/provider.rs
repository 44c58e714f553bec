//! Embedding generator trait definition

use async_trait::async_trait;
use std::fmt::Debug;

use super::PromptEmbedding;
use crate::domain::{DomainError, RequestContext};

/// Turns text into a fixed-size numeric vector
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync + Debug {
    /// Generate the embedding for a single text
    async fn generate(
        &self,
        ctx: &RequestContext,
        text: &str,
    ) -> Result<PromptEmbedding, DomainError>;

    /// Generate embeddings for several texts, preserving input order
    async fn generate_batch(
        &self,
        ctx: &RequestContext,
        texts: &[String],
    ) -> Result<Vec<PromptEmbedding>, DomainError> {
        let mut embeddings = Vec::with_capacity(texts.len());

        for text in texts {
            embeddings.push(self.generate(ctx, text).await?);
        }

        Ok(embeddings)
    }

    /// Family tag stamped on every embedding this generator produces
    fn embedding_type(&self) -> &str;

    /// Length of produced vectors
    fn dimensions(&self) -> usize;
}
