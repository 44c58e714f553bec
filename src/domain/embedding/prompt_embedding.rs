//! Prompt embedding value type

use serde::{Deserialize, Serialize};

/// A fixed-dimension embedding of a single prompt, tagged with the family of
/// the generator that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptEmbedding {
    vector: Vec<f32>,
    embedding_type: String,
}

impl PromptEmbedding {
    pub fn new(vector: Vec<f32>, embedding_type: impl Into<String>) -> Self {
        Self {
            vector,
            embedding_type: embedding_type.into(),
        }
    }

    /// Get the embedding vector
    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Get the generator family tag ("pattern", "openai", ...)
    pub fn embedding_type(&self) -> &str {
        &self.embedding_type
    }

    pub fn dimensions(&self) -> usize {
        self.vector.len()
    }

    /// Consume and return the vector
    pub fn into_vector(self) -> Vec<f32> {
        self.vector
    }

    /// Calculate cosine similarity with a raw vector
    pub fn cosine_similarity(&self, other: &[f32]) -> f32 {
        cosine_similarity(&self.vector, other)
    }
}

/// Calculate cosine similarity between two vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Scale a vector to unit length in place. Zero vectors are left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm > 0.0 {
        vector.iter_mut().for_each(|x| *x /= norm);
    }
}
