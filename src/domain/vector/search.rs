//! Similarity search parameters and results

use serde::{Deserialize, Serialize};

use super::ReferenceVector;

const DEFAULT_LIMIT: usize = 5;

/// Parameters for a similarity search against the store
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorSearchParams {
    /// Maximum number of matches to return
    pub limit: usize,
    /// Minimum cosine similarity a match must reach
    pub min_similarity: f32,
}

impl VectorSearchParams {
    pub fn new(min_similarity: f32) -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            min_similarity: min_similarity.clamp(0.0, 1.0),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// A reference vector together with its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    vector: ReferenceVector,
    similarity: f32,
}

impl SimilarityMatch {
    pub fn new(vector: ReferenceVector, similarity: f32) -> Self {
        Self { vector, similarity }
    }

    pub fn vector(&self) -> &ReferenceVector {
        &self.vector
    }

    pub fn similarity(&self) -> f32 {
        self.similarity
    }

    /// Cosine distance, `1 - similarity`
    pub fn distance(&self) -> f32 {
        1.0 - self.similarity
    }

    pub fn into_vector(self) -> ReferenceVector {
        self.vector
    }
}

/// Outcome of a batch insert
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchInsertResult {
    pub inserted: usize,
    pub duplicates: usize,
    /// Assigned id per input vector, in input order. `None` for duplicates.
    #[serde(default)]
    pub ids: Vec<Option<i64>>,
}

impl BatchInsertResult {
    pub fn record(&mut self, id: Option<i64>) {
        match id {
            Some(_) => self.inserted += 1,
            None => self.duplicates += 1,
        }
        self.ids.push(id);
    }
}

/// Corpus composition and search counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreStats {
    pub total: u64,
    pub malicious: u64,
    pub safe: u64,
    #[serde(default)]
    pub searches: u64,
    /// Mean `find_similar` latency in milliseconds
    #[serde(default)]
    pub avg_search_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::vector::Label;

    #[test]
    fn test_batch_result_tracks_ids_in_order() {
        let mut result = BatchInsertResult::default();
        result.record(Some(4));
        result.record(None);
        result.record(Some(5));

        assert_eq!(result.inserted, 2);
        assert_eq!(result.duplicates, 1);
        assert_eq!(result.ids, vec![Some(4), None, Some(5)]);
    }

    #[test]
    fn test_search_params_defaults() {
        let params = VectorSearchParams::new(0.85);
        assert_eq!(params.limit, 5);
        assert_eq!(params.min_similarity, 0.85);
    }

    #[test]
    fn test_search_params_clamps_similarity() {
        assert_eq!(VectorSearchParams::new(1.5).min_similarity, 1.0);
        assert_eq!(VectorSearchParams::new(-0.2).min_similarity, 0.0);
    }

    #[test]
    fn test_match_distance() {
        let vector = ReferenceVector::new("text", "safe", Label::Benign, vec![1.0]);
        let found = SimilarityMatch::new(vector, 0.9);

        assert!((found.distance() - 0.1).abs() < 0.0001);
    }
}
