//! Classification result

use std::time::Duration;

use serde::Serialize;

use crate::domain::vector::{Label, SimilarityMatch};
use crate::domain::vector_cache::CachedVector;

/// Attack type reported when nothing matched or the match was discarded
pub const SAFE_ATTACK_TYPE: &str = "safe";

/// Attack type for malicious matches whose label text is missing or "safe"
pub const UNKNOWN_ATTACK_TYPE: &str = "unknown_attack";

/// Outcome of analyzing one prompt
/// Built only through its constructors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityResult {
    is_malicious: bool,
    confidence: f32,
    attack_type: String,
    similarity_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    matched_text: Option<String>,
    #[serde(rename = "processing_time_ms", serialize_with = "super::serde_millis::serialize")]
    processing_time: Duration,
}

impl SecurityResult {
    /// No match, or a match that must not be trusted
    pub fn safe() -> Self {
        Self {
            is_malicious: false,
            confidence: 0.0,
            attack_type: SAFE_ATTACK_TYPE.to_string(),
            similarity_score: 0.0,
            matched_text: None,
            processing_time: Duration::ZERO,
        }
    }

    /// Result mirroring a store match
    pub fn from_match(found: &SimilarityMatch) -> Self {
        let vector = found.vector();
        Self::classified(
            vector.label(),
            vector.label_text(),
            found.similarity(),
            vector.text(),
        )
    }

    /// Result mirroring a cached detection
    pub fn from_cached(cached: &CachedVector) -> Self {
        Self::classified(
            cached.label(),
            cached.label_text(),
            cached.similarity(),
            cached.text(),
        )
    }

    fn classified(label: Label, label_text: &str, similarity: f32, matched_text: &str) -> Self {
        let is_malicious = label.is_malicious();
        let attack_type = if is_malicious && (label_text.is_empty() || label_text == SAFE_ATTACK_TYPE)
        {
            UNKNOWN_ATTACK_TYPE.to_string()
        } else {
            label_text.to_string()
        };
        let score = if similarity.is_finite() {
            similarity.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            is_malicious,
            confidence: score,
            attack_type,
            similarity_score: score,
            matched_text: Some(matched_text.to_string()),
            processing_time: Duration::ZERO,
        }
    }

    /// Stamp the elapsed analysis time
    pub fn with_processing_time(mut self, processing_time: Duration) -> Self {
        self.processing_time = processing_time;
        self
    }

    pub fn is_malicious(&self) -> bool {
        self.is_malicious
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn attack_type(&self) -> &str {
        &self.attack_type
    }

    pub fn similarity_score(&self) -> f32 {
        self.similarity_score
    }

    pub fn matched_text(&self) -> Option<&str> {
        self.matched_text.as_deref()
    }

    pub fn processing_time(&self) -> Duration {
        self.processing_time
    }

    /// Whether a gate running at `threshold` should reject the prompt
    pub fn should_block(&self, threshold: f32) -> bool {
        self.is_malicious && self.confidence >= threshold
    }
}
