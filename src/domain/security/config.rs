//! Security analyzer configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Threshold applied when no configuration is present
pub const DEFAULT_BLOCK_THRESHOLD: f32 = 0.85;

/// What the request gate does with a detection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityMode {
    /// Reject requests classified as malicious
    #[default]
    Block,
    /// Log detections and let the request through
    Log,
}

/// Configuration for vector-based prompt security
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorSecurityConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub mode: SecurityMode,

    /// Similarity floor for both tiers and the blocking cutoff (0.0 to 1.0)
    #[serde(default = "default_block_threshold")]
    pub block_threshold: f32,

    #[serde(default)]
    pub embedding: EmbeddingSettings,
}

/// Embedding expectations of the analyzer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Embedding family the corpus must have been built with
    #[serde(default = "default_service_type")]
    pub service_type: String,

    /// Per-analysis budget in milliseconds; 0 means the built-in default
    #[serde(default)]
    pub model_timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_block_threshold() -> f32 {
    DEFAULT_BLOCK_THRESHOLD
}

fn default_service_type() -> String {
    "pattern".to_string()
}

impl Default for VectorSecurityConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            mode: SecurityMode::default(),
            block_threshold: default_block_threshold(),
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            service_type: default_service_type(),
            model_timeout_ms: 0,
        }
    }
}

impl VectorSecurityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_mode(mut self, mode: SecurityMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_block_threshold(mut self, threshold: f32) -> Self {
        self.block_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_service_type(mut self, service_type: impl Into<String>) -> Self {
        self.embedding.service_type = service_type.into();
        self
    }

    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.embedding.model_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Configured model timeout, `None` when unset or zero
    pub fn model_timeout(&self) -> Option<Duration> {
        match self.embedding.model_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Reject a block threshold that is not finite or lies outside [0, 1]
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.block_threshold.is_finite() || !(0.0..=1.0).contains(&self.block_threshold) {
            return Err(DomainError::configuration(format!(
                "security.block_threshold must be within [0, 1], got {}",
                self.block_threshold
            )));
        }

        Ok(())
    }

    /// Expected embedding family, falling back to "pattern" when blank
    pub fn expected_embedding_type(&self) -> &str {
        match self.embedding.service_type.trim() {
            "" => "pattern",
            service_type => service_type,
        }
    }
}
