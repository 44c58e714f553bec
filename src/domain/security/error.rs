//! Analysis errors

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::domain::DomainError;

/// Pipeline stage a failure is attributed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisStage {
    Embedding,
    CacheLookup,
    VectorSearch,
    CacheWriteBack,
}

impl AnalysisStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::CacheLookup => "cache_lookup",
            Self::VectorSearch => "vector_search",
            Self::CacheWriteBack => "cache_write_back",
        }
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failures that leave a prompt unclassified.
///
/// An `Err` never means "safe"; callers decide how to treat an unavailable
/// classification.
#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("failed to generate embedding: {0}")]
    Embedding(#[source] DomainError),

    #[error("vector similarity search failed: {0}")]
    Store(#[source] DomainError),

    /// `budget` is the window the analysis actually had
    #[error("{stage} timed out after {}ms", .budget.as_millis())]
    Timeout {
        stage: AnalysisStage,
        budget: Duration,
    },

    #[error("{stage} cancelled by caller")]
    Cancelled { stage: AnalysisStage },
}

impl SecurityError {
    pub fn stage(&self) -> AnalysisStage {
        match self {
            Self::Embedding(_) => AnalysisStage::Embedding,
            Self::Store(_) => AnalysisStage::VectorSearch,
            Self::Timeout { stage, .. } | Self::Cancelled { stage } => *stage,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
